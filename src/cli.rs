/*
 * This file is part of hwid.
 *
 * Copyright (C) 2026 hwid contributors
 *
 * hwid is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * hwid is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with hwid. If not, see <https://www.gnu.org/licenses/>.
 */

//! Command Line Interface
//!
//! Argument definitions for the `hwid` binary. Execution lives in
//! [`crate::commands`].

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hwid")]
#[command(version)]
#[command(about = "HWID encoder/decoder, rule evaluator and feature compliance checker")]
#[command(long_about = "HWID encoder/decoder, rule evaluator and feature compliance checker

EXAMPLES:
    hwid encode --database db.json --bom bom.json --brand ABCD
    hwid decode --database db.json 'CHROMEBOOK-ABCD A2B-C3D'
    hwid identify --database db.json probes.json
    hwid feature-version --database db.json --spec feature.spec 'CHROMEBOOK-ABCD A2B-C3D'
    hwid eval-rule --context ctx.json --when 'StrLen() > 3' --evaluate 'AssertStrLen(3)'
    hwid eval --context ctx.json 'StrLen()'
    hwid spec seal feature.textproto feature.spec
    hwid database check db.json

ENVIRONMENT VARIABLES:
    RUST_LOG=debug         Enable debug logging
    HWID_CONFIG_DIR=DIR    Override the configuration directory

FILES:
    ~/.config/hwid/settings.json      Default database, spec and log level")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log filter (overrides RUST_LOG and settings)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode a BOM into an HWID string
    Encode(EncodeArgs),

    /// Decode an HWID string into its BOM
    Decode {
        #[command(flatten)]
        database: DatabaseArg,

        /// HWID string
        hwid: String,
    },

    /// Map probe results to catalogued component names
    Identify {
        #[command(flatten)]
        database: DatabaseArg,

        /// Probe results JSON: class -> list of probed records
        probes: PathBuf,
    },

    /// Print the feature version an HWID complies with
    FeatureVersion {
        #[command(flatten)]
        database: DatabaseArg,

        /// Checksum-gated feature requirement spec
        #[arg(long)]
        spec: Option<PathBuf>,

        /// HWID string
        hwid: String,
    },

    /// Evaluate a rule against a context file
    EvalRule(EvalRuleArgs),

    /// Evaluate a single expression and print its value
    Eval {
        /// Context JSON file (empty context when omitted)
        #[arg(long)]
        context: Option<PathBuf>,

        /// Expression, e.g. "StrLen() > 3"
        expr: String,
    },

    /// Feature spec source management
    #[command(subcommand)]
    Spec(SpecCommands),

    /// Database inspection
    #[command(subcommand)]
    Database(DatabaseCommands),

    /// Settings management
    #[command(subcommand)]
    Settings(SettingsCommands),
}

/// `--database`, defaulting to the settings file
#[derive(Args, Debug, Clone)]
pub struct DatabaseArg {
    /// HWID database JSON file
    #[arg(long)]
    pub database: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub database: DatabaseArg,

    /// BOM JSON file
    #[arg(long)]
    pub bom: PathBuf,

    /// Brand code appended to the project
    #[arg(long)]
    pub brand: Option<String>,

    /// Encoded configless field
    #[arg(long)]
    pub configless: Option<String>,
}

#[derive(Args, Debug)]
pub struct EvalRuleArgs {
    /// Context JSON file
    #[arg(long)]
    pub context: PathBuf,

    /// Rule name used in failure reports
    #[arg(long, default_value = "cli")]
    pub name: String,

    /// Condition; the rule runs `evaluate` when it is truthy
    #[arg(long)]
    pub when: Option<String>,

    /// Expression run when the condition holds
    #[arg(long)]
    pub evaluate: String,

    /// Expression run when the condition does not hold
    #[arg(long)]
    pub otherwise: Option<String>,

    /// Print the context after the rule ran
    #[arg(long)]
    pub print_context: bool,
}

#[derive(Subcommand, Debug)]
pub enum SpecCommands {
    /// Verify the checksum and contents of a spec source
    Verify {
        /// Spec source file
        path: PathBuf,
    },
    /// Write a checksum-gated source from a text format spec
    Seal {
        /// Spec in protobuf text format, without checksum header
        input: PathBuf,
        /// Output source file
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum DatabaseCommands {
    /// Validate a database and report shared component classes
    Check {
        /// HWID database JSON file
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show all current settings as JSON
    Show,
    /// Show settings file path
    Path,
}
