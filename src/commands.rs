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

//! Command execution
//!
//! Every command writes its result to the given writer and returns the
//! process exit code. Errors are returned to `main`, which prints them.

use anyhow::{anyhow, Context as _};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use hwid_core::constants::limits;
use hwid_core::{
    builtins, decode_hwid_string, encode, evaluate_once, load_database, load_spec_file,
    identify_components, parse_spec_body, read_text_file, save_spec_file, Bom, Context, Database, ErrorSink,
    FeatureRequirementSpecChecker, Rule, RuleError, Settings,
};

use hwid_core::rule::ProbeResults;

use crate::cli::{
    Cli, Commands, DatabaseArg, DatabaseCommands, EncodeArgs, EvalRuleArgs, SettingsCommands,
    SpecCommands,
};

/// Exit code of a rule whose assertions failed
pub const EXIT_RULE_FAILED: i32 = 1;

// ============================================================================
// CLI Execution
// ============================================================================

pub fn run_cli(cli: &Cli, settings: &Settings, out: &mut dyn Write) -> anyhow::Result<i32> {
    debug!(command = ?cli.command, "Running command");
    match &cli.command {
        Commands::Encode(args) => cmd_encode(args, settings, out),
        Commands::Decode { database, hwid } => cmd_decode(database, hwid, settings, out),
        Commands::Identify { database, probes } => cmd_identify(database, probes, settings, out),
        Commands::FeatureVersion {
            database,
            spec,
            hwid,
        } => cmd_feature_version(database, spec.as_deref(), hwid, settings, out),
        Commands::EvalRule(args) => cmd_eval_rule(args, out),
        Commands::Eval { context, expr } => cmd_eval(context.as_deref(), expr, out),
        Commands::Spec(sub) => cmd_spec(sub, out),
        Commands::Database(sub) => cmd_database(sub, out),
        Commands::Settings(sub) => cmd_settings(sub, settings, out),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn resolve_database(arg: &DatabaseArg, settings: &Settings) -> anyhow::Result<Database> {
    let path = arg
        .database
        .as_ref()
        .or(settings.database_path.as_ref())
        .ok_or_else(|| anyhow!("No database given; pass --database or set database_path"))?;
    load_database(path).with_context(|| format!("Failed to load database {}", path.display()))
}

fn resolve_spec_path(spec: Option<&Path>, settings: &Settings) -> anyhow::Result<PathBuf> {
    spec.map(Path::to_path_buf)
        .or_else(|| settings.feature_spec_path.clone())
        .ok_or_else(|| anyhow!("No feature spec given; pass --spec or set feature_spec_path"))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = read_text_file(path, limits::MAX_DATABASE_SIZE)?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn load_context(path: Option<&Path>) -> anyhow::Result<Context> {
    match path {
        Some(path) => read_json(path),
        None => Ok(Context::new()),
    }
}

// ============================================================================
// Codec Commands
// ============================================================================

fn cmd_encode(args: &EncodeArgs, settings: &Settings, out: &mut dyn Write) -> anyhow::Result<i32> {
    let database = resolve_database(&args.database, settings)?;
    let bom: Bom = read_json(&args.bom)?;
    let identity = encode(
        &database,
        &bom,
        args.brand.as_deref(),
        args.configless.as_deref(),
    )?;
    info!(hwid = %identity.encoded_string, "Encoded BOM");
    writeln!(out, "{}", identity.encoded_string)?;
    Ok(0)
}

fn cmd_decode(
    database: &DatabaseArg,
    hwid: &str,
    settings: &Settings,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    let database = resolve_database(database, settings)?;
    let (_, bom) = decode_hwid_string(&database, hwid)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&bom)?)?;
    Ok(0)
}

fn cmd_identify(
    database: &DatabaseArg,
    probes: &Path,
    settings: &Settings,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    let database = resolve_database(database, settings)?;
    let results: ProbeResults = read_json(probes)?;
    let components = identify_components(&database.components, &results);
    writeln!(out, "{}", serde_json::to_string_pretty(&components)?)?;
    Ok(0)
}

fn cmd_feature_version(
    database: &DatabaseArg,
    spec: Option<&Path>,
    hwid: &str,
    settings: &Settings,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    let database = resolve_database(database, settings)?;
    let spec_path = resolve_spec_path(spec, settings)?;
    let checker = FeatureRequirementSpecChecker::new(load_spec_file(&spec_path)?)?;

    let (identity, _) = decode_hwid_string(&database, hwid)?;
    writeln!(out, "{}", checker.check_feature_compliance_version(&identity))?;
    Ok(0)
}

// ============================================================================
// Rule Commands
// ============================================================================

fn cmd_eval_rule(args: &EvalRuleArgs, out: &mut dyn Write) -> anyhow::Result<i32> {
    let mut context = load_context(Some(args.context.as_path()))?;

    let mut rule = Rule::new(args.name.as_str(), args.evaluate.as_str());
    if let Some(condition) = &args.when {
        rule = rule.when(condition.as_str());
    }
    if let Some(otherwise) = &args.otherwise {
        rule = rule.otherwise(otherwise.as_str());
    }
    rule.check_syntax()?;

    let mut sink = ErrorSink::new();
    let result = rule.run(builtins(), &mut context, &mut sink);
    for line in sink.lines() {
        writeln!(out, "{}", line)?;
    }
    if args.print_context {
        writeln!(out, "{}", serde_json::to_string_pretty(&context)?)?;
    }

    match result {
        Ok(()) => Ok(0),
        Err(RuleError::Failed { rule, .. }) => {
            info!(rule = %rule, "Rule failed");
            Ok(EXIT_RULE_FAILED)
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_eval(context: Option<&Path>, expr: &str, out: &mut dyn Write) -> anyhow::Result<i32> {
    let mut context = load_context(context)?;
    let value = evaluate_once(expr, builtins(), &mut context)?;
    writeln!(out, "{}", value)?;
    Ok(0)
}

// ============================================================================
// Spec Commands
// ============================================================================

fn cmd_spec(cmd: &SpecCommands, out: &mut dyn Write) -> anyhow::Result<i32> {
    match cmd {
        SpecCommands::Verify { path } => {
            let spec = load_spec_file(path)?;
            writeln!(out, "Checksum OK: {}", path.display())?;
            for (brand, brand_spec) in &spec.brand_specs {
                writeln!(
                    out,
                    "  {}: feature version {}, {} profile(s)",
                    brand,
                    brand_spec.feature_version,
                    brand_spec.profiles.len()
                )?;
            }
        }
        SpecCommands::Seal { input, output } => {
            let body = read_text_file(input, limits::MAX_SPEC_SIZE)?;
            let spec = parse_spec_body(&body)
                .with_context(|| format!("Invalid spec in {}", input.display()))?;
            spec.validate()?;
            save_spec_file(output, &spec)?;
            writeln!(out, "Wrote {}", output.display())?;
        }
    }
    Ok(0)
}

// ============================================================================
// Database Commands
// ============================================================================

fn cmd_database(cmd: &DatabaseCommands, out: &mut dyn Write) -> anyhow::Result<i32> {
    match cmd {
        DatabaseCommands::Check { path } => {
            let database = load_database(path)?;
            writeln!(
                out,
                "Project {}: {} image(s), {} field(s)",
                database.project,
                database.images.len(),
                database.fields.len()
            )?;
            for collision in database.class_collisions() {
                writeln!(
                    out,
                    "  image {}: class {} set by {} (last wins)",
                    collision.image_id,
                    collision.class,
                    collision.fields.join(", ")
                )?;
            }
        }
    }
    Ok(0)
}

// ============================================================================
// Settings Commands
// ============================================================================

fn cmd_settings(
    cmd: &SettingsCommands,
    settings: &Settings,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    match cmd {
        SettingsCommands::Show => {
            writeln!(out, "{}", serde_json::to_string_pretty(settings)?)?;
        }
        SettingsCommands::Path => {
            let path = hwid_core::settings::get_settings_path()?;
            writeln!(out, "{}", path.display())?;
        }
    }
    Ok(0)
}
