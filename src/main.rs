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

use clap::Parser;
use tracing::warn;

use hwid::{logger, run_cli, Cli};

fn main() {
    let cli = Cli::parse();

    // A broken settings file should not block commands that pass every path
    let (settings, settings_error) = match hwid_core::load_settings() {
        Ok(settings) => (settings, None),
        Err(e) => (hwid_core::Settings::default(), Some(e)),
    };

    logger::init_logging(cli.log_level.as_deref(), settings.log_level.as_deref());
    if let Some(e) = settings_error {
        warn!(error = %e, "Ignoring unreadable settings");
    }

    let mut stdout = std::io::stdout().lock();
    match run_cli(&cli, &settings, &mut stdout) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    }
}
