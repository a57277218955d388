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

//! Logging setup for the `hwid` binary
//!
//! Logs go to stderr so command output on stdout stays machine readable.

use tracing_subscriber::EnvFilter;

/// Filter used when nothing else is configured
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Pick the filter directive: command line, then `RUST_LOG`, then settings
pub fn resolve_log_level(
    cli_level: Option<&str>,
    env_level: Option<&str>,
    settings_level: Option<&str>,
) -> String {
    [cli_level, env_level, settings_level]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|level| !level.is_empty())
        .unwrap_or(DEFAULT_LOG_LEVEL)
        .to_string()
}

/// Install the global fmt subscriber; later calls are no-ops
pub fn init_logging(cli_level: Option<&str>, settings_level: Option<&str>) {
    let env_level = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let level = resolve_log_level(cli_level, env_level.as_deref(), settings_level);

    let filter = EnvFilter::try_new(&level).unwrap_or_else(|e| {
        eprintln!("Invalid log filter {:?}: {}, using {}", level, e, DEFAULT_LOG_LEVEL);
        EnvFilter::new(DEFAULT_LOG_LEVEL)
    });

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        assert_eq!(resolve_log_level(Some("debug"), Some("info"), Some("error")), "debug");
        assert_eq!(resolve_log_level(None, Some("info"), Some("error")), "info");
        assert_eq!(resolve_log_level(None, None, Some("error")), "error");
        assert_eq!(resolve_log_level(None, None, None), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_blank_levels_are_skipped() {
        assert_eq!(resolve_log_level(Some(" "), Some(""), Some("trace")), "trace");
    }
}
