//! User settings
//!
//! Persistent settings stored as JSON in `<config dir>/hwid/settings.json`.
//! They only provide defaults for the CLI; every value can be overridden on
//! the command line.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use hwid_error::{HwidError, Result};

use crate::constants::{limits, paths};
use crate::data::{read_text_file, write_atomic};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Database used when `--database` is omitted
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Feature spec source used when `--spec` is omitted
    #[serde(default)]
    pub feature_spec_path: Option<PathBuf>,

    /// Log filter directive, e.g. "info" or "hwid_core=debug"
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Location of the settings file
pub fn get_settings_path() -> Result<PathBuf> {
    let dir = paths::user_config_dir()
        .ok_or_else(|| HwidError::config("Could not determine config directory"))?;
    Ok(dir.join(paths::SETTINGS_FILE))
}

/// Load settings from the default location; a missing file gives defaults
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&get_settings_path()?)
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!(path = ?path, "No settings file, using defaults");
        return Ok(Settings::default());
    }
    let content = read_text_file(path, limits::MAX_SETTINGS_SIZE)?;
    serde_json::from_str(&content)
        .map_err(|e| HwidError::config(format!("Failed to parse settings JSON: {}", e)))
}

/// Save settings to the default location
pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&get_settings_path()?, settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    write_atomic(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"log_level": "debug"}"#).unwrap();
        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.log_level.as_deref(), Some("debug"));
        assert_eq!(settings.database_path, None);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(load_settings_from(&path), Err(HwidError::Config(_))));
    }

    #[test]
    #[serial]
    fn test_save_and_load_under_config_dir_override() {
        let dir = TempDir::new().unwrap();
        std::env::set_var(paths::CONFIG_DIR_ENV, dir.path());

        let settings = Settings {
            database_path: Some(PathBuf::from("/data/db.json")),
            feature_spec_path: None,
            log_level: Some("info".into()),
        };
        save_settings(&settings).unwrap();
        assert_eq!(get_settings_path().unwrap(), dir.path().join("settings.json"));
        assert_eq!(load_settings().unwrap(), settings);

        std::env::remove_var(paths::CONFIG_DIR_ENV);
    }
}
