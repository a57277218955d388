//! File persistence helpers
//!
//! Size-checked reads and atomic writes shared by the database loader, the
//! feature spec loader and the settings file.

use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use hwid_error::{HwidError, Result};

use super::database::Database;
use super::validation::validate_file_size;
use crate::constants::limits;

/// Read a UTF-8 file after checking it is at most `max_size` bytes
pub fn read_text_file(path: &Path, max_size: u64) -> Result<String> {
    validate_file_size(path, max_size)?;
    fs::read_to_string(path).map_err(|e| HwidError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Atomically replace `path` with `contents` (temp file + rename)
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| HwidError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = std::path::PathBuf::from(temp_name);

    let write_err = |e| HwidError::FileWrite {
        path: temp_path.clone(),
        source: e,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;
    file.write_all(contents.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| HwidError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!(path = ?path, bytes = contents.len(), "Wrote file");
    Ok(())
}

/// Load and validate a JSON database
pub fn load_database(path: &Path) -> Result<Database> {
    let contents = read_text_file(path, limits::MAX_DATABASE_SIZE)?;
    let database = Database::from_json(&contents)?;
    info!(
        path = ?path,
        project = %database.project,
        images = database.images.len(),
        "Loaded HWID database"
    );
    Ok(database)
}

/// Save a database as pretty-printed JSON
pub fn save_database(path: &Path, database: &Database) -> Result<()> {
    let json = serde_json::to_string_pretty(database)?;
    write_atomic(path, &json)
}
