//! Input validation for HWID strings and loaded files
//!
//! Grammar checks for the textual parts of an identity and size checks for
//! files read from disk.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use hwid_error::{CodecError, HwidError, Result};

lazy_static! {
    static ref PROJECT_RE: Regex = Regex::new(r"^[A-Z0-9_]+$").expect("static regex");
    static ref BRAND_CODE_RE: Regex = Regex::new(r"^[A-Z0-9]+$").expect("static regex");
    static ref CONFIGLESS_RE: Regex = Regex::new(r"^[A-Z0-9]+$").expect("static regex");
}

/// Project names are upper-case letters, digits and underscores
pub fn is_valid_project(project: &str) -> bool {
    PROJECT_RE.is_match(project)
}

/// Brand codes are upper-case letters and digits
pub fn is_valid_brand_code(brand_code: &str) -> bool {
    BRAND_CODE_RE.is_match(brand_code)
}

/// Encoded configless fields are upper-case letters and digits
pub fn is_valid_configless(configless: &str) -> bool {
    CONFIGLESS_RE.is_match(configless)
}

/// Validates a components bitset: only '0'/'1' and terminated by the stop bit
pub fn validate_components_bitset(bitset: &str) -> std::result::Result<(), CodecError> {
    if bitset.is_empty() {
        return Err(CodecError::MalformedHwid(
            "components bitset is empty (missing stop bit)".to_string(),
        ));
    }
    if !bitset.bytes().all(|b| b == b'0' || b == b'1') {
        return Err(CodecError::MalformedHwid(format!(
            "components bitset {:?} contains non-binary characters",
            bitset
        )));
    }
    if !bitset.ends_with(crate::constants::bits::STOP_BIT) {
        return Err(CodecError::MalformedHwid(format!(
            "components bitset {:?} does not end with the stop bit",
            bitset
        )));
    }
    Ok(())
}

/// Validates the textual parts of an identity
pub fn validate_identity_labels(
    project: &str,
    brand_code: Option<&str>,
    encoded_configless: Option<&str>,
) -> std::result::Result<(), CodecError> {
    if !is_valid_project(project) {
        return Err(CodecError::MalformedHwid(format!(
            "invalid project name {:?}",
            project
        )));
    }
    if let Some(brand) = brand_code {
        if !is_valid_brand_code(brand) {
            return Err(CodecError::MalformedHwid(format!(
                "invalid brand code {:?}",
                brand
            )));
        }
    }
    if let Some(configless) = encoded_configless {
        if !is_valid_configless(configless) {
            return Err(CodecError::MalformedHwid(format!(
                "invalid configless field {:?}",
                configless
            )));
        }
    }
    Ok(())
}

/// Validates that a file is not larger than `max_size` bytes
pub fn validate_file_size(path: &Path, max_size: u64) -> Result<u64> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            HwidError::FileNotFound(path.to_path_buf())
        } else {
            HwidError::FileRead {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    if metadata.len() > max_size {
        return Err(HwidError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            max_size,
        });
    }

    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_grammar() {
        assert!(is_valid_project("CHROMEBOOK"));
        assert!(is_valid_project("FOO_BAR2"));
        assert!(!is_valid_project("chromebook"));
        assert!(!is_valid_project("FOO-BAR"));
        assert!(!is_valid_project(""));
    }

    #[test]
    fn test_components_bitset_validation() {
        assert!(validate_components_bitset("1").is_ok());
        assert!(validate_components_bitset("0101").is_ok());
        assert!(validate_components_bitset("").is_err());
        assert!(validate_components_bitset("0110").is_err());
        assert!(validate_components_bitset("01a1").is_err());
    }

    #[test]
    fn test_identity_labels() {
        assert!(validate_identity_labels("CHROMEBOOK", Some("ABCD"), Some("E1A")).is_ok());
        assert!(validate_identity_labels("CHROMEBOOK", Some("ab"), None).is_err());
        assert!(validate_identity_labels("CHROMEBOOK", None, Some("E 1")).is_err());
    }

    #[test]
    fn test_file_size_limits() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"0123456789").unwrap();
        assert_eq!(validate_file_size(file.path(), 10).unwrap(), 10);
        assert!(matches!(
            validate_file_size(file.path(), 5),
            Err(HwidError::FileTooLarge { size: 10, max_size: 5, .. })
        ));
        assert!(matches!(
            validate_file_size(Path::new("/nonexistent/hwid.json"), 5),
            Err(HwidError::FileNotFound(_))
        ));
    }
}
