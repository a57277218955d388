//! Unified error handling for the HWID tooling
//!
//! Every component has its own error enum so callers can match on the exact
//! failure, and [`HwidError`] wraps all of them for code that only needs to
//! propagate. All types use thiserror for Display and Error impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using HwidError
pub type Result<T> = std::result::Result<T, HwidError>;

// ============================================================================
// Identity codec
// ============================================================================

/// Failures of the BOM <-> Identity codec. All of them are fatal for the call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid encoding pattern index: {0}")]
    InvalidPattern(u32),

    #[error("Invalid image id: {0}")]
    InvalidImageId(u32),

    #[error("No choice of encoded field {0} matches the BOM")]
    MissingField(String),

    #[error("Index {index} of encoded field {field} does not fit in {bit_length} bits")]
    IndexOverflow {
        field: String,
        index: u32,
        bit_length: u32,
    },

    #[error("Project mismatch: database is {expected}, identity is {actual}")]
    ProjectMismatch {
        expected: String,
        actual: String,
    },

    #[error("Encoding scheme mismatch: {0}")]
    SchemeMismatch(String),

    #[error("Components bitset has {length} bits, image allows at most {max}")]
    BitstringTooLong {
        length: usize,
        max: usize,
    },

    #[error("Encoded field {0} has no choice with index {1}")]
    InvalidFieldIndex(String, u32),

    #[error("Malformed HWID string: {0}")]
    MalformedHwid(String),
}

// ============================================================================
// Rule engine
// ============================================================================

/// Rule evaluation errors.
///
/// [`RuleError::Failed`] is the only variant produced by assertions inside a
/// rule; the others describe rules or contexts that are wrong in themselves.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("Rule {rule:?} failed:\n{}", .messages.join("\n"))]
    Failed {
        rule: String,
        messages: Vec<String>,
    },

    #[error("Syntax error in {expr:?} at offset {offset}: {reason}")]
    Syntax {
        expr: String,
        offset: usize,
        reason: String,
    },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Function {function} requires context capability {capability:?}")]
    IncompatibleContext {
        function: String,
        capability: String,
    },

    #[error("Function {function} takes {expected} argument(s), got {actual}")]
    Arity {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Missing context attribute: {0}")]
    MissingAttribute(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl RuleError {
    /// Whether this error is an accumulated assertion failure rather than a
    /// broken rule.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

// ============================================================================
// Feature requirement spec
// ============================================================================

/// Malformed feature requirement specs and corrupt spec sources.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("Brand {brand}: feature version must be positive, got {version}")]
    InvalidFeatureVersion {
        brand: String,
        version: u32,
    },

    #[error("Brand {0} has no profiles")]
    NoProfiles(String),

    #[error("Brand {brand}, profile {profile}: requirement {requirement} has no bit locations")]
    EmptyBitLocations {
        brand: String,
        profile: usize,
        requirement: usize,
    },

    #[error("Brand {brand}, profile {profile}: required value {value:?} must have {expected} bits")]
    RequiredValueLength {
        brand: String,
        profile: usize,
        value: String,
        expected: usize,
    },

    #[error("Brand {brand}, profile {profile}: required value {value:?} is not a bit string")]
    InvalidRequiredValue {
        brand: String,
        profile: usize,
        value: String,
    },

    #[error("Spec source has no checksum header")]
    MissingChecksum,

    #[error("Checksum mismatch: header says {expected}, body hashes to {actual}")]
    ChecksumMismatch {
        expected: String,
        actual: String,
    },

    #[error("Failed to parse spec body: {0}")]
    Body(String),
}

// ============================================================================
// Database
// ============================================================================

/// Load-time validation failures of an HWID database.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("Invalid project name: {0:?}")]
    InvalidProject(String),

    #[error("Encoding pattern {value} out of range (max {max})")]
    PatternOutOfRange {
        value: u32,
        max: u32,
    },

    #[error("Image id {value} out of range (max {max})")]
    ImageIdOutOfRange {
        value: u32,
        max: u32,
    },

    #[error("Database declares no encoding patterns")]
    NoEncodingPatterns,

    #[error("Encoded field {0} has no choices")]
    FieldWithoutChoices(String),

    #[error("Encoded field {field} is {bit_length} bits wide (max {max})")]
    FieldTooWide {
        field: String,
        bit_length: u32,
        max: u32,
    },

    #[error("Image {image_id} encodes unknown field {field}")]
    UnknownField {
        image_id: u32,
        field: String,
    },

    #[error("Image {image_id}: bit offset {bit_offset} of field {field} exceeds its {bit_length} bits")]
    BitOffsetOutOfRange {
        image_id: u32,
        field: String,
        bit_offset: u32,
        bit_length: u32,
    },

    #[error("Encoded field {field} uses undeclared component class {class}")]
    UnknownComponentClass {
        field: String,
        class: String,
    },
}

// ============================================================================
// Unified error
// ============================================================================

/// Unified error type for all HWID operations
#[derive(thiserror::Error, Debug)]
pub enum HwidError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("File too large: {path} ({size} bytes, max {max_size} bytes)")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HwidError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_failure_joins_messages() {
        let err = RuleError::Failed {
            rule: "length".to_string(),
            messages: vec!["ERROR: a".to_string(), "ERROR: b".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("ERROR: a\nERROR: b"));
        assert!(err.is_failure());
        assert!(!RuleError::UnknownFunction("X".into()).is_failure());
    }

    #[test]
    fn test_codec_error_wraps_transparently() {
        let err: HwidError = CodecError::MissingField("cpu_field".into()).into();
        assert_eq!(err.to_string(), "No choice of encoded field cpu_field matches the BOM");
        assert!(matches!(err, HwidError::Codec(CodecError::MissingField(_))));
    }
}
