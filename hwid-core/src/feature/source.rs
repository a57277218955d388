//! Checksum-gated feature spec sources
//!
//! A source is a `# checksum: <sha256-hex>` line followed by the body. The
//! header codec knows nothing about the body grammar; the body is the protobuf
//! text format of a [`FeatureRequirementSpec`] (see [`super::textproto`]).

use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

use hwid_error::{Result, SpecError};

use super::spec::FeatureRequirementSpec;
use super::textproto::{parse_spec_body, print_spec_body};
use crate::constants::feature::CHECKSUM_HEADER_PREFIX;
use crate::constants::limits::MAX_SPEC_SIZE;
use crate::data::{read_text_file, write_atomic};

/// Split a source into `(checksum, body)`; only a trailing `\r` is dropped
/// from the header line
pub fn split_checksum_header(text: &str) -> std::result::Result<(&str, &str), SpecError> {
    let (header, body) = text.split_once('\n').ok_or(SpecError::MissingChecksum)?;
    let header = header.strip_suffix('\r').unwrap_or(header);
    let checksum = header
        .strip_prefix(CHECKSUM_HEADER_PREFIX)
        .ok_or(SpecError::MissingChecksum)?;
    if checksum.is_empty() {
        return Err(SpecError::MissingChecksum);
    }
    Ok((checksum, body))
}

/// Lowercase hex SHA-256 of `body`
pub fn compute_checksum(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The header checksum must be exactly the lowercase hex digest of the body
pub fn verify_checksum(expected: &str, body: &str) -> std::result::Result<(), SpecError> {
    let actual = compute_checksum(body);
    if expected != actual {
        return Err(SpecError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Verify and parse a source, then validate the spec it carries
pub fn load_feature_requirement_spec(
    text: &str,
) -> std::result::Result<FeatureRequirementSpec, SpecError> {
    let (checksum, body) = split_checksum_header(text)?;
    verify_checksum(checksum, body)?;
    let spec = parse_spec_body(body)?;
    spec.validate()?;
    Ok(spec)
}

/// Render a spec as a checksum-gated source
pub fn generate_feature_matcher_raw_source(
    spec: &FeatureRequirementSpec,
) -> std::result::Result<String, SpecError> {
    let body = print_spec_body(spec)?;
    Ok(format!(
        "{}{}\n{}",
        CHECKSUM_HEADER_PREFIX,
        compute_checksum(&body),
        body
    ))
}

/// Load a checksum-gated spec file
pub fn load_spec_file(path: &Path) -> Result<FeatureRequirementSpec> {
    let text = read_text_file(path, MAX_SPEC_SIZE)?;
    let spec = load_feature_requirement_spec(&text)?;
    info!(path = ?path, brands = spec.brand_specs.len(), "Loaded feature requirement spec");
    Ok(spec)
}

/// Write a spec as a checksum-gated source
pub fn save_spec_file(path: &Path, spec: &FeatureRequirementSpec) -> Result<()> {
    let source = generate_feature_matcher_raw_source(spec)?;
    write_atomic(path, &source)
}
