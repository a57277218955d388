//! HWID string generation and parsing
//!
//! Layout: `PROJECT[-BRAND] [CONFIGLESS ]GROUPS`
//!
//! The groups carry the header (encoding pattern index, image id) followed by
//! the components bitset, encoded with the image's scheme. Everything before
//! the groups is covered by the scheme checksum.

use tracing::trace;

use hwid_error::CodecError;

use super::scheme::EncodingScheme;
use crate::constants::bits::{
    ENCODING_PATTERN_BITS, HEADER_BITS, IMAGE_ID_BITS, MAX_ENCODING_PATTERN, MAX_IMAGE_ID,
    STOP_BIT,
};
use crate::data::validation::{validate_components_bitset, validate_identity_labels};
use crate::data::Identity;

impl Identity {
    /// Build an identity and its canonical HWID string
    pub fn generate(
        scheme: EncodingScheme,
        project: &str,
        encoding_pattern_index: u32,
        image_id: u32,
        components_bitset: &str,
        brand_code: Option<&str>,
        encoded_configless: Option<&str>,
    ) -> Result<Self, CodecError> {
        if encoding_pattern_index > MAX_ENCODING_PATTERN {
            return Err(CodecError::InvalidPattern(encoding_pattern_index));
        }
        if image_id > MAX_IMAGE_ID {
            return Err(CodecError::InvalidImageId(image_id));
        }
        validate_components_bitset(components_bitset)?;
        validate_identity_labels(project, brand_code, encoded_configless)?;

        let prefix = string_prefix(project, brand_code, encoded_configless);
        let mut payload = String::with_capacity(HEADER_BITS + components_bitset.len());
        payload.push_str(&format!(
            "{:0width$b}",
            encoding_pattern_index,
            width = ENCODING_PATTERN_BITS as usize
        ));
        payload.push_str(&format!(
            "{:0width$b}",
            image_id,
            width = IMAGE_ID_BITS as usize
        ));
        payload.push_str(components_bitset);

        let groups = scheme.encode(&prefix, &payload);
        let encoded_string = format!("{} {}", prefix, groups);
        trace!(scheme = %scheme, hwid = %encoded_string, "Generated HWID string");

        Ok(Self {
            project: project.to_string(),
            encoding_pattern_index,
            image_id,
            components_bitset: components_bitset.to_string(),
            brand_code: brand_code.map(str::to_string),
            encoded_configless: encoded_configless.map(str::to_string),
            encoded_string,
        })
    }

    /// Parse an HWID string under the given scheme
    ///
    /// The result is regenerated from the parsed fields, so its
    /// `encoded_string` is canonical. Parsing a string produced by a different
    /// scheme fails, or yields an identity that differs from the original.
    pub fn from_encoded_string(scheme: EncodingScheme, hwid: &str) -> Result<Self, CodecError> {
        let (prefix, groups) = hwid
            .rsplit_once(' ')
            .ok_or_else(|| CodecError::MalformedHwid(format!("{:?} has no encoded part", hwid)))?;

        let (label, configless) = match prefix.split_once(' ') {
            Some((label, configless)) => (label, Some(configless)),
            None => (prefix, None),
        };
        let (project, brand_code) = match label.split_once('-') {
            Some((project, brand)) => (project, Some(brand)),
            None => (label, None),
        };
        validate_identity_labels(project, brand_code, configless)?;

        let payload = scheme.decode(prefix, groups)?;
        if payload.len() <= HEADER_BITS {
            return Err(CodecError::MalformedHwid(format!(
                "{:?} carries no components",
                hwid
            )));
        }

        let (header, body) = payload.split_at(HEADER_BITS);
        let (pattern_bits, image_bits) = header.split_at(ENCODING_PATTERN_BITS as usize);
        let encoding_pattern_index = u32::from_str_radix(pattern_bits, 2)
            .map_err(|e| CodecError::MalformedHwid(e.to_string()))?;
        let image_id = u32::from_str_radix(image_bits, 2)
            .map_err(|e| CodecError::MalformedHwid(e.to_string()))?;

        // Padding zeros follow the stop bit
        let stop = body.rfind(STOP_BIT).ok_or_else(|| {
            CodecError::MalformedHwid(format!("{:?} has no stop bit", hwid))
        })?;
        let components_bitset = &body[..=stop];

        Self::generate(
            scheme,
            project,
            encoding_pattern_index,
            image_id,
            components_bitset,
            brand_code,
            configless,
        )
    }
}

fn string_prefix(project: &str, brand_code: Option<&str>, configless: Option<&str>) -> String {
    let mut prefix = project.to_string();
    if let Some(brand) = brand_code {
        prefix.push('-');
        prefix.push_str(brand);
    }
    if let Some(configless) = configless {
        prefix.push(' ');
        prefix.push_str(configless);
    }
    prefix
}
