//! Identity -> BOM
//!
//! Decoding authenticates the identity against the scheme the database
//! declares for its image before reading a single component bit, and never
//! returns a partial BOM.

use std::collections::BTreeMap;
use tracing::{debug, trace};

use hwid_error::CodecError;

use crate::data::{Bom, Database, Identity};
use crate::identity::EncodingScheme;

/// Decode an identity into the BOM it encodes
pub fn decode(database: &Database, identity: &Identity) -> Result<Bom, CodecError> {
    if identity.project != database.project {
        return Err(CodecError::ProjectMismatch {
            expected: database.project.clone(),
            actual: identity.project.clone(),
        });
    }
    if !database.has_encoding_pattern(identity.encoding_pattern_index) {
        return Err(CodecError::InvalidPattern(identity.encoding_pattern_index));
    }
    let image = database.image(identity.image_id)?;

    authenticate(image.encoding_scheme, identity)?;

    let bit_string = identity.bit_string();
    let max = image.total_bit_length();
    if bit_string.len() > max {
        return Err(CodecError::BitstringTooLong {
            length: bit_string.len(),
            max,
        });
    }

    // Bits beyond the string read as zero
    let mut indices: BTreeMap<&str, u32> = image
        .encoded_fields
        .keys()
        .map(|field| (field.as_str(), 0))
        .collect();
    for (bit, position) in bit_string.bytes().zip(image.bit_mapping()) {
        if bit == b'1' {
            if let Some(index) = indices.get_mut(position.field()) {
                *index |= 1u32.checked_shl(position.bit_offset()).unwrap_or(0);
            }
        }
    }

    let mut bom = Bom::new(identity.encoding_pattern_index, identity.image_id);
    for field in image.merge_order() {
        let index = indices.get(field).copied().unwrap_or(0);
        let components = database
            .field_choices(field)
            .and_then(|choices| choices.get(&index))
            .ok_or_else(|| CodecError::InvalidFieldIndex(field.to_string(), index))?;
        for (class, names) in components {
            trace!(field, class = %class, "Merging decoded components");
            bom.components.insert(class.clone(), names.clone());
        }
    }

    debug!(
        project = %database.project,
        image_id = identity.image_id,
        bits = bit_string.len(),
        "Decoded identity"
    );
    Ok(bom)
}

/// Regenerate the identity from its string under `scheme` and require an exact match
fn authenticate(scheme: EncodingScheme, identity: &Identity) -> Result<(), CodecError> {
    let regenerated = Identity::from_encoded_string(scheme, &identity.encoded_string)
        .map_err(|e| {
            CodecError::SchemeMismatch(format!(
                "{:?} does not parse as {}: {}",
                identity.encoded_string, scheme, e
            ))
        })?;
    if regenerated != *identity {
        return Err(CodecError::SchemeMismatch(format!(
            "{:?} does not regenerate the same identity under {}",
            identity.encoded_string, scheme
        )));
    }
    Ok(())
}

/// Parse an HWID string with the scheme its image declares, then decode it
pub fn decode_hwid_string(database: &Database, hwid: &str) -> Result<(Identity, Bom), CodecError> {
    let mut last_error = None;
    for scheme in EncodingScheme::ALL {
        let candidate = match Identity::from_encoded_string(scheme, hwid) {
            Ok(candidate) => candidate,
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        };
        // Only the declared scheme counts, whatever else happens to parse
        match database.encoding_scheme(candidate.image_id) {
            Ok(declared) if declared == scheme => {
                let bom = decode(database, &candidate)?;
                return Ok((candidate, bom));
            }
            Ok(_) => continue,
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        CodecError::SchemeMismatch(format!(
            "{:?} is not encoded with the scheme its image declares",
            hwid
        ))
    }))
}
