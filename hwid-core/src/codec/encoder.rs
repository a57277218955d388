//! BOM -> Identity
//!
//! Every encoded field of the image is resolved to the index whose recorded
//! component map equals the BOM, then the indices are spread over the bitset
//! following the image's bit mapping.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use hwid_error::CodecError;

use crate::constants::bits::STOP_BIT;
use crate::data::{Bom, ComponentMap, Database, FieldChoices, Identity, ImageSpec};

/// Encode a BOM into an identity
pub fn encode(
    database: &Database,
    bom: &Bom,
    brand_code: Option<&str>,
    encoded_configless: Option<&str>,
) -> Result<Identity, CodecError> {
    if !database.has_encoding_pattern(bom.encoding_pattern_index) {
        return Err(CodecError::InvalidPattern(bom.encoding_pattern_index));
    }
    let image = database.image(bom.image_id)?;

    let mut indices: BTreeMap<&str, u32> = BTreeMap::new();
    for (field, &bit_length) in &image.encoded_fields {
        let index = database
            .field_choices(field)
            .and_then(|choices| find_matching_index(choices, bom))
            .ok_or_else(|| CodecError::MissingField(field.clone()))?;

        if !fits_in_bits(index, bit_length) {
            return Err(CodecError::IndexOverflow {
                field: field.clone(),
                index,
                bit_length,
            });
        }
        indices.insert(field.as_str(), index);
    }

    let components_bitset = build_components_bitset(image, &indices);
    debug!(
        project = %database.project,
        image_id = bom.image_id,
        bits = components_bitset.len() - 1,
        "Encoded BOM"
    );

    Identity::generate(
        image.encoding_scheme,
        &database.project,
        bom.encoding_pattern_index,
        bom.image_id,
        &components_bitset,
        brand_code,
        encoded_configless,
    )
}

/// Lowest index whose component map equals the BOM over every class the field
/// assigns; a class a choice does not list must be empty in the BOM
fn find_matching_index(choices: &FieldChoices, bom: &Bom) -> Option<u32> {
    let classes: BTreeSet<&str> = choices
        .values()
        .flat_map(|components| components.keys().map(String::as_str))
        .collect();
    choices
        .iter()
        .find(|(_, components)| choice_matches(&classes, components, bom))
        .map(|(&index, _)| index)
}

fn choice_matches(classes: &BTreeSet<&str>, components: &ComponentMap, bom: &Bom) -> bool {
    classes.iter().all(|&class| {
        let expected = components.get(class).map_or(&[][..], Vec::as_slice);
        bom.component(class) == expected
    })
}

fn fits_in_bits(index: u32, bit_length: u32) -> bool {
    1u64.checked_shl(bit_length)
        .map_or(true, |limit| u64::from(index) < limit)
}

fn build_components_bitset(image: &ImageSpec, indices: &BTreeMap<&str, u32>) -> String {
    let mapping = image.bit_mapping();
    let mut bitset = String::with_capacity(mapping.len() + 1);
    for position in mapping {
        let index = indices.get(position.field()).copied().unwrap_or(0);
        let bit = (index >> position.bit_offset()) & 1;
        bitset.push(if bit == 1 { '1' } else { '0' });
    }
    bitset.push(STOP_BIT);
    bitset
}
