//! HWID database snapshot
//!
//! Read-only description of how a project encodes its components: the
//! encoding patterns and images it knows, the bit layout of every image, and
//! the component choices of every encoded field.
//!
//! The database is loaded once and never mutated afterwards; the codec only
//! borrows it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use hwid_error::{CodecError, DatabaseError};

use super::types::ComponentMap;
use super::validation::is_valid_project;
use crate::constants::bits::{MAX_ENCODING_PATTERN, MAX_FIELD_BITS, MAX_IMAGE_ID};
use crate::identity::EncodingScheme;
use crate::rule::Value;

/// Index -> component map of one encoded field
pub type FieldChoices = BTreeMap<u32, ComponentMap>;

/// Component class -> component name -> expected probe values
pub type ComponentCatalog = BTreeMap<String, BTreeMap<String, BTreeMap<String, Value>>>;

/// One entry of a bit mapping: bit `bit_offset` of field `field`.
/// Serialized as `["field", offset]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitPosition(pub String, pub u32);

impl BitPosition {
    pub fn new(field: impl Into<String>, bit_offset: u32) -> Self {
        Self(field.into(), bit_offset)
    }

    pub fn field(&self) -> &str {
        &self.0
    }

    pub fn bit_offset(&self) -> u32 {
        self.1
    }
}

/// Bit layout of one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    #[serde(default)]
    pub name: String,
    pub encoding_scheme: EncodingScheme,
    /// Field name -> bit length
    pub encoded_fields: BTreeMap<String, u32>,
    /// Bit position i of the components bitset comes from `bit_mapping[i]`
    pub bit_mapping: Vec<BitPosition>,
    #[serde(default)]
    pub max_bit_length: Option<usize>,
}

impl ImageSpec {
    /// Number of bits the image encodes (bit mapping truncated to `max_bit_length`)
    pub fn total_bit_length(&self) -> usize {
        match self.max_bit_length {
            Some(max) => max.min(self.bit_mapping.len()),
            None => self.bit_mapping.len(),
        }
    }

    /// The effective (truncated) bit mapping
    pub fn bit_mapping(&self) -> &[BitPosition] {
        &self.bit_mapping[..self.total_bit_length()]
    }

    /// Order in which decoded fields are merged into a BOM.
    ///
    /// Fields that never appear in the bit mapping come first (enumeration
    /// order), then fields by first appearance in the bit mapping. When two
    /// fields carry the same component class the later field wins.
    pub fn merge_order(&self) -> Vec<&str> {
        let mut mapped: Vec<&str> = Vec::new();
        for position in &self.bit_mapping {
            let field = position.field();
            if self.encoded_fields.contains_key(field) && !mapped.contains(&field) {
                mapped.push(field);
            }
        }

        let mut order: Vec<&str> = self
            .encoded_fields
            .keys()
            .map(String::as_str)
            .filter(|field| !mapped.contains(field))
            .collect();
        order.extend(mapped);
        order
    }
}

/// Two or more encoded fields of one image that assign the same class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassCollision {
    pub image_id: u32,
    pub class: String,
    /// Fields in merge order; the last one wins on decode
    pub fields: Vec<String>,
}

/// HWID database snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub project: String,
    pub encoding_patterns: BTreeSet<u32>,
    #[serde(default)]
    pub component_classes: BTreeSet<String>,
    /// Image id -> layout
    pub images: BTreeMap<u32, ImageSpec>,
    /// Field name -> choices
    pub fields: BTreeMap<String, FieldChoices>,
    /// Expected probe values of known components
    #[serde(default)]
    pub components: ComponentCatalog,
}

impl Database {
    /// Parse and validate a JSON database
    pub fn from_json(json: &str) -> hwid_error::Result<Self> {
        let database: Database = serde_json::from_str(json)?;
        database.validate()?;
        Ok(database)
    }

    pub fn has_encoding_pattern(&self, index: u32) -> bool {
        self.encoding_patterns.contains(&index)
    }

    /// Layout of an image, or `InvalidImageId`
    pub fn image(&self, image_id: u32) -> Result<&ImageSpec, CodecError> {
        self.images
            .get(&image_id)
            .ok_or(CodecError::InvalidImageId(image_id))
    }

    /// Encoding scheme declared for an image
    pub fn encoding_scheme(&self, image_id: u32) -> Result<EncodingScheme, CodecError> {
        self.image(image_id).map(|image| image.encoding_scheme)
    }

    /// Number of component bits the image can carry
    pub fn total_bit_length(&self, image_id: u32) -> Result<usize, CodecError> {
        self.image(image_id).map(ImageSpec::total_bit_length)
    }

    pub fn field_choices(&self, field: &str) -> Option<&FieldChoices> {
        self.fields.get(field)
    }

    /// Load-time validation of the snapshot
    pub fn validate(&self) -> Result<(), DatabaseError> {
        if !is_valid_project(&self.project) {
            return Err(DatabaseError::InvalidProject(self.project.clone()));
        }
        if self.encoding_patterns.is_empty() {
            return Err(DatabaseError::NoEncodingPatterns);
        }
        if let Some(&pattern) = self.encoding_patterns.iter().find(|&&p| p > MAX_ENCODING_PATTERN) {
            return Err(DatabaseError::PatternOutOfRange {
                value: pattern,
                max: MAX_ENCODING_PATTERN,
            });
        }

        for (field, choices) in &self.fields {
            if choices.is_empty() {
                return Err(DatabaseError::FieldWithoutChoices(field.clone()));
            }
            for components in choices.values() {
                if let Some(class) = components
                    .keys()
                    .find(|class| !self.component_classes.contains(*class))
                {
                    return Err(DatabaseError::UnknownComponentClass {
                        field: field.clone(),
                        class: class.clone(),
                    });
                }
            }
        }

        for (&image_id, image) in &self.images {
            self.validate_image(image_id, image)?;
        }

        for collision in self.class_collisions() {
            warn!(
                image_id = collision.image_id,
                class = %collision.class,
                fields = ?collision.fields,
                "Encoded fields share a component class, the last field wins on decode"
            );
        }

        debug!(
            project = %self.project,
            images = self.images.len(),
            fields = self.fields.len(),
            "Validated HWID database"
        );
        Ok(())
    }

    fn validate_image(&self, image_id: u32, image: &ImageSpec) -> Result<(), DatabaseError> {
        if image_id > MAX_IMAGE_ID {
            return Err(DatabaseError::ImageIdOutOfRange {
                value: image_id,
                max: MAX_IMAGE_ID,
            });
        }

        for (field, &bit_length) in &image.encoded_fields {
            if !self.fields.contains_key(field) {
                return Err(DatabaseError::FieldWithoutChoices(field.clone()));
            }
            if bit_length > MAX_FIELD_BITS {
                return Err(DatabaseError::FieldTooWide {
                    field: field.clone(),
                    bit_length,
                    max: MAX_FIELD_BITS,
                });
            }
        }

        for position in &image.bit_mapping {
            let bit_length = image
                .encoded_fields
                .get(position.field())
                .copied()
                .ok_or_else(|| DatabaseError::UnknownField {
                    image_id,
                    field: position.field().to_string(),
                })?;
            if position.bit_offset() >= bit_length {
                return Err(DatabaseError::BitOffsetOutOfRange {
                    image_id,
                    field: position.field().to_string(),
                    bit_offset: position.bit_offset(),
                    bit_length,
                });
            }
        }
        Ok(())
    }

    /// Component classes assigned by more than one encoded field of an image
    pub fn class_collisions(&self) -> Vec<ClassCollision> {
        let mut collisions = Vec::new();
        for (&image_id, image) in &self.images {
            let mut owners: BTreeMap<&str, Vec<String>> = BTreeMap::new();
            for field in image.merge_order() {
                let classes: BTreeSet<&str> = self
                    .fields
                    .get(field)
                    .into_iter()
                    .flat_map(|choices| choices.values())
                    .flat_map(|components| components.keys().map(String::as_str))
                    .collect();
                for class in classes {
                    owners.entry(class).or_default().push(field.to_string());
                }
            }
            collisions.extend(
                owners
                    .into_iter()
                    .filter(|(_, fields)| fields.len() > 1)
                    .map(|(class, fields)| ClassCollision {
                        image_id,
                        class: class.to_string(),
                        fields,
                    }),
            );
        }
        collisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "project": "CHROMEBOOK",
            "encoding_patterns": [0],
            "component_classes": ["audio", "cpu"],
            "images": {
                "0": {
                    "name": "PROTO",
                    "encoding_scheme": "base8192",
                    "encoded_fields": { "audio_field": 1, "cpu_field": 2 },
                    "bit_mapping": [["audio_field", 0], ["cpu_field", 0], ["cpu_field", 1]]
                }
            },
            "fields": {
                "audio_field": { "0": { "audio": ["codec_1"] }, "1": { "audio": ["codec_2"] } },
                "cpu_field": { "0": { "cpu": ["cpu_a"] } }
            }
        }"#
    }

    #[test]
    fn test_from_json() {
        let db = Database::from_json(sample_json()).unwrap();
        assert_eq!(db.project, "CHROMEBOOK");
        assert!(db.has_encoding_pattern(0));
        assert!(!db.has_encoding_pattern(1));
        assert_eq!(db.total_bit_length(0).unwrap(), 3);
        assert_eq!(db.encoding_scheme(0).unwrap(), EncodingScheme::Base8192);
        assert_eq!(db.image(7).unwrap_err(), CodecError::InvalidImageId(7));
        assert!(db.class_collisions().is_empty());
    }

    #[test]
    fn test_truncated_bit_mapping() {
        let mut db = Database::from_json(sample_json()).unwrap();
        db.images.get_mut(&0).unwrap().max_bit_length = Some(2);
        let image = db.image(0).unwrap();
        assert_eq!(image.total_bit_length(), 2);
        assert_eq!(image.bit_mapping().len(), 2);
    }

    #[test]
    fn test_rejects_unknown_mapped_field() {
        let mut db = Database::from_json(sample_json()).unwrap();
        db.images
            .get_mut(&0)
            .unwrap()
            .bit_mapping
            .push(BitPosition::new("storage_field", 0));
        assert!(matches!(db.validate(), Err(DatabaseError::UnknownField { .. })));
    }

    #[test]
    fn test_rejects_offset_beyond_bit_length() {
        let mut db = Database::from_json(sample_json()).unwrap();
        db.images
            .get_mut(&0)
            .unwrap()
            .bit_mapping
            .push(BitPosition::new("audio_field", 1));
        assert!(matches!(
            db.validate(),
            Err(DatabaseError::BitOffsetOutOfRange { bit_offset: 1, bit_length: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_undeclared_class() {
        let mut db = Database::from_json(sample_json()).unwrap();
        db.component_classes.remove("cpu");
        assert!(matches!(
            db.validate(),
            Err(DatabaseError::UnknownComponentClass { .. })
        ));
    }

    #[test]
    fn test_rejects_image_id_outside_header() {
        let mut db = Database::from_json(sample_json()).unwrap();
        let image = db.images[&0].clone();
        db.images.insert(16, image);
        assert!(matches!(
            db.validate(),
            Err(DatabaseError::ImageIdOutOfRange { value: 16, .. })
        ));
    }

    #[test]
    fn test_merge_order_and_collisions() {
        let mut db = Database::from_json(sample_json()).unwrap();
        db.fields
            .get_mut("cpu_field")
            .unwrap()
            .get_mut(&0)
            .unwrap()
            .insert("audio".into(), vec!["codec_3".into()]);
        assert_eq!(db.image(0).unwrap().merge_order(), vec!["audio_field", "cpu_field"]);

        let collisions = db.class_collisions();
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].class, "audio");
        assert_eq!(collisions[0].fields, vec!["audio_field", "cpu_field"]);
        // Collisions are reported, not rejected
        assert!(db.validate().is_ok());
    }
}
