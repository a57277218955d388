//! Core data types for the HWID engine
//!
//! Defines the decoded bill of materials and the encoded identity that the
//! codec translates between.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Component class -> ordered component names
pub type ComponentMap = BTreeMap<String, Vec<String>>;

/// Bill of materials: the decoded component configuration of a device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bom {
    pub encoding_pattern_index: u32,
    pub image_id: u32,
    /// Name lists are order-sensitive
    #[serde(default)]
    pub components: ComponentMap,
}

impl Bom {
    /// Create an empty BOM for the given pattern and image
    pub fn new(encoding_pattern_index: u32, image_id: u32) -> Self {
        Self {
            encoding_pattern_index,
            image_id,
            components: ComponentMap::new(),
        }
    }

    /// Builder-style helper to set the components of one class
    pub fn with_component<I, S>(mut self, class: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_component(class, names);
        self
    }

    /// Replace the components of one class
    pub fn set_component<I, S>(&mut self, class: impl Into<String>, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.components
            .insert(class.into(), names.into_iter().map(Into::into).collect());
    }

    /// Components of a class; a class absent from the BOM has no components
    pub fn component(&self, class: &str) -> &[String] {
        self.components.get(class).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Structured form of an encoded HWID string
///
/// `components_bitset` always ends with the stop bit. `encoded_string` is the
/// canonical HWID string; regenerating an identity from it with the scheme the
/// database declares for `image_id` must give back an identical identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub project: String,
    pub encoding_pattern_index: u32,
    pub image_id: u32,
    pub components_bitset: String,
    #[serde(default)]
    pub brand_code: Option<String>,
    #[serde(default)]
    pub encoded_configless: Option<String>,
    pub encoded_string: String,
}

impl Identity {
    /// Components bitset with the trailing stop bit removed
    pub fn bit_string(&self) -> &str {
        let end = self
            .components_bitset
            .char_indices()
            .last()
            .map_or(0, |(index, _)| index);
        &self.components_bitset[..end]
    }

    /// Number of encoded component bits (stop bit excluded)
    pub fn bit_length(&self) -> usize {
        self.bit_string().len()
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encoded_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bom_component_defaults_to_empty() {
        let bom = Bom::new(0, 1).with_component("cpu", ["cpu_a"]);
        assert_eq!(bom.component("cpu"), ["cpu_a".to_string()]);
        assert!(bom.component("audio").is_empty());
    }

    #[test]
    fn test_identity_bit_string_strips_stop_bit() {
        let identity = Identity {
            project: "CHROMEBOOK".into(),
            encoding_pattern_index: 0,
            image_id: 0,
            components_bitset: "01101".into(),
            brand_code: None,
            encoded_configless: None,
            encoded_string: String::new(),
        };
        assert_eq!(identity.bit_string(), "0110");
        assert_eq!(identity.bit_length(), 4);
    }

    #[test]
    fn test_identity_bit_string_of_unvalidated_bitset() {
        let mut identity: Identity = serde_json::from_str(
            r#"{
                "project": "CHROMEBOOK",
                "encoding_pattern_index": 0,
                "image_id": 0,
                "components_bitset": "01é",
                "encoded_string": ""
            }"#,
        )
        .unwrap();
        assert_eq!(identity.bit_string(), "01");

        identity.components_bitset = "é".into();
        assert_eq!(identity.bit_string(), "");
        identity.components_bitset = String::new();
        assert_eq!(identity.bit_string(), "");
        assert_eq!(identity.bit_length(), 0);
    }
}
