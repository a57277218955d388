//! Feature requirement spec data model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use hwid_error::SpecError;

use crate::constants::feature::FEATURE_INCOMPLIANT_VERSION;

/// Bits that must take one of the required values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingRequirement {
    #[serde(default)]
    pub description: String,
    /// Positions in the identity bit string (stop bit excluded)
    pub bit_locations: Vec<usize>,
    /// Accepted values, each one character per bit location
    pub required_values: Vec<String>,
}

/// A set of requirements that together grant the brand's feature version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub description: String,
    pub encoding_requirements: Vec<EncodingRequirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandSpec {
    pub feature_version: u32,
    /// Checked in order; the first satisfied profile wins
    pub profiles: Vec<Profile>,
}

/// Brand code -> requirements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRequirementSpec {
    pub brand_specs: BTreeMap<String, BrandSpec>,
}

impl FeatureRequirementSpec {
    /// Check the structural invariants the checker relies on
    pub fn validate(&self) -> Result<(), SpecError> {
        for (brand, brand_spec) in &self.brand_specs {
            if brand_spec.feature_version == FEATURE_INCOMPLIANT_VERSION {
                return Err(SpecError::InvalidFeatureVersion {
                    brand: brand.clone(),
                    version: brand_spec.feature_version,
                });
            }
            if brand_spec.profiles.is_empty() {
                return Err(SpecError::NoProfiles(brand.clone()));
            }

            for (profile_index, profile) in brand_spec.profiles.iter().enumerate() {
                for (requirement_index, requirement) in
                    profile.encoding_requirements.iter().enumerate()
                {
                    validate_requirement(brand, profile_index, requirement_index, requirement)?;
                }
            }
        }
        Ok(())
    }
}

fn validate_requirement(
    brand: &str,
    profile: usize,
    requirement_index: usize,
    requirement: &EncodingRequirement,
) -> Result<(), SpecError> {
    let expected = requirement.bit_locations.len();
    if expected == 0 {
        return Err(SpecError::EmptyBitLocations {
            brand: brand.to_string(),
            profile,
            requirement: requirement_index,
        });
    }

    for value in &requirement.required_values {
        if value.len() != expected {
            return Err(SpecError::RequiredValueLength {
                brand: brand.to_string(),
                profile,
                value: value.clone(),
                expected,
            });
        }
        if !value.bytes().all(|b| b == b'0' || b == b'1') {
            return Err(SpecError::InvalidRequiredValue {
                brand: brand.to_string(),
                profile,
                value: value.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(version: u32, bit_locations: Vec<usize>, required: &[&str]) -> FeatureRequirementSpec {
        let requirement = EncodingRequirement {
            description: String::new(),
            bit_locations,
            required_values: required.iter().map(|s| s.to_string()).collect(),
        };
        let brand = BrandSpec {
            feature_version: version,
            profiles: vec![Profile {
                description: "default".into(),
                encoding_requirements: vec![requirement],
            }],
        };
        FeatureRequirementSpec {
            brand_specs: [("ABC".to_string(), brand)].into_iter().collect(),
        }
    }

    #[test]
    fn test_valid_spec() {
        assert!(spec(1, vec![0, 1], &["01", "11"]).validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_version() {
        assert_eq!(
            spec(0, vec![0], &["1"]).validate(),
            Err(SpecError::InvalidFeatureVersion {
                brand: "ABC".into(),
                version: 0
            })
        );
    }

    #[test]
    fn test_rejects_bad_requirements() {
        assert!(matches!(
            spec(1, vec![], &[]).validate(),
            Err(SpecError::EmptyBitLocations { .. })
        ));
        assert!(matches!(
            spec(1, vec![0, 1], &["011"]).validate(),
            Err(SpecError::RequiredValueLength { expected: 2, .. })
        ));
        assert!(matches!(
            spec(1, vec![0, 1], &["0x"]).validate(),
            Err(SpecError::InvalidRequiredValue { .. })
        ));
    }

    #[test]
    fn test_rejects_brand_without_profiles() {
        let mut s = spec(1, vec![0], &["1"]);
        s.brand_specs.get_mut("ABC").unwrap().profiles.clear();
        assert_eq!(s.validate(), Err(SpecError::NoProfiles("ABC".into())));
    }
}
