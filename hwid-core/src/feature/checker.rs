//! Feature compliance checking
//!
//! Matches the bits of an identity against the profiles of its brand. Not
//! having a brand, or having one the spec does not know, is not an error: the
//! device is simply incompliant.

use tracing::debug;

use hwid_error::SpecError;

use super::spec::{EncodingRequirement, FeatureRequirementSpec, Profile};
use crate::constants::feature::FEATURE_INCOMPLIANT_VERSION;
use crate::data::Identity;

/// Validated feature requirement spec, ready to check identities
#[derive(Debug, Clone)]
pub struct FeatureRequirementSpecChecker {
    spec: FeatureRequirementSpec,
}

impl FeatureRequirementSpecChecker {
    /// Validate `spec`; an invalid spec yields no checker
    pub fn new(spec: FeatureRequirementSpec) -> Result<Self, SpecError> {
        spec.validate()?;
        Ok(Self { spec })
    }

    pub fn spec(&self) -> &FeatureRequirementSpec {
        &self.spec
    }

    /// Feature version the identity complies with, or `FEATURE_INCOMPLIANT_VERSION`
    pub fn check_feature_compliance_version(&self, identity: &Identity) -> u32 {
        let Some(brand) = identity.brand_code.as_deref() else {
            debug!(hwid = %identity, "No brand code, feature incompliant");
            return FEATURE_INCOMPLIANT_VERSION;
        };
        let Some(brand_spec) = self.spec.brand_specs.get(brand) else {
            debug!(hwid = %identity, brand, "Unknown brand, feature incompliant");
            return FEATURE_INCOMPLIANT_VERSION;
        };

        let bits = identity.bit_string().as_bytes();
        match brand_spec
            .profiles
            .iter()
            .position(|profile| profile_satisfied(profile, bits))
        {
            Some(profile) => {
                debug!(
                    hwid = %identity,
                    brand,
                    profile,
                    version = brand_spec.feature_version,
                    "Identity is feature compliant"
                );
                brand_spec.feature_version
            }
            None => {
                debug!(hwid = %identity, brand, "No profile satisfied");
                FEATURE_INCOMPLIANT_VERSION
            }
        }
    }
}

fn profile_satisfied(profile: &Profile, bits: &[u8]) -> bool {
    profile
        .encoding_requirements
        .iter()
        .all(|requirement| requirement_satisfied(requirement, bits))
}

fn requirement_satisfied(requirement: &EncodingRequirement, bits: &[u8]) -> bool {
    // Positions past the end read as '0'
    let actual: String = requirement
        .bit_locations
        .iter()
        .map(|&location| bits.get(location).map_or('0', |&b| b as char))
        .collect();
    requirement.required_values.iter().any(|value| *value == actual)
}
