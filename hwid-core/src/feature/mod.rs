//! Feature compliance
//!
//! A [`FeatureRequirementSpec`] lists, per brand, the bit patterns an identity
//! must carry to be compliant with the brand's feature version.

mod checker;
mod source;
mod spec;
mod textproto;

pub use checker::FeatureRequirementSpecChecker;
pub use source::{
    compute_checksum, generate_feature_matcher_raw_source, load_feature_requirement_spec,
    load_spec_file, save_spec_file, split_checksum_header, verify_checksum,
};
pub use spec::{BrandSpec, EncodingRequirement, FeatureRequirementSpec, Profile};
pub use textproto::{parse_spec_body, print_spec_body};
