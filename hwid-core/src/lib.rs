//! HWID Core Library
//!
//! Hardware ID tooling for device manufacturing lines.
//!
//! # Features
//!
//! - **Identity Codec**: Bit-level encoding of a bill of materials into an HWID string and back
//! - **Value Matchers**: Exact, regular expression and numeric range matching of probed values
//! - **Rule Engine**: Sandboxed expression rules that validate and adjust component data
//! - **Feature Compliance**: Brand feature versions derived from identity bits
//!
//! # Module Structure
//!
//! - `data/` - BOM, Identity, database snapshot, validation, persistence
//! - `identity/` - Encoding schemes and the HWID string format
//! - `codec/` - BOM <-> Identity encoding and decoding
//! - `rule/` - Value matchers, expression parser, interpreter, rule functions
//! - `feature/` - Feature requirement specs, checker, checksum-gated sources
//!
//! # Example
//!
//! ```no_run
//! use hwid_core::{decode, encode, load_database, Bom};
//! use std::path::Path;
//!
//! let db = load_database(Path::new("database.json")).unwrap();
//! let bom = Bom::new(0, 0).with_component("cpu", ["cpu_a"]);
//! let identity = encode(&db, &bom, None, None).unwrap();
//! assert_eq!(decode(&db, &identity).unwrap(), bom);
//! ```

// Grouped modules
pub mod codec;
pub mod data;
pub mod feature;
pub mod identity;
pub mod rule;

// Standalone modules
pub mod constants;
pub mod settings;

// Re-export primary types from data/
pub use data::{
    BitPosition, Bom, ClassCollision, ComponentCatalog, ComponentMap, Database, FieldChoices,
    Identity, ImageSpec,
};

// Re-export persistence functions from data/
pub use data::{load_database, read_text_file, save_database, write_atomic};

// Re-export validation functions from data/
pub use data::{
    is_valid_brand_code, is_valid_configless, is_valid_project, validate_components_bitset,
    validate_file_size,
};

// Re-export error types
pub use hwid_error::{CodecError, DatabaseError, HwidError, Result, RuleError, SpecError};

// Re-export codec
pub use codec::{decode, decode_hwid_string, encode};
pub use identity::EncodingScheme;

// Re-export rule engine
pub use rule::{
    builtins, evaluate_once, identify_components, match_probed_values, Context, ErrorSink,
    FunctionRegistry, ProbedRecord, ProbedValue, Rule, Val, Value,
};

// Re-export feature compliance
pub use feature::{
    generate_feature_matcher_raw_source, load_feature_requirement_spec, load_spec_file,
    parse_spec_body, print_spec_body, save_spec_file, FeatureRequirementSpec,
    FeatureRequirementSpecChecker,
};

// Re-export settings
pub use settings::{load_settings, save_settings, Settings};
