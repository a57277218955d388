//! Data types, database snapshot, validation and persistence
//!
//! Contains the BOM / Identity types the codec works on and the database
//! snapshot it reads.

mod database;
mod persistence;
mod types;
pub(crate) mod validation;

pub use database::{
    BitPosition, ClassCollision, ComponentCatalog, Database, FieldChoices, ImageSpec,
};
pub use persistence::{load_database, read_text_file, save_database, write_atomic};
pub use types::{Bom, ComponentMap, Identity};
pub use validation::{
    is_valid_brand_code, is_valid_configless, is_valid_project, validate_components_bitset,
    validate_file_size,
};
