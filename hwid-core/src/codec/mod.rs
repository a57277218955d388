//! BOM <-> Identity codec
//!
//! Pure functions over a borrowed [`Database`](crate::data::Database): the
//! same inputs always give the same identity or BOM.

mod decoder;
mod encoder;

pub use decoder::{decode, decode_hwid_string};
pub use encoder::encode;
