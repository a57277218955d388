//! Identity string layer
//!
//! Encoding schemes and the HWID string format built on them. The codec
//! produces and consumes [`crate::data::Identity`] values through this module.

mod hwid_string;
mod scheme;

pub use scheme::EncodingScheme;
