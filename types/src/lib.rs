//! Shared type definitions for trellis
//!
//! This crate provides the scalar vocabulary used by every other trellis crate:
//!
//! - [`Value`] - a single scalar stored in a tuple attribute
//! - [`ScalarType`] - the declared type of an attribute
//! - [`AttributeDef`] - one attribute of a relation schema
//! - [`Name`] - identifier type used for relation and attribute names
//!
//! # Features
//!
//! - `std` - Standard library support (enabled by default)
//! - `serde` - Enable serde serialization/deserialization

mod attribute;
mod scalar;
mod value;

pub use attribute::AttributeDef;
pub use scalar::ScalarType;
pub use value::Value;

/// Identifier for relations, datasets, attributes and combine names.
pub type Name = compact_str::CompactString;

/// Prelude module for commonly used types
pub mod prelude {
    pub use crate::{AttributeDef, Name, ScalarType, Value};
}
