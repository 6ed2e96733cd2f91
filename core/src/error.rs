use core::convert::Infallible;

use thiserror::Error;
use trellis_types::Name;

#[derive(Debug, Error)]
pub enum TrellisError {
    /// A referenced attribute is absent from the relation header
    #[error("Unknown attribute `{attribute}` on relation `{relation}`")]
    UnknownAttribute { relation: Name, attribute: Name },

    /// A key pair references an attribute missing on one side of a combination
    #[error("Invalid key pair for relation `{relation}`: {reason}")]
    InvalidKeyPair { relation: Name, reason: String },

    /// Row count violated a single-result contract
    #[error("Expected {expected} tuple, found {actual}")]
    TupleCountMismatch { expected: &'static str, actual: usize },

    /// Unsupported command type
    #[error("Unsupported command type `{0}`, expected one of: create, update, delete")]
    InvalidCommandType(String),

    /// Relation not declared in the registry
    #[error("Unknown relation `{0}`")]
    UnknownRelation(Name),

    /// Struct schema not declared in the registry
    #[error("Unknown struct type `{0}`")]
    UnknownStructType(Name),

    /// A declared struct field has no value in the materialized mapping
    #[error("Cannot construct `{type_name}`: missing attribute `{attribute}`")]
    StructConstruction { type_name: Name, attribute: Name },

    /// Command payload does not fit the command graph
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Error converting structs into caller types
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Error reported by the storage collaborator
    #[error("Storage error: {0}")]
    Storage(String),

    /// Rusqlite specific errors
    #[cfg(feature = "rusqlite")]
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

impl TrellisError {
    pub(crate) fn unknown_attribute(relation: &str, attribute: &str) -> Self {
        Self::UnknownAttribute {
            relation: relation.into(),
            attribute: attribute.into(),
        }
    }

    pub(crate) fn invalid_key_pair(relation: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKeyPair {
            relation: relation.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for TrellisError {
    fn from(err: serde_json::Error) -> Self {
        Self::Mapping(err.to_string())
    }
}

impl From<Infallible> for TrellisError {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}

/// Result type for trellis operations
pub type Result<T> = std::result::Result<T, TrellisError>;
