//! Attribute definitions for relation schemas.

use crate::{Name, ScalarType};

/// One attribute of a relation schema.
///
/// # Examples
///
/// ```
/// use trellis_types::{AttributeDef, ScalarType};
///
/// let id = AttributeDef::new("id", ScalarType::Serial).primary_key();
/// let user_id = AttributeDef::new("user_id", ScalarType::Integer).references("users");
///
/// assert!(id.is_primary_key());
/// assert_eq!(user_id.referenced_relation(), Some("users"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeDef {
    /// Attribute name
    pub name: Name,
    /// Declared scalar type
    pub ty: ScalarType,
    /// Whether NULL is allowed
    pub nullable: bool,
    /// Part of the primary key
    pub primary_key: bool,
    /// Relation referenced by this attribute when it is a foreign key
    pub references: Option<Name>,
}

impl AttributeDef {
    /// Creates a non-null attribute with no key flags.
    pub fn new(name: impl Into<Name>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            primary_key: false,
            references: None,
        }
    }

    /// Marks the attribute as (part of) the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the attribute as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the attribute as a foreign key into `relation`.
    #[must_use]
    pub fn references(mut self, relation: impl Into<Name>) -> Self {
        self.references = Some(relation.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    #[inline]
    #[must_use]
    pub fn referenced_relation(&self) -> Option<&str> {
        self.references.as_deref()
    }
}
