//! Relation declarations and resolved relation schemas.

use smallvec::SmallVec;
use trellis_types::{AttributeDef, Name};

use crate::combine::KeyPair;

// =============================================================================
// Associations
// =============================================================================

/// The shape of a declared association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    /// The target holds a foreign key to this relation; at most one target tuple.
    One,
    /// The target holds a foreign key to this relation.
    Many,
    /// This relation holds a foreign key to the target (many-to-one).
    Belongs,
}

/// A named association between two relations, used for key inference.
///
/// ```
/// use trellis_core::schema::Association;
///
/// let labels = Association::many("labels").through("posts_labels");
/// let author = Association::belongs("author").relation("users");
///
/// assert_eq!(labels.target(), "labels");
/// assert_eq!(author.target(), "users");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub name: Name,
    pub kind: AssociationKind,
    pub relation: Option<Name>,
    pub keys: Option<KeyPair>,
    pub through: Option<Name>,
}

impl Association {
    fn new(name: impl Into<Name>, kind: AssociationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            relation: None,
            keys: None,
            through: None,
        }
    }

    pub fn one(name: impl Into<Name>) -> Self {
        Self::new(name, AssociationKind::One)
    }

    pub fn many(name: impl Into<Name>) -> Self {
        Self::new(name, AssociationKind::Many)
    }

    pub fn belongs(name: impl Into<Name>) -> Self {
        Self::new(name, AssociationKind::Belongs)
    }

    /// Target relation, when it differs from the association name.
    #[must_use]
    pub fn relation(mut self, relation: impl Into<Name>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    /// Explicit key pair: `parent` on the owning side, `child` on the side holding the foreign key.
    #[must_use]
    pub fn keys(mut self, parent: impl Into<Name>, child: impl Into<Name>) -> Self {
        self.keys = Some(KeyPair::new(parent, child));
        self
    }

    /// Join relation for many-to-many associations.
    #[must_use]
    pub fn through(mut self, relation: impl Into<Name>) -> Self {
        self.through = Some(relation.into());
        self
    }

    pub fn target(&self) -> &str {
        self.relation.as_deref().unwrap_or(&self.name)
    }
}

// =============================================================================
// Declarations
// =============================================================================

/// A relation as declared during configuration.
///
/// Attributes are optional: when none are declared, the header is read from
/// the storage collaborator when the registry is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDecl {
    pub(crate) name: Name,
    pub(crate) dataset: Option<Name>,
    pub(crate) attributes: Vec<AttributeDef>,
    pub(crate) primary_key: Vec<Name>,
    pub(crate) associations: Vec<Association>,
    pub(crate) struct_type: Option<Name>,
}

impl RelationDecl {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            dataset: None,
            attributes: Vec::new(),
            primary_key: Vec::new(),
            associations: Vec::new(),
            struct_type: None,
        }
    }

    /// Stored dataset name, when it differs from the relation name.
    #[must_use]
    pub fn dataset(mut self, dataset: impl Into<Name>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn primary_key<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Name>,
    {
        self.primary_key = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn associate(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    /// Default struct schema materialized for this relation.
    #[must_use]
    pub fn struct_type(mut self, name: impl Into<Name>) -> Self {
        self.struct_type = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dataset_name(&self) -> &str {
        self.dataset.as_deref().unwrap_or(&self.name)
    }
}

// =============================================================================
// Resolved schema
// =============================================================================

/// A relation schema with its header resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSchema {
    pub name: Name,
    pub dataset: Name,
    pub attributes: Vec<AttributeDef>,
    pub primary_key: SmallVec<[Name; 2]>,
    pub associations: Vec<Association>,
    pub struct_type: Option<Name>,
}

impl RelationSchema {
    /// Resolves a declaration against the header reported by storage.
    pub(crate) fn resolve(decl: &RelationDecl, stored: &[AttributeDef]) -> Self {
        let attributes = if decl.attributes.is_empty() {
            stored.to_vec()
        } else {
            decl.attributes.clone()
        };
        let primary_key = if decl.primary_key.is_empty() {
            attributes
                .iter()
                .filter(|a| a.primary_key)
                .map(|a| a.name.clone())
                .collect()
        } else {
            decl.primary_key.iter().cloned().collect()
        };
        Self {
            name: decl.name.clone(),
            dataset: Name::from(decl.dataset_name()),
            attributes,
            primary_key,
            associations: decl.associations.clone(),
            struct_type: decl.struct_type.clone(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// The first primary key attribute.
    pub fn primary_key(&self) -> Option<&Name> {
        self.primary_key.first()
    }

    /// `true` when `relation` names this relation or its dataset.
    pub fn is_named(&self, relation: &str) -> bool {
        self.name == relation || self.dataset == relation
    }

    /// The first attribute declared as a foreign key into `target`.
    pub fn foreign_key_into(&self, target: &RelationSchema) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| {
            a.referenced_relation()
                .is_some_and(|r| target.is_named(r))
        })
    }

    /// The association called `name`, or else the first one targeting `target`.
    pub fn association(&self, name: &str, target: &str) -> Option<&Association> {
        self.associations
            .iter()
            .find(|a| a.name == name)
            .or_else(|| self.associations.iter().find(|a| a.target() == target))
    }
}

// =============================================================================
// Struct schemas
// =============================================================================

/// A declared materialization target: an ordered, strict list of fields.
///
/// Constructing a struct of this type fails when any field is missing from
/// the materialized mapping; attributes not listed are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructSchema {
    pub name: Name,
    pub fields: Vec<Name>,
}

impl StructSchema {
    pub fn new<I, N>(name: impl Into<Name>, fields: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Name>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}
