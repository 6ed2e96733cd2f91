//! Combination trees: how a relation's tuples nest child relations.
//!
//! Every combination is an edge carrying a [`CombineKind`], a [`KeyPair`] and
//! the combine name the child lands under. The key pair always reads
//! "owner key -> foreign key": for `One`/`Many` the root is the owner and the
//! child holds the foreign key; for `Wrap` the nested relation is the owner
//! and the root holds the foreign key.

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use trellis_types::Name;

use crate::dataset::Dataset;
use crate::error::{Result, TrellisError};
use crate::header::Header;
use crate::helpers::{foreign_key_for, singularize};
use crate::relation::RelationNode;
use crate::schema::{AssociationKind, RelationSchema};

/// How child tuples attach to a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineKind {
    /// A single child struct or null.
    One,
    /// An array of child structs, possibly empty.
    Many,
    /// A single owner struct nested under the tuple holding the foreign key.
    Wrap,
}

impl CombineKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::One => "one",
            Self::Many => "many",
            Self::Wrap => "wrap",
        }
    }

    /// `true` when the root owns the key and the child holds the foreign key.
    pub const fn root_owns_key(&self) -> bool {
        !matches!(self, Self::Wrap)
    }

    /// Default combine name for a child relation.
    pub fn default_name(&self, relation: &str) -> Name {
        match self {
            Self::Many => Name::from(relation),
            Self::One | Self::Wrap => Name::from(singularize(relation)),
        }
    }
}

impl core::fmt::Display for CombineKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner key and foreign key of a combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPair {
    pub parent_key: Name,
    pub child_key: Name,
}

impl KeyPair {
    pub fn new(parent_key: impl Into<Name>, child_key: impl Into<Name>) -> Self {
        Self {
            parent_key: parent_key.into(),
            child_key: child_key.into(),
        }
    }
}

impl core::fmt::Display for KeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{{{}: {}}}", self.parent_key, self.child_key)
    }
}

impl Serialize for KeyPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.parent_key.as_str(), self.child_key.as_str())?;
        map.end()
    }
}

/// Join relation of a many-to-many combination.
///
/// `parent_key` references the root's owner key, `child_key` the child's.
#[derive(Debug, Clone)]
pub struct Through {
    pub relation: Name,
    pub dataset: Arc<dyn Dataset>,
    pub parent_key: Name,
    pub child_key: Name,
}

/// One combination: a child node nested under `name`.
#[derive(Debug, Clone)]
pub struct CombineEdge {
    pub kind: CombineKind,
    pub name: Name,
    pub keys: KeyPair,
    pub through: Option<Through>,
    pub node: RelationNode,
}

impl CombineEdge {
    /// Attribute of the root tuple used for matching.
    pub fn root_key(&self) -> &Name {
        match self.kind {
            CombineKind::Wrap => &self.keys.child_key,
            CombineKind::One | CombineKind::Many => &self.keys.parent_key,
        }
    }

    /// Attribute of the nested node's tuples used for matching.
    pub fn node_key(&self) -> &Name {
        match self.kind {
            CombineKind::Wrap => &self.keys.parent_key,
            CombineKind::One | CombineKind::Many => &self.keys.child_key,
        }
    }

    /// Checks that both keys exist in the headers as composed right now.
    pub(crate) fn validate(&self, root: &str, root_header: &Header) -> Result<()> {
        let child = self.node.name();
        let child_header = self.node.header();
        let (node_key, root_key) = (self.node_key(), self.root_key());
        if !root_header.contains_scalar(root_key) {
            return Err(TrellisError::invalid_key_pair(
                root,
                format!("`{root_key}` is not an attribute of `{root}`"),
            ));
        }
        if !child_header.contains_scalar(node_key) {
            return Err(TrellisError::invalid_key_pair(
                root,
                format!("`{node_key}` is not an attribute of `{child}`"),
            ));
        }
        Ok(())
    }
}

/// Read-only view of a node's combinations, in the order they were added.
#[derive(Debug, Clone)]
pub struct CombineTree {
    pub root: Name,
    pub children: Vec<Arc<CombineEdge>>,
}

impl CombineTree {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of edges in the whole tree.
    pub fn edge_count(&self) -> usize {
        self.children
            .iter()
            .map(|edge| 1 + edge.node.combine_tree().edge_count())
            .sum()
    }

    /// Length of the longest root-to-leaf path, counting the root.
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|edge| edge.node.combine_tree().depth())
            .max()
            .unwrap_or(0)
    }
}

// =============================================================================
// Key inference
// =============================================================================

/// Keys for a combination, before validation against headers.
pub(crate) struct InferredKeys {
    pub keys: KeyPair,
    pub through: Option<(Name, Name, Name)>,
}

/// Infers keys for a `One`/`Many` combination of `child` under `root`.
///
/// Declared associations win, then foreign key metadata, then the
/// `<singular root>_id` convention.
pub(crate) fn infer_combine_keys(
    root: &RelationSchema,
    name: &str,
    child: &RelationSchema,
    join: impl Fn(&str) -> Option<Arc<RelationSchema>>,
) -> Result<InferredKeys> {
    let association = root
        .association(name, &child.name)
        .filter(|a| a.kind != AssociationKind::Belongs);
    if let Some(association) = association {
        if let Some(keys) = &association.keys {
            return Ok(InferredKeys {
                keys: keys.clone(),
                through: None,
            });
        }
        if let Some(through) = &association.through {
            let join = join(through.as_str())
                .ok_or_else(|| TrellisError::UnknownRelation(through.clone()))?;
            return infer_through_keys(root, child, &join);
        }
    }
    let parent_key = owner_key(root)?;
    let child_key = child
        .foreign_key_into(root)
        .map(|a| a.name.clone())
        .or_else(|| {
            let conventional = foreign_key_for(&root.name);
            child.has_attribute(&conventional).then_some(conventional)
        })
        .ok_or_else(|| {
            TrellisError::invalid_key_pair(
                &root.name,
                format!("cannot infer a foreign key from `{}` to `{}`", child.name, root.name),
            )
        })?;
    Ok(InferredKeys {
        keys: KeyPair::new(parent_key, child_key),
        through: None,
    })
}

/// Infers keys for wrapping `owner` under `name` on `root`, which holds the foreign key.
pub(crate) fn infer_wrap_keys(
    root: &RelationSchema,
    name: &str,
    owner: &RelationSchema,
) -> Result<KeyPair> {
    let association = root
        .association(name, &owner.name)
        .filter(|a| a.kind == AssociationKind::Belongs);
    if let Some(keys) = association.and_then(|a| a.keys.as_ref()) {
        return Ok(keys.clone());
    }
    let parent_key = owner_key(owner)?;
    let child_key = root
        .foreign_key_into(owner)
        .map(|a| a.name.clone())
        .or_else(|| {
            [Name::from(format!("{name}_id")), foreign_key_for(&owner.name)]
                .into_iter()
                .find(|candidate| root.has_attribute(candidate))
        })
        .ok_or_else(|| {
            TrellisError::invalid_key_pair(
                &root.name,
                format!("cannot infer a foreign key from `{}` to `{}`", root.name, owner.name),
            )
        })?;
    Ok(KeyPair::new(parent_key, child_key))
}

/// Infers keys for a many-to-many combination through `join`.
pub(crate) fn infer_through_keys(
    root: &RelationSchema,
    child: &RelationSchema,
    join: &RelationSchema,
) -> Result<InferredKeys> {
    let find = |target: &RelationSchema| {
        join.foreign_key_into(target)
            .map(|a| a.name.clone())
            .or_else(|| {
                let conventional = foreign_key_for(&target.name);
                join.has_attribute(&conventional).then_some(conventional)
            })
            .ok_or_else(|| {
                TrellisError::invalid_key_pair(
                    &join.name,
                    format!("cannot infer a foreign key from `{}` to `{}`", join.name, target.name),
                )
            })
    };
    let join_parent = find(root)?;
    let join_child = find(child)?;
    Ok(InferredKeys {
        keys: KeyPair::new(owner_key(root)?, owner_key(child)?),
        through: Some((join.name.clone(), join_parent, join_child)),
    })
}

fn owner_key(schema: &RelationSchema) -> Result<Name> {
    schema.primary_key().cloned().ok_or_else(|| {
        TrellisError::invalid_key_pair(
            &schema.name,
            format!("`{}` has no primary key", schema.name),
        )
    })
}
