//! Attribute headers: the ordered schema surface a relation exposes.

use std::sync::Arc;

use trellis_types::{AttributeDef, Name};

use crate::combine::CombineEdge;
use crate::error::{Result, TrellisError};

/// One header entry: a scalar attribute or a nested relation.
#[derive(Debug, Clone)]
pub enum Attribute {
    Scalar(AttributeDef),
    Nested(Arc<CombineEdge>),
}

impl Attribute {
    /// Attribute name, or the combine name for nested relations.
    pub fn name(&self) -> &Name {
        match self {
            Self::Scalar(def) => &def.name,
            Self::Nested(edge) => &edge.name,
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Self::Nested(_))
    }
}

/// Ordered attribute list. Order defines struct field order and AST order.
#[derive(Debug, Clone, Default)]
pub struct Header {
    attributes: Vec<Attribute>,
}

impl Header {
    pub fn from_defs(defs: &[AttributeDef]) -> Self {
        Self {
            attributes: defs.iter().cloned().map(Attribute::Scalar).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn scalars(&self) -> impl Iterator<Item = &AttributeDef> {
        self.attributes.iter().filter_map(|a| match a {
            Attribute::Scalar(def) => Some(def),
            Attribute::Nested(_) => None,
        })
    }

    pub fn nested(&self) -> impl Iterator<Item = &Arc<CombineEdge>> {
        self.attributes.iter().filter_map(|a| match a {
            Attribute::Nested(edge) => Some(edge),
            Attribute::Scalar(_) => None,
        })
    }

    pub fn scalar_names(&self) -> Vec<Name> {
        self.scalars().map(|def| def.name.clone()).collect()
    }

    pub fn scalar(&self, name: &str) -> Option<&AttributeDef> {
        self.scalars().find(|def| def.name == name)
    }

    pub fn contains_scalar(&self, name: &str) -> bool {
        self.scalar(name).is_some()
    }

    /// Any attribute, scalar or nested, called `name`.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// Narrows scalars to `names` (in that order), keeping nested attributes.
    pub fn project(&self, relation: &str, names: &[Name]) -> Result<Header> {
        let mut attributes = Vec::with_capacity(names.len());
        for name in names {
            if attributes
                .iter()
                .any(|a: &Attribute| a.name() == name)
            {
                continue;
            }
            let def = self
                .scalar(name)
                .ok_or_else(|| TrellisError::unknown_attribute(relation, name))?;
            attributes.push(Attribute::Scalar(def.clone()));
        }
        attributes.extend(self.attributes.iter().filter(|a| a.is_nested()).cloned());
        Ok(Header { attributes })
    }

    /// Appends a nested attribute. Its name must not collide with an existing one.
    pub fn with_nested(&self, relation: &str, edge: Arc<CombineEdge>) -> Result<Header> {
        if self.get(&edge.name).is_some() {
            return Err(TrellisError::invalid_key_pair(
                relation,
                format!("`{}` already names an attribute of `{relation}`", edge.name),
            ));
        }
        let mut attributes = self.attributes.clone();
        attributes.push(Attribute::Nested(edge));
        Ok(Header { attributes })
    }
}
