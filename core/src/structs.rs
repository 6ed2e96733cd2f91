//! Immutable materialized values.
//!
//! A [`Struct`] is what callers get back from reads and commands: an ordered
//! set of fields where each field holds a scalar, a single nested struct (or
//! null), or an array of nested structs.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use trellis_types::{Name, Value};

use crate::error::{Result, TrellisError};
use crate::schema::StructSchema;

/// One field of a [`Struct`].
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value(Value),
    One(Option<Struct>),
    Many(Vec<Struct>),
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => value.serialize(serializer),
            Self::One(one) => one.serialize(serializer),
            Self::Many(many) => many.serialize(serializer),
        }
    }
}

/// An immutable struct value. Cloning is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    type_name: Name,
    fields: Arc<[(Name, Field)]>,
}

impl Struct {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> impl Iterator<Item = (&Name, &Field)> {
        self.fields.iter().map(|(n, f)| (n, f))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Scalar field value.
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Nested single struct, `None` when absent or null.
    pub fn one(&self, name: &str) -> Option<&Struct> {
        match self.get(name)? {
            Field::One(one) => one.as_ref(),
            _ => None,
        }
    }

    /// Nested struct array.
    pub fn many(&self, name: &str) -> Option<&[Struct]> {
        match self.get(name)? {
            Field::Many(many) => Some(many),
            _ => None,
        }
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(Value::as_i64)
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Converts into a caller type through its serde representation.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json()?)?)
    }
}

impl Serialize for Struct {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, field) in self.fields.iter() {
            map.serialize_entry(name.as_str(), field)?;
        }
        map.end()
    }
}

/// Materialization target of a relation node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructType {
    /// Structural record carrying every header attribute.
    Generic(Name),
    /// Declared schema: only its fields, in its order, all required.
    Declared(Arc<StructSchema>),
}

impl StructType {
    pub fn name(&self) -> &Name {
        match self {
            Self::Generic(name) => name,
            Self::Declared(schema) => &schema.name,
        }
    }

    pub fn is_declared(&self) -> bool {
        matches!(self, Self::Declared(_))
    }

    /// Builds a struct from an attribute mapping in header order.
    pub fn construct(&self, mut fields: Vec<(Name, Field)>) -> Result<Struct> {
        match self {
            Self::Generic(name) => Ok(Struct {
                type_name: name.clone(),
                fields: fields.into(),
            }),
            Self::Declared(schema) => {
                let mut ordered = Vec::with_capacity(schema.fields.len());
                for field in &schema.fields {
                    let position = fields.iter().position(|(n, _)| n == field).ok_or_else(|| {
                        TrellisError::StructConstruction {
                            type_name: schema.name.clone(),
                            attribute: field.clone(),
                        }
                    })?;
                    ordered.push(fields.swap_remove(position));
                }
                Ok(Struct {
                    type_name: schema.name.clone(),
                    fields: ordered.into(),
                })
            }
        }
    }
}
