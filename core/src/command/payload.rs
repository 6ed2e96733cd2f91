use trellis_types::{Name, Value};

use crate::error::{Result, TrellisError};
use crate::tuple::Tuple;

/// One payload entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadField {
    Value(Value),
    One(Payload),
    Many(Vec<Payload>),
}

/// Input to a command call: scalars for the node's own relation plus nested
/// payloads keyed by combine name.
///
/// ```
/// use trellis_core::Payload;
///
/// let payload = Payload::new()
///     .with("name", "Jane")
///     .one("task", Payload::new().with("title", "Task one"));
/// assert_eq!(payload.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Vec<(Name, PayloadField)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<Name>, value: impl Into<Value>) -> Self {
        self.set(name.into(), PayloadField::Value(value.into()));
        self
    }

    #[must_use]
    pub fn one(mut self, name: impl Into<Name>, payload: Payload) -> Self {
        self.set(name.into(), PayloadField::One(payload));
        self
    }

    #[must_use]
    pub fn many(mut self, name: impl Into<Name>, payloads: Vec<Payload>) -> Self {
        self.set(name.into(), PayloadField::Many(payloads));
        self
    }

    pub(crate) fn set(&mut self, name: Name, field: PayloadField) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = field,
            None => self.fields.push((name, field)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PayloadField> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            PayloadField::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &PayloadField)> {
        self.fields.iter().map(|(n, f)| (n, f))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The scalar entries as a tuple.
    pub fn scalars(&self) -> Tuple {
        self.fields
            .iter()
            .filter_map(|(n, f)| match f {
                PayloadField::Value(v) => Some((n.clone(), v.clone())),
                _ => None,
            })
            .collect()
    }
}

impl From<()> for Payload {
    fn from((): ()) -> Self {
        Self::new()
    }
}

impl From<Tuple> for Payload {
    fn from(tuple: Tuple) -> Self {
        Self {
            fields: tuple
                .into_iter()
                .map(|(n, v)| (n, PayloadField::Value(v)))
                .collect(),
        }
    }
}

impl TryFrom<serde_json::Value> for Payload {
    type Error = TrellisError;

    /// Objects become payloads, nested objects `One`, arrays of objects `Many`.
    fn try_from(json: serde_json::Value) -> Result<Self> {
        let map = match json {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(TrellisError::InvalidPayload(format!(
                    "expected an object, got `{other}`"
                )));
            }
        };
        let mut payload = Payload::new();
        for (key, value) in map {
            let field = match value {
                serde_json::Value::Object(_) => PayloadField::One(Payload::try_from(value)?),
                serde_json::Value::Array(items) => PayloadField::Many(
                    items
                        .into_iter()
                        .map(Payload::try_from)
                        .collect::<Result<_>>()?,
                ),
                scalar => PayloadField::Value(scalar_value(&key, scalar)?),
            };
            payload.set(Name::from(key), field);
        }
        Ok(payload)
    }
}

fn scalar_value(key: &str, json: serde_json::Value) -> Result<Value> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Value::Integer(i),
            (None, Some(f)) => Value::Real(f),
            (None, None) => {
                return Err(TrellisError::InvalidPayload(format!(
                    "`{key}` is out of range: {n}"
                )));
            }
        },
        other => {
            return Err(TrellisError::InvalidPayload(format!(
                "`{key}` is not a scalar: {other}"
            )));
        }
    })
}
