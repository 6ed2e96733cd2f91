//! Flat tuples exchanged with the storage collaborator.

use trellis_types::{Name, Value};

/// An ordered mapping from attribute name to scalar value.
///
/// Tuples are what datasets yield from `each` and accept on `insert`; the
/// materializer turns them into [`Struct`](crate::Struct)s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tuple {
    entries: Vec<(Name, Value)>,
}

impl Tuple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Returns the value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Sets `name` to `value`, replacing an existing entry in place.
    pub fn insert(&mut self, name: impl Into<Name>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<Name>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Value)> {
        self.entries.iter().map(|(n, v)| (n, v))
    }

    pub fn names(&self) -> impl Iterator<Item = &Name> {
        self.entries.iter().map(|(n, _)| n)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keeps only `names`, in the order given. Missing names become NULL.
    pub fn project(&self, names: &[Name]) -> Tuple {
        names
            .iter()
            .map(|n| (n.clone(), self.get(n).cloned().unwrap_or_default()))
            .collect()
    }
}

impl FromIterator<(Name, Value)> for Tuple {
    fn from_iter<I: IntoIterator<Item = (Name, Value)>>(iter: I) -> Self {
        let mut tuple = Tuple::new();
        for (name, value) in iter {
            tuple.insert(name, value);
        }
        tuple
    }
}

impl IntoIterator for Tuple {
    type Item = (Name, Value);
    type IntoIter = std::vec::IntoIter<(Name, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut tuple = Tuple::new().with("id", 1).with("name", "Jane");
        tuple.insert("id", 2);
        let names: Vec<_> = tuple.names().map(|n| n.as_str()).collect();
        assert_eq!(names, ["id", "name"]);
        assert_eq!(tuple.get("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn project_orders_and_fills() {
        let tuple = Tuple::new().with("id", 1).with("name", "Jane");
        let projected = tuple.project(&["name".into(), "age".into()]);
        assert_eq!(
            projected,
            Tuple::new().with("name", "Jane").with("age", Value::Null)
        );
    }
}
