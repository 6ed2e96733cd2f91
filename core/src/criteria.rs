//! Restriction criteria and the lazy query operations recorded on a relation.

use smallvec::SmallVec;
use trellis_types::{Name, Value};

use crate::dataset::Dataset;
use crate::error::Result;
use crate::tuple::Tuple;

// =============================================================================
// Criteria
// =============================================================================

/// One condition of a [`Criteria`] conjunction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `attribute = value`. A NULL value never matches.
    Eq(Name, Value),
    /// `attribute IN (values)`. An empty list never matches.
    In(Name, Vec<Value>),
    /// `attribute IS NULL`
    IsNull(Name),
}

impl Condition {
    pub fn attribute(&self) -> &Name {
        match self {
            Self::Eq(name, _) | Self::In(name, _) | Self::IsNull(name) => name,
        }
    }

    /// Evaluates the condition against a tuple.
    pub fn matches(&self, tuple: &Tuple) -> bool {
        match self {
            Self::Eq(name, value) => match tuple.get(name) {
                Some(v) if !v.is_null() => v == value,
                _ => false,
            },
            Self::In(name, values) => match tuple.get(name) {
                Some(v) if !v.is_null() => values.contains(v),
                _ => false,
            },
            Self::IsNull(name) => tuple.get(name).is_none_or(Value::is_null),
        }
    }
}

/// A conjunction of conditions used by `restrict`.
///
/// ```
/// use trellis_core::Criteria;
///
/// let criteria = Criteria::new().eq("name", "Jane").any("id", [1, 2]);
/// assert_eq!(criteria.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    conditions: SmallVec<[Condition; 2]>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `attribute = value`.
    #[must_use]
    pub fn eq(mut self, attribute: impl Into<Name>, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(attribute.into(), value.into()));
        self
    }

    /// Adds `attribute IN (values)`.
    #[must_use]
    pub fn any<I, V>(mut self, attribute: impl Into<Name>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions.push(Condition::In(
            attribute.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Adds `attribute IS NULL`.
    #[must_use]
    pub fn is_null(mut self, attribute: impl Into<Name>) -> Self {
        self.conditions.push(Condition::IsNull(attribute.into()));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Name> {
        self.conditions.iter().map(Condition::attribute)
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        self.conditions.iter().all(|c| c.matches(tuple))
    }
}

// =============================================================================
// Ordering
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub attribute: Name,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(attribute: impl Into<Name>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(attribute: impl Into<Name>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: Direction::Desc,
        }
    }
}

impl From<&str> for OrderBy {
    fn from(attribute: &str) -> Self {
        Self::asc(attribute)
    }
}

// =============================================================================
// QueryOp
// =============================================================================

/// A pending lazy operation, replayed against the base dataset on execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOp {
    Restrict(Criteria),
    Project(Vec<Name>),
    Order(Vec<OrderBy>),
    Limit(u64),
    Offset(u64),
}

impl QueryOp {
    /// Applies the operation to `dataset`, returning the narrowed dataset.
    pub fn apply(&self, dataset: &dyn Dataset) -> Result<Box<dyn Dataset>> {
        match self {
            Self::Restrict(criteria) => dataset.restrict(criteria),
            Self::Project(names) => dataset.project(names),
            Self::Order(order) => dataset.order(order),
            Self::Limit(n) => dataset.limit(*n),
            Self::Offset(n) => dataset.offset(*n),
        }
    }
}
