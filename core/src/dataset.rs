//! The storage collaborator interface.
//!
//! The engine never talks SQL. It drives a [`Dataset`], a handle to one stored
//! relation that can be narrowed (restrict, project, order, limit, offset),
//! iterated, and written to. A [`Storage`] hands out base datasets by name and
//! owns transaction boundaries.

use core::fmt;

use trellis_types::{AttributeDef, Name};

use crate::criteria::{Criteria, OrderBy};
use crate::error::Result;
use crate::tuple::Tuple;

/// A queryable, writable handle to one stored relation.
///
/// Narrowing methods return a new handle and never mutate `self`. Writes
/// (`update`, `delete`) act on every tuple matching the accumulated
/// restrictions; projection, ordering and paging only affect `each`.
pub trait Dataset: fmt::Debug + Send + Sync {
    /// The dataset (table) name.
    fn name(&self) -> &str;

    /// Attributes in storage order, with declared types and key flags.
    fn header(&self) -> &[AttributeDef];

    /// Narrows to tuples matching `criteria` (conjunction with earlier restrictions).
    fn restrict(&self, criteria: &Criteria) -> Result<Box<dyn Dataset>>;

    /// Narrows yielded tuples to `names`, in that order.
    fn project(&self, names: &[Name]) -> Result<Box<dyn Dataset>>;

    /// Appends ordering terms.
    fn order(&self, order: &[OrderBy]) -> Result<Box<dyn Dataset>>;

    /// Caps the number of yielded tuples. A second limit keeps the smaller cap.
    fn limit(&self, limit: u64) -> Result<Box<dyn Dataset>>;

    /// Skips tuples before yielding. Offsets accumulate.
    fn offset(&self, offset: u64) -> Result<Box<dyn Dataset>>;

    /// Executes the read and returns the tuples in order.
    fn each(&self) -> Result<Vec<Tuple>>;

    /// Inserts one tuple, returning the stored tuple including generated values.
    fn insert(&self, tuple: &Tuple) -> Result<Tuple>;

    /// Applies `changes` to every restricted tuple, returning the updated tuples.
    fn update(&self, changes: &Tuple) -> Result<Vec<Tuple>>;

    /// Deletes every restricted tuple, returning the deleted tuples.
    fn delete(&self) -> Result<Vec<Tuple>>;
}

/// Source of base datasets and transaction boundaries.
///
/// Callers needing atomic cascading writes must supply a storage whose
/// `begin`/`commit`/`rollback` are transactional; the defaults are no-ops.
pub trait Storage: Send + Sync {
    /// Returns the base dataset stored under `name`.
    fn dataset(&self, name: &str) -> Result<Box<dyn Dataset>>;

    fn begin(&self) -> Result<()> {
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        Ok(())
    }
}
