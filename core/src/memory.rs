//! In-memory storage.
//!
//! Tables are shared between every dataset handle opened from the same
//! [`MemoryStorage`], so writes through one handle are visible through all.
//! Transactions are no-ops.

use core::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use trellis_types::{AttributeDef, Name, ScalarType, Value};

use crate::criteria::{Criteria, Direction, OrderBy};
use crate::dataset::{Dataset, Storage};
use crate::error::{Result, TrellisError};
use crate::trellis_trace_query;
use crate::tuple::Tuple;

#[derive(Debug)]
struct Table {
    header: Arc<[AttributeDef]>,
    rows: Vec<Tuple>,
    serial: i64,
}

type SharedTable = Arc<Mutex<Table>>;

fn lock(table: &SharedTable) -> MutexGuard<'_, Table> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A set of in-memory tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: HashMap<Name, SharedTable>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty table.
    #[must_use]
    pub fn table<I>(mut self, name: impl Into<Name>, header: I) -> Self
    where
        I: IntoIterator<Item = AttributeDef>,
    {
        let table = Table {
            header: header.into_iter().collect(),
            rows: Vec::new(),
            serial: 0,
        };
        self.tables.insert(name.into(), Arc::new(Mutex::new(table)));
        self
    }

    /// Inserts a tuple into `name`, returning the stored tuple.
    pub fn insert(&self, name: &str, tuple: Tuple) -> Result<Tuple> {
        self.dataset(name)?.insert(&tuple)
    }

    fn shared(&self, name: &str) -> Result<&SharedTable> {
        self.tables
            .get(name)
            .ok_or_else(|| TrellisError::UnknownRelation(name.into()))
    }
}

impl Storage for MemoryStorage {
    fn dataset(&self, name: &str) -> Result<Box<dyn Dataset>> {
        let table = self.shared(name)?;
        let header = Arc::clone(&lock(table).header);
        Ok(Box::new(MemoryDataset {
            name: name.into(),
            header,
            table: Arc::clone(table),
            criteria: Vec::new(),
            projection: None,
            order: Vec::new(),
            limit: None,
            offset: 0,
        }))
    }
}

/// A narrowed view over one in-memory table.
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    name: Name,
    header: Arc<[AttributeDef]>,
    table: SharedTable,
    criteria: Vec<Criteria>,
    projection: Option<Vec<Name>>,
    order: Vec<OrderBy>,
    limit: Option<u64>,
    offset: u64,
}

impl MemoryDataset {
    fn matches(&self, row: &Tuple) -> bool {
        self.criteria.iter().all(|c| c.matches(row))
    }

    fn check(&self, name: &str) -> Result<()> {
        if self.header.iter().any(|a| a.name == name) {
            Ok(())
        } else {
            Err(TrellisError::unknown_attribute(&self.name, name))
        }
    }

    fn boxed(self) -> Result<Box<dyn Dataset>> {
        Ok(Box::new(self))
    }
}

impl Dataset for MemoryDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn header(&self) -> &[AttributeDef] {
        &self.header
    }

    fn restrict(&self, criteria: &Criteria) -> Result<Box<dyn Dataset>> {
        for attribute in criteria.attributes() {
            self.check(attribute)?;
        }
        let mut next = self.clone();
        if !criteria.is_empty() {
            next.criteria.push(criteria.clone());
        }
        next.boxed()
    }

    fn project(&self, names: &[Name]) -> Result<Box<dyn Dataset>> {
        for name in names {
            self.check(name)?;
        }
        let mut next = self.clone();
        next.projection = Some(names.to_vec());
        next.boxed()
    }

    fn order(&self, order: &[OrderBy]) -> Result<Box<dyn Dataset>> {
        for term in order {
            self.check(&term.attribute)?;
        }
        let mut next = self.clone();
        next.order.extend_from_slice(order);
        next.boxed()
    }

    fn limit(&self, limit: u64) -> Result<Box<dyn Dataset>> {
        let mut next = self.clone();
        next.limit = Some(next.limit.map_or(limit, |current| current.min(limit)));
        next.boxed()
    }

    fn offset(&self, offset: u64) -> Result<Box<dyn Dataset>> {
        let mut next = self.clone();
        next.offset += offset;
        next.boxed()
    }

    fn each(&self) -> Result<Vec<Tuple>> {
        let table = lock(&self.table);
        let mut rows: Vec<&Tuple> = table.rows.iter().filter(|r| self.matches(r)).collect();
        if !self.order.is_empty() {
            rows.sort_by(|a, b| {
                self.order
                    .iter()
                    .map(|term| {
                        let ordering = compare(
                            a.get(&term.attribute).unwrap_or(&Value::Null),
                            b.get(&term.attribute).unwrap_or(&Value::Null),
                        );
                        match term.direction {
                            Direction::Asc => ordering,
                            Direction::Desc => ordering.reverse(),
                        }
                    })
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = self
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let tuples: Vec<Tuple> = rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| match &self.projection {
                Some(names) => row.project(names),
                None => row.clone(),
            })
            .collect();
        trellis_trace_query!(self.name, self.criteria.len());
        Ok(tuples)
    }

    fn insert(&self, tuple: &Tuple) -> Result<Tuple> {
        let mut table = lock(&self.table);
        for name in tuple.names() {
            self.check(name)?;
        }
        let mut stored = Tuple::with_capacity(self.header.len());
        for attribute in self.header.iter() {
            let value = match tuple.get(&attribute.name) {
                Some(value) if !value.is_null() => value.clone(),
                _ if attribute.ty == ScalarType::Serial => {
                    table.serial += 1;
                    Value::Integer(table.serial)
                }
                _ => Value::Null,
            };
            if attribute.ty == ScalarType::Serial {
                if let Some(id) = value.as_i64() {
                    table.serial = table.serial.max(id);
                }
            }
            stored.insert(attribute.name.clone(), value);
        }
        table.rows.push(stored.clone());
        trellis_trace_query!(self.name, tuple.len());
        Ok(stored)
    }

    fn update(&self, changes: &Tuple) -> Result<Vec<Tuple>> {
        for name in changes.names() {
            self.check(name)?;
        }
        let mut table = lock(&self.table);
        let mut updated = Vec::new();
        for row in table.rows.iter_mut().filter(|r| self.criteria.iter().all(|c| c.matches(r))) {
            for (name, value) in changes.iter() {
                row.insert(name.clone(), value.clone());
            }
            updated.push(row.clone());
        }
        trellis_trace_query!(self.name, changes.len());
        Ok(updated)
    }

    fn delete(&self) -> Result<Vec<Tuple>> {
        let mut table = lock(&self.table);
        let (deleted, kept): (Vec<Tuple>, Vec<Tuple>) =
            table.rows.drain(..).partition(|r| self.matches(r));
        table.rows = kept;
        trellis_trace_query!(self.name, deleted.len());
        Ok(deleted)
    }
}

/// Total order used for sorting: NULL first, then numbers, text, blobs.
fn compare(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) | Value::Integer(_) | Value::Real(_) => 1,
            Value::Text(_) => 2,
            Value::Blob(_) => 3,
        }
    }
    match (a, b) {
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        _ => {
            let number = |v: &Value| v.as_f64().or(v.as_bool().map(f64::from));
            match (number(a), number(b)) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => rank(a).cmp(&rank(b)),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! users / tasks / tags, seeded with Jane and Joe.

    use super::*;
    use crate::registry::{Catalog, Registry};
    use crate::relation::RelationNode;
    use crate::schema::{Association, RelationDecl, StructSchema};

    pub fn storage() -> MemoryStorage {
        let storage = MemoryStorage::new()
            .table(
                "users",
                [
                    AttributeDef::new("id", ScalarType::Serial).primary_key(),
                    AttributeDef::new("name", ScalarType::Text),
                    AttributeDef::new("email", ScalarType::Text).nullable(),
                ],
            )
            .table(
                "tasks",
                [
                    AttributeDef::new("id", ScalarType::Serial).primary_key(),
                    AttributeDef::new("user_id", ScalarType::Integer).references("users"),
                    AttributeDef::new("title", ScalarType::Text),
                ],
            )
            .table(
                "tags",
                [
                    AttributeDef::new("id", ScalarType::Serial).primary_key(),
                    AttributeDef::new("task_id", ScalarType::Integer),
                    AttributeDef::new("name", ScalarType::Text),
                ],
            );
        let seed = [
            ("users", Tuple::new().with("name", "Jane").with("email", "jane@doe.org")),
            ("users", Tuple::new().with("name", "Joe").with("email", "joe@doe.org")),
            ("tasks", Tuple::new().with("user_id", 1).with("title", "Jane Task")),
            ("tasks", Tuple::new().with("user_id", 2).with("title", "Joe Task")),
            ("tags", Tuple::new().with("task_id", 1).with("name", "red")),
            ("tags", Tuple::new().with("task_id", 2).with("name", "blue")),
        ];
        for (table, tuple) in seed {
            storage.insert(table, tuple).unwrap();
        }
        storage
    }

    pub fn registry() -> Registry {
        Registry::builder()
            .relation(RelationDecl::new("users").associate(Association::many("tasks")))
            .relation(
                RelationDecl::new("tasks")
                    .associate(Association::belongs("user").relation("users")),
            )
            .relation(RelationDecl::new("tags"))
            .struct_schema(StructSchema::new("Contact", ["id", "email"]))
            .build()
    }

    pub fn catalog_over(storage: MemoryStorage) -> Arc<Catalog> {
        Catalog::resolve(Arc::new(registry()), &storage).unwrap()
    }

    pub fn catalog() -> Arc<Catalog> {
        catalog_over(storage())
    }

    pub fn relation(name: &str) -> RelationNode {
        catalog().relation(name).unwrap()
    }
}
