use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, params_from_iter};
use trellis_core::{Criteria, Dataset, OrderBy, Result, TrellisError, Tuple, trellis_trace_query};
use trellis_types::{AttributeDef, Name};

use crate::sql::{self, Statement};
use crate::values::{SqlValue, decode};

pub(crate) type Shared = Arc<Mutex<Connection>>;

pub(crate) fn lock(conn: &Shared) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A narrowed view over one SQLite table. Nothing runs until `each` or a write.
#[derive(Debug, Clone)]
pub struct SqliteDataset {
    conn: Shared,
    name: Name,
    header: Arc<[AttributeDef]>,
    criteria: Vec<Criteria>,
    projection: Option<Vec<Name>>,
    order: Vec<OrderBy>,
    limit: Option<u64>,
    offset: u64,
}

impl SqliteDataset {
    pub(crate) fn new(conn: Shared, name: Name, header: Arc<[AttributeDef]>) -> Self {
        Self {
            conn,
            name,
            header,
            criteria: Vec::new(),
            projection: None,
            order: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    fn column(&self, name: &str) -> Result<&AttributeDef> {
        self.header
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| TrellisError::UnknownAttribute {
                relation: self.name.clone(),
                attribute: name.into(),
            })
    }

    fn all_columns(&self) -> Vec<Name> {
        self.header.iter().map(|a| a.name.clone()).collect()
    }

    /// Runs a statement returning rows shaped like `columns`.
    fn query(&self, stmt: &Statement, columns: &[&AttributeDef]) -> Result<Vec<Tuple>> {
        trellis_trace_query!(stmt.sql, stmt.params.len());
        let conn = lock(&self.conn);
        let mut prepared = conn.prepare(&stmt.sql)?;
        let mut rows = prepared.query(params_from_iter(stmt.params.iter().map(SqlValue)))?;
        let mut tuples = Vec::new();
        while let Some(row) = rows.next()? {
            let mut tuple = Tuple::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                tuple.insert(column.name.clone(), decode(row.get_ref(i)?, column.ty));
            }
            tuples.push(tuple);
        }
        Ok(tuples)
    }

    fn boxed(self) -> Result<Box<dyn Dataset>> {
        Ok(Box::new(self))
    }
}

impl Dataset for SqliteDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn header(&self) -> &[AttributeDef] {
        &self.header
    }

    fn restrict(&self, criteria: &Criteria) -> Result<Box<dyn Dataset>> {
        for attribute in criteria.attributes() {
            self.column(attribute)?;
        }
        let mut next = self.clone();
        if !criteria.is_empty() {
            next.criteria.push(criteria.clone());
        }
        next.boxed()
    }

    fn project(&self, names: &[Name]) -> Result<Box<dyn Dataset>> {
        for name in names {
            self.column(name)?;
        }
        let mut next = self.clone();
        next.projection = Some(names.to_vec());
        next.boxed()
    }

    fn order(&self, order: &[OrderBy]) -> Result<Box<dyn Dataset>> {
        for term in order {
            self.column(&term.attribute)?;
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
        let names = self.projection.clone().unwrap_or_else(|| self.all_columns());
        let columns = names
            .iter()
            .map(|n| self.column(n))
            .collect::<Result<Vec<_>>>()?;
        let stmt = sql::select(
            &self.name,
            &names,
            &self.criteria,
            &self.order,
            self.limit,
            self.offset,
        );
        self.query(&stmt, &columns)
    }

    fn insert(&self, tuple: &Tuple) -> Result<Tuple> {
        for name in tuple.names() {
            self.column(name)?;
        }
        let stmt = sql::insert(&self.name, tuple, &self.all_columns());
        let columns: Vec<&AttributeDef> = self.header.iter().collect();
        self.query(&stmt, &columns)?
            .pop()
            .ok_or_else(|| {
                TrellisError::Storage(format!("insert into `{}` returned no row", self.name))
            })
    }

    fn update(&self, changes: &Tuple) -> Result<Vec<Tuple>> {
        for name in changes.names() {
            self.column(name)?;
        }
        let columns: Vec<&AttributeDef> = self.header.iter().collect();
        if changes.is_empty() {
            let stmt = sql::select(&self.name, &self.all_columns(), &self.criteria, &[], None, 0);
            return self.query(&stmt, &columns);
        }
        let stmt = sql::update(&self.name, changes, &self.criteria, &self.all_columns());
        self.query(&stmt, &columns)
    }

    fn delete(&self) -> Result<Vec<Tuple>> {
        let stmt = sql::delete(&self.name, &self.criteria, &self.all_columns());
        let columns: Vec<&AttributeDef> = self.header.iter().collect();
        self.query(&stmt, &columns)
    }
}
