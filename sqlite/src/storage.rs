use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use trellis_core::{Dataset, Result, Storage, TrellisError, trellis_trace_tx};
use trellis_types::{AttributeDef, Name, ScalarType};

use crate::dataset::{Shared, SqliteDataset, lock};

/// Storage collaborator over one rusqlite connection.
///
/// Every dataset opened from a storage shares its connection, so writes made
/// between `begin` and `commit` all belong to the same transaction.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    conn: Shared,
}

impl SqliteStorage {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` with the underlying connection.
    pub fn with_connection<R>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<R>,
    ) -> Result<R> {
        Ok(f(&lock(&self.conn))?)
    }

    /// Reads the header of `table`: declared types, nullability, primary and
    /// foreign keys.
    fn introspect(&self, table: &str) -> Result<Vec<AttributeDef>> {
        let conn = lock(&self.conn);
        let columns = conn
            .prepare(concat!(
                r#"SELECT "name", "type", "notnull", "pk" "#,
                r#"FROM pragma_table_info(?1) ORDER BY "cid""#
            ))?
            .query_map([table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if columns.is_empty() {
            return Err(TrellisError::UnknownRelation(table.into()));
        }
        let references = conn
            .prepare(r#"SELECT "from", "table" FROM pragma_foreign_key_list(?1)"#)?
            .query_map([table], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let single_pk = columns.iter().filter(|c| c.3 > 0).count() == 1;
        let mut header = Vec::with_capacity(columns.len());
        for (name, declared, not_null, pk) in columns {
            let ty = if single_pk && pk > 0 && declared.eq_ignore_ascii_case("INTEGER") {
                ScalarType::Serial
            } else {
                ScalarType::from_declared(&declared)
            };
            let mut attribute = AttributeDef::new(name.as_str(), ty);
            if pk > 0 {
                attribute = attribute.primary_key();
            }
            if !not_null && pk == 0 {
                attribute = attribute.nullable();
            }
            if let Some((_, target)) = references.iter().find(|(from, _)| *from == name) {
                attribute = attribute.references(target.as_str());
            }
            header.push(attribute);
        }
        Ok(header)
    }
}

impl Storage for SqliteStorage {
    fn dataset(&self, name: &str) -> Result<Box<dyn Dataset>> {
        let header = self.introspect(name)?;
        Ok(Box::new(SqliteDataset::new(
            Arc::clone(&self.conn),
            Name::from(name),
            header.into(),
        )))
    }

    fn begin(&self) -> Result<()> {
        trellis_trace_tx!("begin", "sqlite.rusqlite");
        lock(&self.conn).execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        trellis_trace_tx!("commit", "sqlite.rusqlite");
        lock(&self.conn).execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        trellis_trace_tx!("rollback", "sqlite.rusqlite");
        lock(&self.conn).execute_batch("ROLLBACK")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{Criteria, Tuple, Value};

    fn storage() -> SqliteStorage {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, active BOOLEAN);
            CREATE TABLE tasks (
                id INTEGER PRIMARY KEY,
                user_id INTEGER REFERENCES users(id),
                title TEXT NOT NULL
            );
            CREATE TABLE posts_labels (
                post_id INTEGER NOT NULL,
                label_id INTEGER NOT NULL,
                PRIMARY KEY (post_id, label_id)
            );
            "#,
        )
        .unwrap();
        SqliteStorage::new(conn)
    }

    #[test]
    fn introspects_headers() {
        let storage = storage();
        let tasks = storage.dataset("tasks").unwrap();
        let header = tasks.header();
        assert_eq!(header[0].ty, ScalarType::Serial);
        assert!(header[0].is_primary_key());
        assert_eq!(header[1].referenced_relation(), Some("users"));
        assert!(header[1].nullable);
        assert!(!header[2].nullable);

        let links = storage.dataset("posts_labels").unwrap();
        assert!(links.header().iter().all(|a| a.is_primary_key() && a.ty == ScalarType::Integer));
        assert!(matches!(
            storage.dataset("nope").unwrap_err(),
            TrellisError::UnknownRelation(_)
        ));
    }

    #[test]
    fn writes_and_reads() {
        let storage = storage();
        let users = storage.dataset("users").unwrap();
        let jane = users
            .insert(&Tuple::new().with("name", "Jane").with("active", true))
            .unwrap();
        assert_eq!(jane.get("id"), Some(&Value::Integer(1)));
        assert_eq!(jane.get("active"), Some(&Value::Bool(true)));
        users.insert(&Tuple::new().with("name", "Joe")).unwrap();

        let joe = users.restrict(&Criteria::new().eq("name", "Joe")).unwrap();
        let updated = joe.update(&Tuple::new().with("active", false)).unwrap();
        assert_eq!(updated[0].get("active"), Some(&Value::Bool(false)));
        assert_eq!(joe.delete().unwrap().len(), 1);
        assert_eq!(users.each().unwrap().len(), 1);
    }

    #[test]
    fn rollback_discards_writes() {
        let storage = storage();
        let users = storage.dataset("users").unwrap();
        storage.begin().unwrap();
        users.insert(&Tuple::new().with("name", "Jane")).unwrap();
        storage.rollback().unwrap();
        assert!(users.each().unwrap().is_empty());
    }
}
