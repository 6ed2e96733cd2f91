//! # Trellis
//!
//! Composable relations for Rust: declare relations, combine them into nested
//! graphs, read them back as nested structs, and write whole graphs with one
//! command.
//!
//! ## Quick Start
//!
//! ```rust
//! # #[cfg(feature = "rusqlite")]
//! # fn main() -> trellis::Result<()> {
//! use trellis::prelude::*;
//! use trellis::sqlite::SqliteStorage;
//!
//! let conn = rusqlite::Connection::open_in_memory()?;
//! conn.execute_batch(
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
//!      CREATE TABLE tasks (
//!          id INTEGER PRIMARY KEY,
//!          user_id INTEGER REFERENCES users(id),
//!          title TEXT
//!      );",
//! )?;
//!
//! let registry = Registry::builder()
//!     .relation(RelationDecl::new("users").associate(Association::many("tasks")))
//!     .relation(RelationDecl::new("tasks"))
//!     .build();
//! let repo = Repository::new(registry, SqliteStorage::new(conn))?;
//!
//! let users = repo.relation("users")?;
//! let tasks = repo.relation("tasks")?;
//! let graph = users.combine_children(CombineKind::Many, &tasks)?;
//!
//! let jane = repo
//!     .command("create", &graph)?
//!     .call(serde_json::json!({"name": "Jane", "tasks": [{"title": "Task one"}]}))?;
//! assert_eq!(jane.many("tasks").map(|t| t.len()), Some(1));
//!
//! let loaded = graph.by_id(jane.int("id").unwrap_or_default())?.one_exact()?;
//! assert_eq!(loaded, jane);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "rusqlite"))]
//! # fn main() {}
//! ```
//!
//! ## Storage Support
//!
//! | Storage  | Driver   | Feature Flag | Status |
//! |----------|----------|--------------|--------|
//! | SQLite   | rusqlite | `rusqlite`   | ✅     |
//! | Memory   | -        | -            | ✅     |

mod repository;

// =============================================================================
// Root-level exports
// =============================================================================

pub use repository::{CommandSet, Repository};

/// Result type for trellis operations
pub use trellis_core::error::Result;

/// Error types
pub mod error {
    pub use trellis_core::error::TrellisError;
}

/// Engine types: relations, combinations, ASTs, structs and commands.
pub mod core {
    pub use trellis_core::*;
}

/// Scalar definitions shared by every crate.
pub use trellis_types as types;

/// SQLite storage.
#[cfg(feature = "rusqlite")]
pub mod sqlite {
    pub use trellis_sqlite::{SqliteDataset, SqliteStorage, sql};
}

/// Prelude - import this for the common composition and command types.
pub mod prelude {
    pub use crate::repository::{CommandSet, Repository};
    pub use trellis_core::{
        Association, AttributeDef, CombineKind, CommandGraph, CommandType, Criteria, Field,
        KeyPair, OrderBy, Payload, Registry, RelationDecl, RelationNode, Result, ScalarType,
        Struct, StructSchema, TrellisError, Tuple, Value,
    };
}
