//! SQLite storage for trellis
//!
//! This crate renders dataset reads and writes as SQLite statements and runs
//! them through `rusqlite`. Relation headers, primary keys and foreign keys are
//! read from the schema with `pragma_table_info` / `pragma_foreign_key_list`.
//!
//! # Features
//!
//! - `rusqlite` - the [`SqliteStorage`] collaborator backed by `rusqlite`
//! - `tracing` - emit statement and transaction events

pub mod sql;

#[cfg(feature = "rusqlite")]
mod dataset;
#[cfg(feature = "rusqlite")]
mod storage;
#[cfg(feature = "rusqlite")]
mod values;

#[cfg(feature = "rusqlite")]
pub use dataset::SqliteDataset;
#[cfg(feature = "rusqlite")]
pub use storage::SqliteStorage;
