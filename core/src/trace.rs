//! Tracing utilities for load, command and transaction observability.
//!
//! Enable the `tracing` feature to emit spans and events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site.

/// Emit a debug-level tracing event with the statement text and parameter count.
///
/// ```ignore
/// trellis_trace_query!(&sql, params.len());
/// ```
#[macro_export]
macro_rules! trellis_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %$sql, params = $param_count, "trellis.query");
    };
}

/// Emit a debug-level tracing event for one materialized relation level.
///
/// ```ignore
/// trellis_trace_load!(node.name(), tuples.len());
/// ```
#[macro_export]
macro_rules! trellis_trace_load {
    ($relation:expr, $tuples:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(relation = %$relation, tuples = $tuples, "trellis.load");
    };
}

/// Emit a debug-level tracing event for one executed command node.
///
/// ```ignore
/// trellis_trace_command!(CommandType::Create, "users");
/// ```
#[macro_export]
macro_rules! trellis_trace_command {
    ($command:expr, $relation:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(command = %$command, relation = %$relation, "trellis.command");
    };
}

/// Emit an info-level tracing event for transaction lifecycle (begin, commit, rollback).
///
/// ```ignore
/// trellis_trace_tx!("begin", "sqlite.rusqlite");
/// ```
#[macro_export]
macro_rules! trellis_trace_tx {
    ($event:literal, $driver:literal) => {
        #[cfg(feature = "tracing")]
        tracing::info!(event = $event, driver = $driver, "trellis.transaction");
    };
}
