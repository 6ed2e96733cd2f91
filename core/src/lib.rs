//! Relation composition, materialization and command graphs.
//!
//! A [`RelationNode`] wraps a stored relation, the lazy operations recorded
//! against it and the child relations combined into it. Reading a node fetches
//! each level once and assembles nested [`Struct`]s; the same combination tree
//! drives [`CommandGraph`]s that write every level in dependency order.
//!
//! Storage is reached only through the [`Dataset`] and [`Storage`] traits.

pub mod ast;
pub mod combine;
pub mod command;
pub mod criteria;
pub mod dataset;
pub mod error;
pub mod header;
pub mod helpers;
pub mod materialize;
pub mod memory;
pub mod registry;
pub mod relation;
pub mod schema;
pub mod structs;
mod trace;
pub mod tuple;

// Re-export key types and traits
pub use ast::{Ast, AstAttribute, Metadata};
pub use combine::{CombineEdge, CombineKind, CombineTree, KeyPair, Through};
pub use command::{CommandGraph, CommandNode, CommandType, GraphBuilder, Payload, PayloadField};
pub use criteria::{Condition, Criteria, Direction, OrderBy, QueryOp};
pub use dataset::{Dataset, Storage};
pub use error::{Result, TrellisError};
pub use header::{Attribute, Header};
pub use materialize::Materializer;
pub use memory::{MemoryDataset, MemoryStorage};
pub use registry::{Catalog, CommandDecl, Registry, RegistryBuilder};
pub use relation::RelationNode;
pub use schema::{Association, AssociationKind, RelationDecl, RelationSchema, StructSchema};
pub use structs::{Field, Struct, StructType};
pub use tuple::Tuple;

pub use trellis_types::{AttributeDef, Name, ScalarType, Value};
