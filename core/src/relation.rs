//! Composed relations.
//!
//! A [`RelationNode`] is a base dataset, the lazy operations recorded against
//! it, and the header it exposes (including nested combinations). Every method
//! returns a new node; the original is never touched. Nested edges are shared
//! between nodes through `Arc`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use trellis_types::{Name, Value};

use crate::ast::{self, Ast};
use crate::combine::{
    CombineEdge, CombineKind, CombineTree, InferredKeys, KeyPair, Through, infer_combine_keys,
    infer_through_keys, infer_wrap_keys,
};
use crate::criteria::{Criteria, OrderBy, QueryOp};
use crate::dataset::Dataset;
use crate::error::{Result, TrellisError};
use crate::header::Header;
use crate::materialize::Materializer;
use crate::registry::Catalog;
use crate::schema::{RelationSchema, StructSchema};
use crate::structs::{Struct, StructType};

#[derive(Debug, Clone)]
pub struct RelationNode {
    catalog: Arc<Catalog>,
    schema: Arc<RelationSchema>,
    base: Arc<dyn Dataset>,
    ops: Vec<QueryOp>,
    header: Header,
    struct_type: StructType,
}

impl RelationNode {
    pub(crate) fn new(
        catalog: Arc<Catalog>,
        schema: Arc<RelationSchema>,
        base: Arc<dyn Dataset>,
        struct_type: StructType,
    ) -> Self {
        let header = Header::from_defs(&schema.attributes);
        Self {
            catalog,
            schema,
            base,
            ops: Vec::new(),
            header,
            struct_type,
        }
    }

    /// Relation name.
    pub fn name(&self) -> &Name {
        &self.schema.name
    }

    pub fn dataset_name(&self) -> &Name {
        &self.schema.dataset
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Pending lazy operations, in the order they were recorded.
    pub fn ops(&self) -> &[QueryOp] {
        &self.ops
    }

    pub fn schema(&self) -> &Arc<RelationSchema> {
        &self.schema
    }

    pub fn struct_type(&self) -> &StructType {
        &self.struct_type
    }

    pub fn base(&self) -> &Arc<dyn Dataset> {
        &self.base
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    fn with_op(&self, op: QueryOp) -> Self {
        let mut node = self.clone();
        node.ops.push(op);
        node
    }

    fn check_attribute(&self, name: &str) -> Result<()> {
        if self.schema.has_attribute(name) {
            Ok(())
        } else {
            Err(TrellisError::unknown_attribute(&self.schema.name, name))
        }
    }

    // =========================================================================
    // Lazy operations
    // =========================================================================

    /// Restricts to tuples matching `criteria`.
    pub fn restrict(&self, criteria: Criteria) -> Result<Self> {
        for attribute in criteria.attributes() {
            self.check_attribute(attribute)?;
        }
        Ok(self.with_op(QueryOp::Restrict(criteria)))
    }

    /// Restricts on the primary key.
    pub fn by_id(&self, id: impl Into<Value>) -> Result<Self> {
        let pk = self.schema.primary_key().cloned().ok_or_else(|| {
            TrellisError::invalid_key_pair(&self.schema.name, "relation has no primary key")
        })?;
        self.restrict(Criteria::new().eq(pk, id))
    }

    /// Narrows the header to `names`. Nested combinations are kept, so the keys
    /// they match on must survive the projection.
    pub fn project<I, N>(&self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = N>,
        N: Into<Name>,
    {
        let names: Vec<Name> = names.into_iter().map(Into::into).collect();
        let header = self.header.project(&self.schema.name, &names)?;
        for edge in header.nested() {
            if !header.contains_scalar(edge.root_key()) {
                return Err(TrellisError::invalid_key_pair(
                    &self.schema.name,
                    format!("projection drops `{}` used by `{}`", edge.root_key(), edge.name),
                ));
            }
        }
        if let StructType::Declared(schema) = &self.struct_type {
            check_struct_fields(schema, &header)?;
        }
        let mut node = self.with_op(QueryOp::Project(names));
        node.header = header;
        Ok(node)
    }

    pub fn order<I, O>(&self, order: I) -> Result<Self>
    where
        I: IntoIterator<Item = O>,
        O: Into<OrderBy>,
    {
        let order: Vec<OrderBy> = order.into_iter().map(Into::into).collect();
        for term in &order {
            self.check_attribute(&term.attribute)?;
        }
        Ok(self.with_op(QueryOp::Order(order)))
    }

    #[must_use]
    pub fn limit(&self, limit: u64) -> Self {
        self.with_op(QueryOp::Limit(limit))
    }

    #[must_use]
    pub fn offset(&self, offset: u64) -> Self {
        self.with_op(QueryOp::Offset(offset))
    }

    /// Binds a declared struct schema as the materialization target.
    pub fn as_struct(&self, name: &str) -> Result<Self> {
        let schema = self.catalog.struct_schema(name)?;
        check_struct_fields(&schema, &self.header)?;
        let mut node = self.clone();
        node.struct_type = StructType::Declared(schema);
        Ok(node)
    }

    // =========================================================================
    // Combinations
    // =========================================================================

    /// Nests `child` under `name`, inferring the key pair.
    ///
    /// `CombineKind::Wrap` delegates to [`wrap`](Self::wrap).
    pub fn combine(&self, kind: CombineKind, name: &str, child: &RelationNode) -> Result<Self> {
        if kind == CombineKind::Wrap {
            return self.wrap(name, child);
        }
        let inferred = infer_combine_keys(&self.schema, name, &child.schema, |join| {
            self.catalog.schema(join).ok()
        })?;
        self.push_inferred(kind, name, child, inferred)
    }

    /// Nests `child` under its default name (`tasks` for many, `task` for one).
    pub fn combine_children(&self, kind: CombineKind, child: &RelationNode) -> Result<Self> {
        self.combine(kind, &kind.default_name(child.name()), child)
    }

    /// Nests `child` under `name` with an explicit key pair.
    pub fn combine_with_keys(
        &self,
        kind: CombineKind,
        name: &str,
        child: &RelationNode,
        keys: KeyPair,
    ) -> Result<Self> {
        self.push_edge(kind, name, keys, None, child)
    }

    /// Nests many `child` tuples under `name`, linked through the `join` relation.
    pub fn combine_through(&self, name: &str, child: &RelationNode, join: &str) -> Result<Self> {
        let join = self.catalog.schema(join)?;
        let inferred = infer_through_keys(&self.schema, &child.schema, &join)?;
        self.push_inferred(CombineKind::Many, name, child, inferred)
    }

    /// Nests the `owner` tuple referenced by this relation's foreign key under `name`.
    pub fn wrap(&self, name: &str, owner: &RelationNode) -> Result<Self> {
        let keys = infer_wrap_keys(&self.schema, name, &owner.schema)?;
        self.push_edge(CombineKind::Wrap, name, keys, None, owner)
    }

    /// Wraps `owner` with an explicit key pair (`owner key -> foreign key on self`).
    pub fn wrap_with_keys(&self, name: &str, owner: &RelationNode, keys: KeyPair) -> Result<Self> {
        self.push_edge(CombineKind::Wrap, name, keys, None, owner)
    }

    /// Wraps `owner` under its singular name (`users` -> `user`).
    pub fn wrap_parent(&self, owner: &RelationNode) -> Result<Self> {
        self.wrap(&CombineKind::Wrap.default_name(owner.name()), owner)
    }

    fn push_inferred(
        &self,
        kind: CombineKind,
        name: &str,
        child: &RelationNode,
        inferred: InferredKeys,
    ) -> Result<Self> {
        let through = match inferred.through {
            Some((relation, parent_key, child_key)) => Some(Through {
                dataset: self.catalog.dataset(&relation)?,
                relation,
                parent_key,
                child_key,
            }),
            None => None,
        };
        self.push_edge(kind, name, inferred.keys, through, child)
    }

    fn push_edge(
        &self,
        kind: CombineKind,
        name: &str,
        keys: KeyPair,
        through: Option<Through>,
        child: &RelationNode,
    ) -> Result<Self> {
        let edge = CombineEdge {
            kind,
            name: Name::from(name),
            keys,
            through,
            node: child.clone(),
        };
        edge.validate(&self.schema.name, &self.header)?;
        let header = self.header.with_nested(&self.schema.name, Arc::new(edge))?;
        let mut node = self.clone();
        node.header = header;
        Ok(node)
    }

    /// The combinations nested directly under this node.
    pub fn combine_tree(&self) -> CombineTree {
        CombineTree {
            root: self.schema.name.clone(),
            children: self.header.nested().cloned().collect(),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn to_ast(&self) -> Ast {
        ast::compile(self)
    }

    /// The base dataset with every recorded operation applied.
    pub fn dataset(&self) -> Result<Box<dyn Dataset>> {
        let mut ops = self.ops.iter();
        let Some(first) = ops.next() else {
            return self.base.restrict(&Criteria::new());
        };
        let mut dataset = first.apply(self.base.as_ref())?;
        for op in ops {
            dataset = op.apply(dataset.as_ref())?;
        }
        Ok(dataset)
    }

    /// Materializes every tuple.
    pub fn to_vec(&self) -> Result<Vec<Struct>> {
        Materializer::materialize(self)
    }

    pub fn iter(&self) -> Result<std::vec::IntoIter<Struct>> {
        Ok(self.to_vec()?.into_iter())
    }

    /// Zero or one struct. More than one matching tuple is an error.
    pub fn one(&self) -> Result<Option<Struct>> {
        let mut structs = self.to_vec()?;
        match structs.len() {
            0 | 1 => Ok(structs.pop()),
            actual => Err(TrellisError::TupleCountMismatch {
                expected: "at most one",
                actual,
            }),
        }
    }

    /// Exactly one struct.
    pub fn one_exact(&self) -> Result<Struct> {
        let mut structs = self.to_vec()?;
        match (structs.pop(), structs.len()) {
            (Some(one), 0) => Ok(one),
            (_, rest) => Err(TrellisError::TupleCountMismatch {
                expected: "exactly one",
                actual: if rest == 0 { 0 } else { rest + 1 },
            }),
        }
    }

    pub fn first(&self) -> Result<Option<Struct>> {
        Ok(self.limit(1).to_vec()?.into_iter().next())
    }

    /// Materializes and converts every struct into `T` through serde.
    pub fn to_vec_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.to_vec()?.iter().map(Struct::deserialize).collect()
    }

    pub fn one_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.one()?.as_ref().map(Struct::deserialize).transpose()
    }
}

/// Every field of a declared struct must name an attribute of `header`.
fn check_struct_fields(schema: &StructSchema, header: &Header) -> Result<()> {
    match schema.fields.iter().find(|field| header.get(field).is_none()) {
        Some(missing) => Err(TrellisError::StructConstruction {
            type_name: schema.name.clone(),
            attribute: missing.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::fixtures;

    #[test]
    fn operations_never_mutate_the_original() {
        let users = fixtures::relation("users");
        let restricted = users.restrict(Criteria::new().eq("name", "Jane")).unwrap();
        assert!(users.ops().is_empty());
        assert_eq!(restricted.ops().len(), 1);
        assert_eq!(users.to_vec().unwrap().len(), 2);
        assert_eq!(restricted.to_vec().unwrap().len(), 1);
    }

    #[test]
    fn restrict_checks_attributes() {
        let err = fixtures::relation("users")
            .restrict(Criteria::new().eq("age", 1))
            .unwrap_err();
        assert!(matches!(err, TrellisError::UnknownAttribute { .. }));
    }

    #[test]
    fn combine_infers_foreign_keys() {
        let users = fixtures::relation("users")
            .combine(CombineKind::Many, "tasks", &fixtures::relation("tasks"))
            .unwrap();
        let tree = users.combine_tree();
        assert_eq!(tree.edge_count(), 1);
        let edge = &tree.children[0];
        assert_eq!(edge.keys, KeyPair::new("id", "user_id"));
        assert_eq!(users.header().get("tasks").map(|a| a.is_nested()), Some(true));
    }

    #[test]
    fn wrap_puts_the_foreign_key_on_the_root() {
        let tasks = fixtures::relation("tasks")
            .wrap_parent(&fixtures::relation("users"))
            .unwrap();
        let edge = &tasks.combine_tree().children[0];
        assert_eq!(edge.name, "user");
        assert_eq!(edge.root_key(), "user_id");
        assert_eq!(edge.node_key(), "id");
    }

    #[test]
    fn combine_without_inferable_keys_fails() {
        let err = fixtures::relation("tags")
            .combine(CombineKind::Many, "users", &fixtures::relation("users"))
            .unwrap_err();
        assert!(matches!(err, TrellisError::InvalidKeyPair { .. }));
    }

    #[test]
    fn explicit_keys_are_validated() {
        let err = fixtures::relation("users")
            .combine_with_keys(
                CombineKind::One,
                "task",
                &fixtures::relation("tasks"),
                KeyPair::new("id", "owner_id"),
            )
            .unwrap_err();
        assert!(matches!(err, TrellisError::InvalidKeyPair { .. }));
    }

    #[test]
    fn project_keeps_nested_and_guards_keys() {
        let users = fixtures::relation("users")
            .combine_children(CombineKind::Many, &fixtures::relation("tasks"))
            .unwrap();
        let projected = users.project(["id"]).unwrap();
        let names: Vec<_> = projected.header().iter().map(|a| a.name().as_str()).collect();
        assert_eq!(names, ["id", "tasks"]);
        assert!(matches!(
            users.project(["name"]).unwrap_err(),
            TrellisError::InvalidKeyPair { .. }
        ));
        assert!(matches!(
            users.project(["nope"]).unwrap_err(),
            TrellisError::UnknownAttribute { .. }
        ));
    }

    #[test]
    fn one_and_one_exact_enforce_counts() {
        let users = fixtures::relation("users");
        assert!(matches!(
            users.one().unwrap_err(),
            TrellisError::TupleCountMismatch { actual: 2, .. }
        ));
        assert!(matches!(
            users.one_exact().unwrap_err(),
            TrellisError::TupleCountMismatch { actual: 2, .. }
        ));
        let nobody = users.restrict(Criteria::new().eq("name", "Nobody")).unwrap();
        assert_eq!(nobody.one().unwrap(), None);
        assert!(matches!(
            nobody.one_exact().unwrap_err(),
            TrellisError::TupleCountMismatch { actual: 0, .. }
        ));
        let jane = users.by_id(1).unwrap();
        assert_eq!(jane.one_exact().unwrap().str("name"), Some("Jane"));
        let first = users.order(["name"]).unwrap().first().unwrap().unwrap();
        assert_eq!(first.str("name"), Some("Jane"));
    }

    #[test]
    fn as_struct_requires_a_declared_schema() {
        let err = fixtures::relation("users").as_struct("Nope").unwrap_err();
        assert!(matches!(err, TrellisError::UnknownStructType(_)));
    }

    #[test]
    fn declared_struct_fields_are_checked_when_composing() {
        let users = fixtures::relation("users");
        let err = users.project(["id", "name"]).unwrap().as_struct("Contact").unwrap_err();
        assert!(matches!(
            err,
            TrellisError::StructConstruction { ref attribute, .. } if attribute == "email"
        ));

        let contacts = users.as_struct("Contact").unwrap();
        let err = contacts.project(["id", "name"]).unwrap_err();
        assert!(matches!(err, TrellisError::StructConstruction { .. }));
        assert!(contacts.project(["email", "id"]).is_ok());
    }
}
