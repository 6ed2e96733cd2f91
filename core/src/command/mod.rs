//! Write commands derived from combination trees.
//!
//! A [`CommandGraph`] mirrors the shape of the relation it was built from:
//! one [`CommandNode`] per relation, all of the same [`CommandType`]. Calling
//! it writes every level in dependency order, propagating generated keys from
//! owners to the tuples referencing them, and returns structs nested the same
//! way reads are.

mod exec;
mod graph;
mod payload;

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

use trellis_types::Value;

pub use graph::{CommandEdge, CommandNode, build};
pub use payload::{Payload, PayloadField};

use crate::combine::CombineKind;
use crate::criteria::{Criteria, QueryOp};
use crate::error::{Result, TrellisError};
use crate::relation::RelationNode;
use crate::structs::Struct;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    Create,
    Update,
    Delete,
}

impl CommandType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(TrellisError::InvalidCommandType(other.to_owned())),
        }
    }
}

/// An executable command tree plus the restriction selecting root tuples.
#[derive(Debug, Clone)]
pub struct CommandGraph {
    root: Arc<CommandNode>,
    restriction: Vec<Criteria>,
}

impl CommandGraph {
    /// Builds the command tree of `relation`. Restrictions recorded on the
    /// root node select the tuples an update or delete applies to; ordering is
    /// ignored. Any other recorded operation fails with
    /// [`TrellisError::InvalidPayload`], as no write could honour it.
    pub fn new(relation: &RelationNode, ty: CommandType) -> Result<Self> {
        check_ops(relation, true)?;
        let restriction = relation
            .ops()
            .iter()
            .filter_map(|op| match op {
                QueryOp::Restrict(criteria) => Some(criteria.clone()),
                _ => None,
            })
            .collect();
        Ok(Self {
            root: build(relation, ty),
            restriction,
        })
    }

    pub fn command_type(&self) -> CommandType {
        self.root.ty
    }

    pub fn root(&self) -> &Arc<CommandNode> {
        &self.root
    }

    pub fn restriction(&self) -> &[Criteria] {
        &self.restriction
    }

    /// Narrows the root tuples an update or delete applies to.
    pub fn restrict(&self, criteria: Criteria) -> Result<Self> {
        let schema = self.root.relation.schema();
        if let Some(missing) = criteria.attributes().find(|a| !schema.has_attribute(a)) {
            return Err(TrellisError::unknown_attribute(&schema.name, missing));
        }
        let mut graph = self.clone();
        graph.restriction.push(criteria);
        Ok(graph)
    }

    pub fn by_id(&self, id: impl Into<Value>) -> Result<Self> {
        let schema = self.root.relation.schema();
        let pk = schema.primary_key().cloned().ok_or_else(|| {
            TrellisError::invalid_key_pair(&schema.name, "relation has no primary key")
        })?;
        self.restrict(Criteria::new().eq(pk, id))
    }

    /// Executes the graph, expecting exactly one root tuple.
    pub fn call<P>(&self, payload: P) -> Result<Struct>
    where
        P: TryInto<Payload>,
        TrellisError: From<P::Error>,
    {
        let mut rows = self.call_all(payload)?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            actual => Err(TrellisError::TupleCountMismatch {
                expected: "exactly one",
                actual,
            }),
        }
    }

    /// Executes the graph, returning one struct per affected root tuple.
    pub fn call_all<P>(&self, payload: P) -> Result<Vec<Struct>>
    where
        P: TryInto<Payload>,
        TrellisError: From<P::Error>,
    {
        let payload = payload.try_into()?;
        Ok(exec::execute(&self.root, &self.restriction, &payload)?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }
}

/// Rejects operations a command would silently drop. Only the root may be
/// restricted.
fn check_ops(relation: &RelationNode, root: bool) -> Result<()> {
    for op in relation.ops() {
        let kind = match op {
            QueryOp::Order(_) => continue,
            QueryOp::Restrict(_) if root => continue,
            QueryOp::Restrict(_) => "restrict",
            QueryOp::Project(_) => "project",
            QueryOp::Limit(_) => "limit",
            QueryOp::Offset(_) => "offset",
        };
        return Err(TrellisError::InvalidPayload(format!(
            "`{kind}` on `{}` cannot scope a command",
            relation.name()
        )));
    }
    for edge in relation.header().nested() {
        check_ops(&edge.node, false)?;
    }
    Ok(())
}

/// Builds a command graph from relation names instead of composed nodes.
///
/// ```ignore
/// let create = GraphBuilder::new(CommandType::Create, users)
///     .many("tasks", "tasks", |tasks| tasks.many("tags", "tags", Ok))?
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    ty: CommandType,
    relation: RelationNode,
}

impl GraphBuilder {
    pub fn new(ty: CommandType, relation: RelationNode) -> Self {
        Self { ty, relation }
    }

    pub fn relation(&self) -> &RelationNode {
        &self.relation
    }

    pub fn one<F>(self, name: &str, relation: &str, nest: F) -> Result<Self>
    where
        F: FnOnce(GraphBuilder) -> Result<GraphBuilder>,
    {
        self.nest(CombineKind::One, name, relation, nest)
    }

    pub fn many<F>(self, name: &str, relation: &str, nest: F) -> Result<Self>
    where
        F: FnOnce(GraphBuilder) -> Result<GraphBuilder>,
    {
        self.nest(CombineKind::Many, name, relation, nest)
    }

    pub fn wrap<F>(self, name: &str, relation: &str, nest: F) -> Result<Self>
    where
        F: FnOnce(GraphBuilder) -> Result<GraphBuilder>,
    {
        self.nest(CombineKind::Wrap, name, relation, nest)
    }

    fn nest<F>(self, kind: CombineKind, name: &str, relation: &str, nest: F) -> Result<Self>
    where
        F: FnOnce(GraphBuilder) -> Result<GraphBuilder>,
    {
        let child = self.relation.catalog().relation(relation)?;
        let child = nest(GraphBuilder::new(self.ty, child))?;
        let relation = self.relation.combine(kind, name, &child.relation)?;
        Ok(Self {
            ty: self.ty,
            relation,
        })
    }

    pub fn build(self) -> Result<CommandGraph> {
        CommandGraph::new(&self.relation, self.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::fixtures;
    use serde_json::json;

    fn users_with_task() -> RelationNode {
        let catalog = fixtures::catalog();
        catalog
            .relation("users")
            .unwrap()
            .combine_children(CombineKind::One, &catalog.relation("tasks").unwrap())
            .unwrap()
    }

    #[test]
    fn parses_command_types() {
        assert_eq!("update".parse::<CommandType>().unwrap(), CommandType::Update);
        let err = "oops".parse::<CommandType>().unwrap_err();
        assert!(err.to_string().contains("oops"));
    }

    #[test]
    fn create_propagates_generated_keys() {
        let create = CommandGraph::new(&users_with_task(), CommandType::Create).unwrap();
        let user = create
            .call(json!({"name": "Jane", "task": {"title": "Task one"}}))
            .unwrap();
        let id = user.int("id").unwrap();
        let task = user.one("task").unwrap();
        assert!(task.int("id").is_some());
        assert_eq!(task.int("user_id"), Some(id));
        assert_eq!(task.str("title"), Some("Task one"));
    }

    #[test]
    fn create_rejects_restrictions_and_unknown_fields() {
        let create = CommandGraph::new(&users_with_task(), CommandType::Create).unwrap();
        assert!(matches!(
            create.by_id(1).unwrap().call(json!({"name": "Jane"})).unwrap_err(),
            TrellisError::InvalidPayload(_)
        ));
        assert!(matches!(
            create.call(json!({"name": "Jane", "age": 3})).unwrap_err(),
            TrellisError::UnknownAttribute { .. }
        ));
        assert!(matches!(
            create.call(json!({"name": "Jane", "task": [{"title": "x"}]})).unwrap_err(),
            TrellisError::InvalidPayload(_)
        ));
    }

    #[test]
    fn update_cascades_through_foreign_keys() {
        let users = users_with_task();
        let update = CommandGraph::new(&users, CommandType::Update)
            .unwrap()
            .by_id(1)
            .unwrap();
        let jane = update
            .call(json!({"name": "Jane Doe", "task": {"title": "Renamed"}}))
            .unwrap();
        assert_eq!(jane.str("name"), Some("Jane Doe"));
        assert_eq!(jane.one("task").and_then(|t| t.str("title")), Some("Renamed"));
        let joe = users.by_id(2).unwrap().one_exact().unwrap();
        assert_eq!(joe.one("task").and_then(|t| t.str("title")), Some("Joe Task"));
    }

    #[test]
    fn delete_removes_children_first() {
        let catalog = fixtures::catalog();
        let users = catalog.relation("users").unwrap();
        let delete = GraphBuilder::new(CommandType::Delete, users.clone())
            .many("tasks", "tasks", |tasks| tasks.many("tags", "tags", Ok))
            .unwrap()
            .build()
            .unwrap()
            .by_id(1)
            .unwrap();
        let jane = delete.call(()).unwrap();
        assert_eq!(jane.many("tasks").map(<[Struct]>::len), Some(1));
        assert_eq!(users.to_vec().unwrap().len(), 1);
        assert_eq!(catalog.relation("tasks").unwrap().to_vec().unwrap().len(), 1);
        assert_eq!(catalog.relation("tags").unwrap().to_vec().unwrap().len(), 1);
    }

    #[test]
    fn call_expects_one_root_tuple() {
        let update = CommandGraph::new(&fixtures::relation("users"), CommandType::Update).unwrap();
        assert!(matches!(
            update.call(json!({"email": null})).unwrap_err(),
            TrellisError::TupleCountMismatch { actual: 2, .. }
        ));
        assert_eq!(update.call_all(json!({"email": null})).unwrap().len(), 2);
    }

    #[test]
    fn commands_reject_operations_they_cannot_honour() {
        let users = fixtures::relation("users");
        for node in [
            users.limit(1),
            users.offset(1),
            users.project(["id", "name"]).unwrap(),
        ] {
            assert!(matches!(
                CommandGraph::new(&node, CommandType::Update).unwrap_err(),
                TrellisError::InvalidPayload(_)
            ));
        }
        let nested = users
            .combine_children(
                CombineKind::Many,
                &fixtures::relation("tasks").by_id(1).unwrap(),
            )
            .unwrap();
        assert!(CommandGraph::new(&nested, CommandType::Delete).is_err());

        let ordered = users.order(["name"]).unwrap().by_id(2).unwrap();
        let joe = CommandGraph::new(&ordered, CommandType::Update)
            .unwrap()
            .call(json!({"email": "joe@example.com"}))
            .unwrap();
        assert_eq!(joe.str("name"), Some("Joe"));
    }
}
