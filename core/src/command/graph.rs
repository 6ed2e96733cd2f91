use std::sync::Arc;

use trellis_types::Name;

use super::CommandType;
use crate::combine::{CombineKind, KeyPair, Through};
use crate::relation::RelationNode;

/// One write command per relation in a combination tree.
#[derive(Debug, Clone)]
pub struct CommandNode {
    pub ty: CommandType,
    pub relation: RelationNode,
    pub children: Vec<CommandEdge>,
}

#[derive(Debug, Clone)]
pub struct CommandEdge {
    pub kind: CombineKind,
    pub name: Name,
    pub keys: KeyPair,
    pub through: Option<Through>,
    pub node: Arc<CommandNode>,
}

impl CommandEdge {
    /// Owner-side key. The owner executes first on create.
    pub fn owner_key(&self) -> &Name {
        &self.keys.parent_key
    }

    /// Foreign key set from the owner's stored tuple.
    pub fn foreign_key(&self) -> &Name {
        &self.keys.child_key
    }
}

impl CommandNode {
    pub fn relation_name(&self) -> &Name {
        self.relation.name()
    }

    pub fn child(&self, name: &str) -> Option<&CommandEdge> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Derives the command tree of `relation`. Every node carries the root's type.
pub fn build(relation: &RelationNode, ty: CommandType) -> Arc<CommandNode> {
    let children = relation
        .header()
        .nested()
        .map(|edge| CommandEdge {
            kind: edge.kind,
            name: edge.name.clone(),
            keys: edge.keys.clone(),
            through: edge.through.clone(),
            node: build(&edge.node, ty),
        })
        .collect();
    Arc::new(CommandNode {
        ty,
        relation: relation.clone(),
        children,
    })
}
