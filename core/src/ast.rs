//! Canonical description of a composed relation.
//!
//! The text form is stable and used as a cache key:
//!
//! ```text
//! (relation, users, (header, [(attribute, id), (attribute, name),
//!   (relation, tasks, (header, [...]),
//!     {dataset: tasks, keys: {id: user_id}, combine_type: many, combine_name: tasks})]),
//!   {dataset: users})
//! ```

use core::fmt;

use serde::Serialize;
use trellis_types::Name;

use crate::combine::{CombineEdge, CombineKind, KeyPair};
use crate::header::Attribute;
use crate::relation::RelationNode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ast {
    pub name: Name,
    pub header: Vec<AstAttribute>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AstAttribute {
    Attribute(Name),
    Relation(Ast),
}

/// Node metadata. Combination entries are only present on nested nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub dataset: Name,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<Name>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<KeyPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub through: Option<Name>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combine_type: Option<CombineKind>,
    #[serde(skip_serializing_if = "core::ops::Not::not")]
    pub wrap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combine_name: Option<Name>,
}

/// Compiles a relation node, recursing through its combinations in the order
/// they were added.
pub fn compile(node: &RelationNode) -> Ast {
    compile_node(node, None)
}

fn compile_node(node: &RelationNode, edge: Option<&CombineEdge>) -> Ast {
    let header = node
        .header()
        .iter()
        .map(|attribute| match attribute {
            Attribute::Scalar(def) => AstAttribute::Attribute(def.name.clone()),
            Attribute::Nested(edge) => AstAttribute::Relation(compile_node(&edge.node, Some(edge))),
        })
        .collect();
    let model = node
        .struct_type()
        .is_declared()
        .then(|| node.struct_type().name().clone());
    let metadata = match edge {
        None => Metadata {
            dataset: node.dataset_name().clone(),
            model,
            keys: None,
            through: None,
            combine_type: None,
            wrap: false,
            combine_name: None,
        },
        Some(edge) => Metadata {
            dataset: node.dataset_name().clone(),
            model,
            keys: Some(edge.keys.clone()),
            through: edge.through.as_ref().map(|t| t.relation.clone()),
            combine_type: (edge.kind != CombineKind::Wrap).then_some(edge.kind),
            wrap: edge.kind == CombineKind::Wrap,
            combine_name: Some(edge.name.clone()),
        },
    };
    Ast {
        name: node.name().clone(),
        header,
        metadata,
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(relation, {}, (header, [", self.name)?;
        for (i, attribute) in self.header.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match attribute {
                AstAttribute::Attribute(name) => write!(f, "(attribute, {name})")?,
                AstAttribute::Relation(ast) => write!(f, "{ast}")?,
            }
        }
        write!(f, "]), {})", self.metadata)
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{dataset: {}", self.dataset)?;
        if let Some(model) = &self.model {
            write!(f, ", model: {model}")?;
        }
        if let Some(keys) = &self.keys {
            write!(f, ", keys: {keys}")?;
        }
        if let Some(through) = &self.through {
            write!(f, ", through: {through}")?;
        }
        if let Some(kind) = &self.combine_type {
            write!(f, ", combine_type: {kind}")?;
        }
        if self.wrap {
            f.write_str(", wrap: true")?;
        }
        if let Some(name) = &self.combine_name {
            write!(f, ", combine_name: {name}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::fixtures;

    #[test]
    fn plain_relation() {
        let ast = fixtures::relation("tags").to_ast();
        assert_eq!(
            ast.to_string(),
            concat!(
                "(relation, tags, (header, [(attribute, id), (attribute, task_id), ",
                "(attribute, name)]), {dataset: tags})"
            )
        );
    }

    #[test]
    fn wrap_metadata_lives_on_the_child() {
        let ast = fixtures::relation("tasks")
            .project(["id", "user_id", "title"])
            .unwrap()
            .wrap_parent(&fixtures::relation("users").project(["id", "name"]).unwrap())
            .unwrap()
            .to_ast();
        assert_eq!(ast.metadata.keys, None);
        assert!(!ast.metadata.wrap);
        let AstAttribute::Relation(user) = &ast.header[3] else {
            panic!("expected a nested relation, got {:?}", ast.header[3]);
        };
        assert!(user.metadata.wrap);
        assert_eq!(user.metadata.keys, Some(KeyPair::new("id", "user_id")));
        assert_eq!(user.metadata.combine_name.as_deref(), Some("user"));
        assert_eq!(
            user.to_string(),
            concat!(
                "(relation, users, (header, [(attribute, id), (attribute, name)]), ",
                "{dataset: users, keys: {id: user_id}, wrap: true, combine_name: user})"
            )
        );
    }

    #[test]
    fn compile_is_deterministic() {
        let node = fixtures::relation("users")
            .combine_children(
                CombineKind::Many,
                &fixtures::relation("tasks")
                    .combine_children(CombineKind::Many, &fixtures::relation("tags"))
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(node.to_ast(), node.to_ast());
        assert_eq!(node.to_ast().to_string(), node.clone().to_ast().to_string());
    }

    #[test]
    fn serializes_to_json() {
        let ast = fixtures::relation("users")
            .combine_children(CombineKind::One, &fixtures::relation("tasks"))
            .unwrap()
            .to_ast();
        let json = serde_json::to_value(&ast).unwrap();
        let task = &json["header"][3]["relation"];
        assert_eq!(task["metadata"]["keys"], serde_json::json!({"id": "user_id"}));
        assert_eq!(task["metadata"]["combine_type"], "one");
        assert!(task["metadata"].get("wrap").is_none());
    }
}
