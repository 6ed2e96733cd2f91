//! Command execution.
//!
//! Owners run before the nodes holding their foreign key on create and after
//! them on delete. Every level returns the stored tuple next to the assembled
//! struct so keys can be read even when a declared struct drops them.

use hashbrown::HashMap;
use trellis_types::{Name, Value};

use super::CommandType;
use super::graph::{CommandEdge, CommandNode};
use super::payload::{Payload, PayloadField};
use crate::combine::CombineKind;
use crate::criteria::Criteria;
use crate::dataset::Dataset;
use crate::error::{Result, TrellisError};
use crate::materialize::{Materializer, assemble, attach};
use crate::structs::{Field, Struct};
use crate::trellis_trace_command;
use crate::tuple::Tuple;

pub(crate) type Row = (Tuple, Struct);

type Nested<'a> = Vec<(&'a CommandEdge, &'a PayloadField)>;

pub(crate) fn execute(
    node: &CommandNode,
    restriction: &[Criteria],
    payload: &Payload,
) -> Result<Vec<Row>> {
    trellis_trace_command!(node.ty, node.relation_name());
    match node.ty {
        CommandType::Create => {
            if !restriction.is_empty() {
                return Err(TrellisError::InvalidPayload(format!(
                    "create on `{}` cannot be restricted",
                    node.relation_name()
                )));
            }
            check(node, payload)?;
            Ok(vec![create(node, payload)?])
        }
        CommandType::Update => {
            check(node, payload)?;
            update(node, restriction, payload)
        }
        CommandType::Delete => {
            if !payload.is_empty() {
                return Err(TrellisError::InvalidPayload(format!(
                    "delete on `{}` takes no payload",
                    node.relation_name()
                )));
            }
            delete(node, restriction)
        }
    }
}

/// Checks the whole payload tree against the command tree before any write.
fn check(node: &CommandNode, payload: &Payload) -> Result<()> {
    for (name, field) in payload.iter() {
        match (node.child(name), field) {
            (Some(_), PayloadField::Value(Value::Null)) => {}
            (Some(edge), _) => {
                for item in items(edge, field)? {
                    check(&edge.node, item)?;
                }
            }
            (None, PayloadField::Value(_)) if node.relation.schema().has_attribute(name) => {}
            (None, _) => {
                return Err(TrellisError::unknown_attribute(node.relation_name(), name));
            }
        }
    }
    Ok(())
}

/// Splits a checked payload into the node's own scalars and its nested entries.
fn split<'a>(node: &'a CommandNode, payload: &'a Payload) -> (Tuple, Nested<'a>) {
    let mut scalars = Tuple::with_capacity(payload.len());
    let mut nested = Vec::new();
    for (name, field) in payload.iter() {
        match (node.child(name), field) {
            (Some(_), PayloadField::Value(Value::Null)) => {}
            (Some(edge), _) => nested.push((edge, field)),
            (None, PayloadField::Value(value)) => scalars.insert(name.clone(), value.clone()),
            (None, _) => {}
        }
    }
    (scalars, nested)
}

/// Payload elements for one edge, checked against its kind.
fn items<'a>(edge: &CommandEdge, field: &'a PayloadField) -> Result<Vec<&'a Payload>> {
    match (edge.kind, field) {
        (CombineKind::Many, PayloadField::Many(items)) => Ok(items.iter().collect()),
        (CombineKind::One | CombineKind::Wrap, PayloadField::One(item)) => Ok(vec![item]),
        (CombineKind::Many, _) => Err(TrellisError::InvalidPayload(format!(
            "`{}` expects an array",
            edge.name
        ))),
        _ => Err(TrellisError::InvalidPayload(format!(
            "`{}` expects a single object",
            edge.name
        ))),
    }
}

fn scoped(dataset: &dyn Dataset, restriction: &[Criteria]) -> Result<Box<dyn Dataset>> {
    let mut scoped = dataset.restrict(&Criteria::new())?;
    for criteria in restriction {
        scoped = scoped.restrict(criteria)?;
    }
    Ok(scoped)
}

fn key_of(tuple: &Tuple, name: &Name) -> Value {
    tuple.get(name).cloned().unwrap_or_default()
}

fn finish(node: &CommandNode, tuple: Tuple, mut attached: HashMap<Name, Field>) -> Result<Row> {
    let value = assemble(
        node.relation.header(),
        node.relation.struct_type(),
        &tuple,
        |edge| {
            attached
                .remove(&edge.name)
                .unwrap_or_else(|| attach(edge.kind, &[]))
        },
    )?;
    Ok((tuple, value))
}

// =============================================================================
// Create
// =============================================================================

fn create(node: &CommandNode, payload: &Payload) -> Result<Row> {
    let (mut tuple, nested) = split(node, payload);
    let mut attached = HashMap::with_capacity(nested.len());

    for (edge, field) in nested.iter().filter(|(e, _)| e.kind == CombineKind::Wrap) {
        let mut owners = Vec::with_capacity(1);
        for item in items(edge, field)? {
            let (owner, value) = create(&edge.node, item)?;
            tuple.insert(edge.foreign_key().clone(), key_of(&owner, edge.owner_key()));
            owners.push(value);
        }
        attached.insert(edge.name.clone(), attach(edge.kind, &owners));
    }

    let stored = node.relation.base().insert(&tuple)?;

    for (edge, field) in nested.iter().filter(|(e, _)| e.kind != CombineKind::Wrap) {
        let key = key_of(&stored, edge.owner_key());
        let mut children = Vec::new();
        for item in items(edge, field)? {
            let value = match &edge.through {
                None => {
                    let mut item = item.clone();
                    item.set(edge.foreign_key().clone(), PayloadField::Value(key.clone()));
                    create(&edge.node, &item)?.1
                }
                Some(through) => {
                    let (child, value) = create(&edge.node, item)?;
                    through.dataset.insert(
                        &Tuple::new()
                            .with(through.parent_key.clone(), key.clone())
                            .with(through.child_key.clone(), key_of(&child, edge.foreign_key())),
                    )?;
                    value
                }
            };
            children.push(value);
        }
        attached.insert(edge.name.clone(), attach(edge.kind, &children));
    }

    finish(node, stored, attached)
}

// =============================================================================
// Update
// =============================================================================

fn update(node: &CommandNode, restriction: &[Criteria], payload: &Payload) -> Result<Vec<Row>> {
    let (changes, nested) = split(node, payload);
    let dataset = scoped(node.relation.base().as_ref(), restriction)?;
    let tuples = if changes.is_empty() {
        dataset.each()?
    } else {
        dataset.update(&changes)?
    };

    let mut rows = Vec::with_capacity(tuples.len());
    for tuple in tuples {
        for (edge, field) in &nested {
            for item in items(edge, field)? {
                let (criteria, item) = child_scope(edge, &tuple, item)?;
                update(&edge.node, &criteria, &item)?;
            }
        }
        // Children are read back once every element has been applied.
        let mut attached = HashMap::with_capacity(node.children.len());
        for edge in &node.children {
            let current = edge.node.relation.restrict(edge_scope(edge, &tuple)?)?;
            let children = Materializer::materialize(&current)?;
            attached.insert(edge.name.clone(), attach(edge.kind, &children));
        }
        rows.push(finish(node, tuple, attached)?);
    }
    Ok(rows)
}

/// Restriction selecting every row of `edge` belonging to `parent`.
fn edge_scope(edge: &CommandEdge, parent: &Tuple) -> Result<Criteria> {
    Ok(match (&edge.through, edge.kind) {
        (_, CombineKind::Wrap) => {
            Criteria::new().eq(edge.owner_key().clone(), key_of(parent, edge.foreign_key()))
        }
        (None, _) => {
            Criteria::new().eq(edge.foreign_key().clone(), key_of(parent, edge.owner_key()))
        }
        (Some(through), _) => {
            let owner = key_of(parent, edge.owner_key());
            let links = through
                .dataset
                .restrict(&Criteria::new().eq(through.parent_key.clone(), owner))?
                .each()?;
            Criteria::new().any(
                edge.foreign_key().clone(),
                links.iter().map(|link| key_of(link, &through.child_key)),
            )
        }
    })
}

/// Restriction selecting the child rows of `parent` an update element applies
/// to, narrowed by the child's primary key when the element carries it.
fn child_scope(
    edge: &CommandEdge,
    parent: &Tuple,
    item: &Payload,
) -> Result<(Vec<Criteria>, Payload)> {
    let mut criteria = vec![edge_scope(edge, parent)?];

    let schema = edge.node.relation.schema();
    let mut item = item.clone();
    if let Some(pk) = schema.primary_key() {
        if let Some(id) = item.value(pk).filter(|v| !v.is_null()).cloned() {
            criteria.push(Criteria::new().eq(pk.clone(), id));
            item = item
                .iter()
                .filter(|(name, _)| *name != pk)
                .fold(Payload::new(), |mut acc, (name, field)| {
                    acc.set(name.clone(), field.clone());
                    acc
                });
        }
    }
    Ok((criteria, item))
}

// =============================================================================
// Delete
// =============================================================================

fn delete(node: &CommandNode, restriction: &[Criteria]) -> Result<Vec<Row>> {
    let dataset = scoped(node.relation.base().as_ref(), restriction)?;
    let tuples = dataset.each()?;
    if tuples.is_empty() {
        return Ok(Vec::new());
    }

    let mut pending = Vec::with_capacity(tuples.len());
    for tuple in &tuples {
        let mut attached = HashMap::with_capacity(node.children.len());
        for edge in node.children.iter().filter(|e| e.kind != CombineKind::Wrap) {
            let key = key_of(tuple, edge.owner_key());
            let children: Vec<Struct> = match &edge.through {
                None => delete(&edge.node, &[Criteria::new().eq(edge.foreign_key().clone(), key)])?
                    .into_iter()
                    .map(|(_, value)| value)
                    .collect(),
                Some(through) => {
                    let links = through
                        .dataset
                        .restrict(&Criteria::new().eq(through.parent_key.clone(), key))?
                        .delete()?;
                    if links.is_empty() {
                        Vec::new()
                    } else {
                        let unlinked = edge.node.relation.restrict(Criteria::new().any(
                            edge.foreign_key().clone(),
                            links.iter().map(|link| key_of(link, &through.child_key)),
                        ))?;
                        Materializer::materialize(&unlinked)?
                    }
                }
            };
            attached.insert(edge.name.clone(), attach(edge.kind, &children));
        }
        pending.push(attached);
    }

    dataset.delete()?;

    let mut rows = Vec::with_capacity(tuples.len());
    for (tuple, mut attached) in tuples.into_iter().zip(pending) {
        for edge in node.children.iter().filter(|e| e.kind == CombineKind::Wrap) {
            let owners: Vec<Struct> = delete(
                &edge.node,
                &[Criteria::new().eq(edge.owner_key().clone(), key_of(&tuple, edge.foreign_key()))],
            )?
            .into_iter()
            .map(|(_, value)| value)
            .collect();
            attached.insert(edge.name.clone(), attach(edge.kind, &owners));
        }
        rows.push(finish(node, tuple, attached)?);
    }
    Ok(rows)
}
