//! Executes composed relations and assembles nested structs.
//!
//! Each level is fetched once: a child node is restricted to the keys present
//! in its parent's result set, its tuples grouped by key, and the groups
//! attached to the parent tuples. Grouping works on the raw tuples, so a
//! declared struct type may drop the key attributes.

use hashbrown::{HashMap, HashSet};
use trellis_types::{Name, Value};

use crate::combine::{CombineEdge, CombineKind};
use crate::criteria::Criteria;
use crate::error::Result;
use crate::header::{Attribute, Header};
use crate::relation::RelationNode;
use crate::structs::{Field, Struct, StructType};
use crate::trellis_trace_load;
use crate::tuple::Tuple;

type Groups = HashMap<Value, Vec<Struct>>;

pub struct Materializer;

impl Materializer {
    /// Fetches `node` with its operations applied and materializes every tuple.
    pub fn materialize(node: &RelationNode) -> Result<Vec<Struct>> {
        let tuples = node.dataset()?.each()?;
        trellis_trace_load!(node.name(), tuples.len());
        Ok(Self::load(node, tuples)?
            .into_iter()
            .map(|(_, s)| s)
            .collect())
    }

    /// Materializes already fetched tuples of `node`, keeping each tuple next
    /// to its struct.
    pub(crate) fn load(node: &RelationNode, tuples: Vec<Tuple>) -> Result<Vec<(Tuple, Struct)>> {
        if tuples.is_empty() {
            return Ok(Vec::new());
        }
        let mut children: Vec<Groups> = Vec::new();
        for edge in node.header().nested() {
            children.push(Self::children(edge, &tuples)?);
        }
        let mut rows = Vec::with_capacity(tuples.len());
        for tuple in tuples {
            let mut groups = children.iter();
            let value = assemble(node.header(), node.struct_type(), &tuple, |edge| {
                let group = groups
                    .next()
                    .and_then(|g| tuple.get(edge.root_key()).and_then(|k| g.get(k)));
                attach(edge.kind, group.map(Vec::as_slice).unwrap_or_default())
            })?;
            rows.push((tuple, value));
        }
        Ok(rows)
    }

    /// Fetches and groups the children of `edge` for every parent tuple.
    fn children(edge: &CombineEdge, parents: &[Tuple]) -> Result<Groups> {
        let keys = distinct(parents, edge.root_key());
        let mut groups = Groups::new();
        if keys.is_empty() {
            return Ok(groups);
        }
        let Some(through) = &edge.through else {
            let node = edge
                .node
                .restrict(Criteria::new().any(edge.node_key().clone(), keys))?;
            let tuples = node.dataset()?.each()?;
            trellis_trace_load!(node.name(), tuples.len());
            for (tuple, value) in Self::load(&node, tuples)? {
                if let Some(key) = tuple.get(edge.node_key()).filter(|k| !k.is_null()) {
                    groups.entry(key.clone()).or_default().push(value);
                }
            }
            return Ok(groups);
        };

        let links = through
            .dataset
            .restrict(&Criteria::new().any(through.parent_key.clone(), keys))?
            .each()?;
        trellis_trace_load!(through.relation, links.len());
        let targets = distinct(&links, &through.child_key);
        if targets.is_empty() {
            return Ok(groups);
        }
        let node = edge
            .node
            .restrict(Criteria::new().any(edge.node_key().clone(), targets))?;
        let tuples = node.dataset()?.each()?;
        trellis_trace_load!(node.name(), tuples.len());
        let mut by_key: HashMap<Value, Struct> = HashMap::with_capacity(tuples.len());
        for (tuple, value) in Self::load(&node, tuples)? {
            if let Some(key) = tuple.get(edge.node_key()) {
                by_key.entry(key.clone()).or_insert(value);
            }
        }
        for link in &links {
            let (Some(parent), Some(child)) = (
                link.get(&through.parent_key),
                link.get(&through.child_key).and_then(|k| by_key.get(k)),
            ) else {
                continue;
            };
            groups.entry(parent.clone()).or_default().push(child.clone());
        }
        Ok(groups)
    }
}

/// Non-null values of `attribute`, deduplicated, in first-seen order.
fn distinct(tuples: &[Tuple], attribute: &Name) -> Vec<Value> {
    let mut seen = HashSet::with_capacity(tuples.len());
    tuples
        .iter()
        .filter_map(|t| t.get(attribute))
        .filter(|v| !v.is_null() && seen.insert(*v))
        .cloned()
        .collect()
}

/// `One` and `Wrap` take the first match; `Many` takes them all.
pub(crate) fn attach(kind: CombineKind, matches: &[Struct]) -> Field {
    match kind {
        CombineKind::Many => Field::Many(matches.to_vec()),
        CombineKind::One | CombineKind::Wrap => Field::One(matches.first().cloned()),
    }
}

/// Builds one struct from a tuple, asking `nested` for each nested attribute
/// in header order.
pub(crate) fn assemble(
    header: &Header,
    ty: &StructType,
    tuple: &Tuple,
    mut nested: impl FnMut(&CombineEdge) -> Field,
) -> Result<Struct> {
    let fields = header
        .iter()
        .map(|attribute| match attribute {
            Attribute::Scalar(def) => (
                def.name.clone(),
                Field::Value(tuple.get(&def.name).cloned().unwrap_or_default()),
            ),
            Attribute::Nested(edge) => (edge.name.clone(), nested(edge)),
        })
        .collect();
    ty.construct(fields)
}
