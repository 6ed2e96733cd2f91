//! The immutable configuration registry and its resolved catalog.
//!
//! A [`Registry`] is assembled once through [`RegistryBuilder`] and never
//! mutated afterwards. Resolving it against a [`Storage`] yields a
//! [`Catalog`]: every declared relation with its header read (or checked)
//! and its base dataset opened.

use std::sync::Arc;

use hashbrown::HashMap;
use trellis_types::Name;

use crate::command::CommandType;
use crate::dataset::{Dataset, Storage};
use crate::error::{Result, TrellisError};
use crate::helpers::struct_name_for;
use crate::relation::RelationNode;
use crate::schema::{RelationDecl, RelationSchema, StructSchema};
use crate::structs::StructType;

/// A named command declared for a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDecl {
    pub relation: Name,
    pub name: Name,
    pub ty: CommandType,
}

/// Relations, struct schemas and named commands known to a repository.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    relations: Vec<RelationDecl>,
    structs: Vec<Arc<StructSchema>>,
    commands: Vec<CommandDecl>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn relations(&self) -> &[RelationDecl] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDecl> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn struct_schema(&self, name: &str) -> Option<&Arc<StructSchema>> {
        self.structs.iter().find(|s| s.name == name)
    }

    /// Named commands declared for `relation`, in declaration order.
    pub fn commands(&self, relation: &str) -> impl Iterator<Item = &CommandDecl> {
        self.commands.iter().filter(move |c| c.relation == relation)
    }
}

/// Builder for [`Registry`].
///
/// ```
/// use trellis_core::{CommandType, Registry, RelationDecl, StructSchema};
///
/// let registry = Registry::builder()
///     .relation(RelationDecl::new("users").struct_type("UserModel"))
///     .struct_schema(StructSchema::new("UserModel", ["id", "name"]))
///     .command("users", "upsert", CommandType::Create)
///     .build();
///
/// assert!(registry.relation("users").is_some());
/// assert_eq!(registry.commands("users").count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Declares a relation. A later declaration with the same name replaces the earlier one.
    #[must_use]
    pub fn relation(mut self, decl: RelationDecl) -> Self {
        self.registry.relations.retain(|r| r.name != decl.name);
        self.registry.relations.push(decl);
        self
    }

    #[must_use]
    pub fn struct_schema(mut self, schema: StructSchema) -> Self {
        self.registry.structs.retain(|s| s.name != schema.name);
        self.registry.structs.push(Arc::new(schema));
        self
    }

    #[must_use]
    pub fn command(
        mut self,
        relation: impl Into<Name>,
        name: impl Into<Name>,
        ty: CommandType,
    ) -> Self {
        let (relation, name) = (relation.into(), name.into());
        self.registry
            .commands
            .retain(|c| c.relation != relation || c.name != name);
        self.registry.commands.push(CommandDecl { relation, name, ty });
        self
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug)]
struct Entry {
    schema: Arc<RelationSchema>,
    base: Arc<dyn Dataset>,
    struct_type: StructType,
}

/// A registry resolved against storage.
#[derive(Debug)]
pub struct Catalog {
    registry: Arc<Registry>,
    entries: HashMap<Name, Entry>,
}

impl Catalog {
    /// Opens every declared relation's dataset and resolves its schema.
    pub fn resolve(registry: Arc<Registry>, storage: &dyn Storage) -> Result<Arc<Self>> {
        let mut entries = HashMap::with_capacity(registry.relations.len());
        for decl in &registry.relations {
            let base: Arc<dyn Dataset> = Arc::from(storage.dataset(decl.dataset_name())?);
            let schema = RelationSchema::resolve(decl, base.header());
            if let Some(missing) = schema
                .attributes
                .iter()
                .find(|a| !base.header().iter().any(|stored| stored.name == a.name))
            {
                return Err(TrellisError::unknown_attribute(&schema.dataset, &missing.name));
            }
            let struct_type = match &schema.struct_type {
                Some(name) => StructType::Declared(
                    registry
                        .struct_schema(name)
                        .cloned()
                        .ok_or_else(|| TrellisError::UnknownStructType(name.clone()))?,
                ),
                None => StructType::Generic(struct_name_for(&schema.name)),
            };
            entries.insert(
                schema.name.clone(),
                Entry {
                    schema: Arc::new(schema),
                    base,
                    struct_type,
                },
            );
        }
        Ok(Arc::new(Self { registry, entries }))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn entry(&self, name: &str) -> Result<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| TrellisError::UnknownRelation(name.into()))
    }

    /// A fresh relation node for `name`: no operations, no combinations.
    pub fn relation(self: &Arc<Self>, name: &str) -> Result<RelationNode> {
        let entry = self.entry(name)?;
        Ok(RelationNode::new(
            Arc::clone(self),
            Arc::clone(&entry.schema),
            Arc::clone(&entry.base),
            entry.struct_type.clone(),
        ))
    }

    pub fn schema(&self, name: &str) -> Result<Arc<RelationSchema>> {
        self.entry(name).map(|e| Arc::clone(&e.schema))
    }

    pub fn dataset(&self, name: &str) -> Result<Arc<dyn Dataset>> {
        self.entry(name).map(|e| Arc::clone(&e.base))
    }

    pub fn struct_schema(&self, name: &str) -> Result<Arc<StructSchema>> {
        self.registry
            .struct_schema(name)
            .cloned()
            .ok_or_else(|| TrellisError::UnknownStructType(name.into()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}
