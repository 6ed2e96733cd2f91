//! The repository: catalog, command cache and transactions.

use std::sync::{Arc, Mutex, PoisonError};

use hashbrown::HashMap;
use trellis_core::{
    Catalog, CombineKind, CommandGraph, CommandType, GraphBuilder, Name, Registry, RelationNode,
    Result, Storage, TrellisError,
};

/// Entry point for reads and writes over one storage.
///
/// Built once from an immutable [`Registry`]; relation headers are resolved
/// against storage in [`Repository::new`]. Command graphs are cached by command
/// type and relation structure, so asking twice returns the same graph.
pub struct Repository {
    catalog: Arc<Catalog>,
    storage: Arc<dyn Storage>,
    root: Option<Name>,
    commands: Mutex<HashMap<String, Arc<CommandGraph>>>,
}

impl core::fmt::Debug for Repository {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Repository")
            .field("catalog", &self.catalog)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Repository {
    pub fn new(registry: Registry, storage: impl Storage + 'static) -> Result<Self> {
        let catalog = Catalog::resolve(Arc::new(registry), &storage)?;
        Ok(Self {
            catalog,
            storage: Arc::new(storage),
            root: None,
            commands: Mutex::new(HashMap::new()),
        })
    }

    /// Sets the aggregate root used by [`root`](Self::root) and [`aggregate`](Self::aggregate).
    pub fn with_root(mut self, relation: impl Into<Name>) -> Result<Self> {
        let relation = relation.into();
        if !self.catalog.contains(&relation) {
            return Err(TrellisError::UnknownRelation(relation));
        }
        self.root = Some(relation);
        Ok(self)
    }

    pub fn registry(&self) -> &Registry {
        self.catalog.registry()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn relation(&self, name: &str) -> Result<RelationNode> {
        self.catalog.relation(name)
    }

    /// The configured aggregate root.
    pub fn root(&self) -> Result<RelationNode> {
        let root = self
            .root
            .as_deref()
            .ok_or_else(|| TrellisError::UnknownRelation(Name::from("<root>")))?;
        self.relation(root)
    }

    /// The aggregate root with `child` combined under its default name.
    pub fn aggregate(&self, kind: CombineKind, child: &RelationNode) -> Result<RelationNode> {
        self.root()?.combine_children(kind, child)
    }

    /// The command graph of type `ty` for `relation`.
    ///
    /// Fails with [`TrellisError::InvalidCommandType`] when `ty` names no
    /// command type, and with [`TrellisError::InvalidPayload`] when `relation`
    /// records an operation no write can honour.
    pub fn command(&self, ty: &str, relation: &RelationNode) -> Result<Arc<CommandGraph>> {
        let ty: CommandType = ty.parse()?;
        let key = format!("{ty}:{}:{:?}", relation.to_ast(), relation.ops());
        let mut cache = self.commands.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(graph) = cache.get(&key) {
            return Ok(Arc::clone(graph));
        }
        let graph = Arc::new(CommandGraph::new(relation, ty)?);
        cache.insert(key, Arc::clone(&graph));
        Ok(graph)
    }

    /// Shorthand for [`command`](Self::command) on a plain relation.
    pub fn command_on(&self, ty: &str, relation: &str) -> Result<Arc<CommandGraph>> {
        self.command(ty, &self.relation(relation)?)
    }

    /// The named commands declared for `relation`.
    pub fn commands(&self, relation: &str) -> Result<CommandSet> {
        let node = self.relation(relation)?;
        let commands = self
            .registry()
            .commands(relation)
            .map(|decl| Ok((decl.name.clone(), self.command(decl.ty.as_str(), &node)?)))
            .collect::<Result<_>>()?;
        Ok(CommandSet {
            relation: node.name().clone(),
            commands,
        })
    }

    /// Starts a command graph on `relation` built with nested `one`/`many`/`wrap` calls.
    pub fn graph(&self, ty: CommandType, relation: &str) -> Result<GraphBuilder> {
        Ok(GraphBuilder::new(ty, self.relation(relation)?))
    }

    /// Runs `f` inside a storage transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err` or panics.
    pub fn transaction<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Self) -> Result<R>,
    {
        self.storage.begin()?;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(self)));
        match result {
            Ok(Ok(value)) => {
                self.storage.commit()?;
                Ok(value)
            }
            Ok(Err(e)) => {
                self.storage.rollback()?;
                Err(e)
            }
            Err(panic_payload) => {
                let _ = self.storage.rollback();
                std::panic::resume_unwind(panic_payload);
            }
        }
    }
}

/// Named commands of one relation.
#[derive(Debug, Clone)]
pub struct CommandSet {
    relation: Name,
    commands: Vec<(Name, Arc<CommandGraph>)>,
}

impl CommandSet {
    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|(n, _)| n.as_str())
    }

    pub fn get(&self, name: &str) -> Result<Arc<CommandGraph>> {
        self.commands
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, graph)| Arc::clone(graph))
            .ok_or_else(|| TrellisError::InvalidCommandType(format!("{}.{name}", self.relation)))
    }
}
