//! The world: node lifecycle, inheritance, relation protocol and
//! transactions over one relation store.
//!
//! A `World` is a plain owned value. Every read goes through a fresh
//! [`Resolver`]; every write goes through the store's insert/remove entry
//! points and raises notifications, which the transaction log batches while a
//! bracket is open.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::WorldConfig;
use crate::error::{SchemaError, StoreError, WorldError, WorldResult};
use crate::graph::InheritanceGraph;
use crate::instance::{RelationInstance, RoleMarker};
use crate::monitor::{ChangeNotificationBus, ChangeStream, Property, View};
use crate::node::{NodeClass, NodeId, NodeType};
use crate::outcome::Outcome;
use crate::resolver::{RelationEntry, Resolver};
use crate::schema::{columns, tables, RelationKind, SchemaRegistry, TableId};
use crate::storage::{InMemoryRelationStore, RelationStore};
use crate::transaction::TransactionLog;
use crate::value::Value;
use crate::views::Prototype;

mod apply;
mod properties;
mod relations;
mod removal;
mod snapshot;

pub use apply::ChangeReport;
pub use snapshot::WorldSnapshot;

/// A simulated world.
pub struct World {
    config: WorldConfig,
    store: Box<dyn RelationStore>,
    graph: InheritanceGraph,
    log: TransactionLog,
    bus: ChangeNotificationBus,
    next_id: u64,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("nodes", &self.graph.len())
            .field("next_id", &self.next_id)
            .field("transaction_depth", &self.log.depth())
            .finish_non_exhaustive()
    }
}

impl World {
    /// A world over the standard schema and an in-memory store.
    pub fn new(config: WorldConfig) -> WorldResult<Self> {
        Self::with_schema(config, SchemaRegistry::standard()?)
    }

    /// A world over `schema`, which must contain every standard table.
    pub fn with_schema(config: WorldConfig, schema: SchemaRegistry) -> WorldResult<Self> {
        let store = InMemoryRelationStore::new(Arc::new(schema));
        Self::with_store(config, Box::new(store))
    }

    /// A world over an empty, caller-provided store.
    pub fn with_store(config: WorldConfig, store: Box<dyn RelationStore>) -> WorldResult<Self> {
        config.validate()?;
        require_standard_tables(store.schema())?;
        if !store.snapshot()?.is_empty() {
            return Err(WorldError::internal("a new world needs an empty store"));
        }
        Ok(Self::assemble(config, store, InheritanceGraph::new(), 1))
    }

    fn assemble(
        config: WorldConfig,
        store: Box<dyn RelationStore>,
        graph: InheritanceGraph,
        next_id: u64,
    ) -> Self {
        debug!(tables = store.schema().len(), nodes = graph.len(), "world ready");
        Self {
            bus: ChangeNotificationBus::new(config.stream_capacity),
            config,
            store,
            graph,
            log: TransactionLog::new(),
            next_id,
        }
    }

    /// Configuration the world was built with.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Schema the store validates against.
    #[must_use]
    pub fn schema(&self) -> &SchemaRegistry {
        self.store.schema()
    }

    /// Read access to the underlying store, e.g. for exhaustive scans.
    #[must_use]
    pub fn store(&self) -> &dyn RelationStore {
        self.store.as_ref()
    }

    /// The inheritance graph.
    #[must_use]
    pub const fn graph(&self) -> &InheritanceGraph {
        &self.graph
    }

    /// A resolver for one read. Memoizes if the config says so.
    #[must_use]
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.graph, self.store.as_ref(), self.config.memoize_resolution)
    }

    /// Whether `id` is a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains(id)
    }

    /// Type of `id`, if known.
    #[must_use]
    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.graph.node_type(id)
    }

    /// Number of live nodes, instances included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.len()
    }

    fn alloc(&mut self, node_type: NodeType) -> NodeId {
        let id = NodeId::from_raw(self.next_id);
        self.next_id += 1;
        self.graph.insert(id, node_type);
        id
    }

    fn require(&self, id: NodeId) -> WorldResult<NodeType> {
        self.graph
            .node_type(id)
            .ok_or_else(|| StoreError::NodeNotFound { id }.into())
    }

    // ---- node lifecycle ----

    /// Create a prototype node. An empty `name` stores no name.
    pub fn create_node(&mut self, class: NodeClass, name: &str) -> WorldResult<Prototype> {
        let node_type = NodeType::prototype(class);
        let id = self.alloc(node_type);
        if !name.is_empty() {
            let table = TableId::new(node_type, tables::NAME);
            self.store
                .set(id, &table, columns::NAME, Some(Value::from(name)))?;
        }
        debug!(%id, %class, name, "node created");
        Ok(Prototype::from_id(id))
    }

    /// Create a free-standing relation instance of role `R`, such as the
    /// root of a condition or a change.
    ///
    /// Fails if `target` is unknown, is not a prototype, or is not of `class`.
    pub fn create_instance<R: RoleMarker>(
        &mut self,
        class: NodeClass,
        target: Option<NodeId>,
    ) -> WorldResult<Outcome<RelationInstance<R>>> {
        if let Some(target) = target {
            match self.graph.node_type(target) {
                Some(NodeType::Prototype { class: c }) if c.is_a(class) => {}
                _ => return Ok(Outcome::Fail),
            }
        }
        let node_type = NodeType::instance(R::ROLE, class);
        let id = self.alloc(node_type);
        if let Some(target) = target {
            let table = TableId::new(node_type, tables::TARGET);
            self.store
                .set(id, &table, columns::TARGET, Some(Value::Node(target)))?;
        }
        debug!(%id, %node_type, "instance created");
        Ok(Outcome::Success(RelationInstance::from_id(id)))
    }

    /// Typed handle for an existing prototype.
    #[must_use]
    pub fn prototype(&self, id: NodeId) -> Option<Prototype> {
        match self.graph.node_type(id)? {
            NodeType::Prototype { .. } => Some(Prototype::from_id(id)),
            NodeType::Instance { .. } => None,
        }
    }

    /// Typed handle for an existing relation instance of role `R`.
    #[must_use]
    pub fn instance<R: RoleMarker>(&self, id: NodeId) -> Option<RelationInstance<R>> {
        (self.graph.node_type(id)?.role()? == R::ROLE).then(|| RelationInstance::from_id(id))
    }

    // ---- inheritance ----

    /// Personal parents of `id`.
    #[must_use]
    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        self.graph.parents(id)
    }

    /// Direct children of `id`.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.graph.children(id)
    }

    /// Transitive ancestors, nearest first.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        self.graph.ancestors(id)
    }

    /// Transitive descendants, nearest first.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.graph.descendants(id)
    }

    /// Add `parent` to `child`'s personal parents.
    ///
    /// Fails on unknown nodes, incompatible types, edges that would close
    /// a cycle and edges through which `child` would inherit a containment
    /// entry leading back to itself.
    pub fn add_parent(&mut self, child: NodeId, parent: NodeId) -> WorldResult<Outcome> {
        if !self.graph.parents(child).contains(&parent)
            && self.inheritance_closes_containment_loop(child, parent)?
        {
            return Ok(Outcome::Fail);
        }
        let outcome = self.graph.add_parent(child, parent);
        if outcome.is_success() {
            debug!(%child, %parent, "parent added");
            self.notify_inheritance_change(child, parent)?;
        }
        Ok(outcome)
    }

    /// Remove `parent` from `child`'s personal parents. Fails if it is not
    /// one.
    pub fn remove_parent(&mut self, child: NodeId, parent: NodeId) -> WorldResult<Outcome> {
        if !self.graph.parents(child).contains(&parent) {
            return Ok(Outcome::Fail);
        }
        let kinds = self.contributed_kinds(child, parent)?;
        self.graph.remove_parent(child, parent);
        debug!(%child, %parent, "parent removed");
        self.notify_lineage(child, parent, &kinds);
        Ok(Outcome::Success(()))
    }

    fn notify_inheritance_change(&mut self, child: NodeId, parent: NodeId) -> WorldResult<()> {
        let kinds = self.contributed_kinds(child, parent)?;
        self.notify_lineage(child, parent, &kinds);
        Ok(())
    }

    /// Kinds `child` carries for which `parent` has a non-empty effective view.
    fn contributed_kinds(&self, child: NodeId, parent: NodeId) -> WorldResult<Vec<RelationKind>> {
        let child_type = self.require(child)?;
        let resolver = self.resolver();
        let mut kinds = Vec::new();
        for kind in RelationKind::for_owner(child_type) {
            if !resolver.effective(parent, kind)?.is_empty() {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    fn notify_lineage(&mut self, child: NodeId, parent: NodeId, kinds: &[RelationKind]) {
        self.notify(child, Property::Parents);
        self.notify(parent, Property::Children);
        if kinds.is_empty() {
            return;
        }
        let mut affected = vec![child];
        affected.extend(self.graph.descendants(child));
        for node in affected {
            for kind in kinds {
                self.notify(node, Property::relations(*kind, View::Effective));
            }
        }
    }

    // ---- resolution ----

    /// Entries stored on `node`.
    pub fn personal(&self, node: NodeId, kind: RelationKind) -> WorldResult<Vec<RelationEntry>> {
        Ok(self.resolver().personal(node, kind)?)
    }

    /// Entries in `node`'s overridden table.
    pub fn overridden(&self, node: NodeId, kind: RelationKind) -> WorldResult<Vec<RelationEntry>> {
        Ok(self.resolver().overridden(node, kind)?)
    }

    /// Parents' effective entries not overridden on `node`.
    pub fn inherited(&self, node: NodeId, kind: RelationKind) -> WorldResult<Vec<RelationEntry>> {
        Ok(self.resolver().inherited(node, kind)?)
    }

    /// What callers observe: personal, then inherited, then overridden.
    pub fn effective(&self, node: NodeId, kind: RelationKind) -> WorldResult<Vec<RelationEntry>> {
        Ok(self.resolver().effective(node, kind)?)
    }

    /// Whether `target` keys a personal entry.
    pub fn has_personal(&self, node: NodeId, kind: RelationKind, target: NodeId) -> WorldResult<bool> {
        Ok(self.resolver().has_personal(node, kind, target)?)
    }

    /// Whether `target` keys an overridden entry.
    pub fn has_overridden(&self, node: NodeId, kind: RelationKind, target: NodeId) -> WorldResult<bool> {
        Ok(self.resolver().has_overridden(node, kind, target)?)
    }

    /// Whether `target` keys an inherited entry.
    pub fn has_inherited(&self, node: NodeId, kind: RelationKind, target: NodeId) -> WorldResult<bool> {
        Ok(self.resolver().has_inherited(node, kind, target)?)
    }

    /// Whether `target` keys an effective entry.
    pub fn has(&self, node: NodeId, kind: RelationKind, target: NodeId) -> WorldResult<bool> {
        Ok(self.resolver().has(node, kind, target)?)
    }

    /// The effective entry of `node` keyed by `target`.
    pub fn find(
        &self,
        node: NodeId,
        kind: RelationKind,
        target: NodeId,
    ) -> WorldResult<Option<RelationEntry>> {
        Ok(self.resolver().find(node, kind, target)?)
    }

    // ---- transactions ----

    /// Open a change bracket. Notifications are held until the outermost
    /// bracket closes.
    pub fn start_change(&mut self) {
        self.log.start_change();
    }

    /// Open a remove bracket.
    pub fn start_remove(&mut self) {
        self.log.start_remove();
    }

    /// Close the innermost bracket, flushing queued notifications if it was
    /// the outermost.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnbalancedTransaction`] if no bracket is open.
    pub fn stop_change(&mut self) -> WorldResult<()> {
        if let Some(notices) = self.log.stop()? {
            for (node, property) in notices {
                self.bus.publish(node, property);
            }
        }
        Ok(())
    }

    /// Whether any bracket is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.log.is_open()
    }

    /// Run `f` inside one change bracket. The bracket is closed even when
    /// `f` fails; `f`'s error takes precedence.
    pub fn batch<T>(&mut self, f: impl FnOnce(&mut Self) -> WorldResult<T>) -> WorldResult<T> {
        self.start_change();
        let result = f(self);
        let stopped = self.stop_change();
        let value = result?;
        stopped?;
        Ok(value)
    }

    // ---- notifications ----

    /// Stream of changes to one property of `node`.
    pub fn subscribe(&mut self, node: NodeId, property: Property) -> ChangeStream {
        self.bus.subscribe(node, property)
    }

    /// Stream of every change to `node`.
    pub fn subscribe_node(&mut self, node: NodeId) -> ChangeStream {
        self.bus.subscribe_node(node)
    }

    /// Events dropped because a subscriber's stream was full.
    #[must_use]
    pub const fn dropped_events(&self) -> u64 {
        self.bus.dropped_events()
    }

    fn notify(&mut self, node: NodeId, property: Property) {
        if self.log.is_open() {
            self.log.queue(node, property);
        } else {
            self.bus.publish(node, property);
        }
    }

    /// Notify a change of `owner`'s `view` of `kind`, plus the effective
    /// view of every descendant it reaches.
    ///
    /// With a key, propagation stops below descendants that override it.
    fn notify_relation(
        &mut self,
        owner: NodeId,
        kind: RelationKind,
        view: View,
        key: Option<NodeId>,
    ) -> WorldResult<()> {
        let reached = self.effective_reach(owner, kind, key)?;
        self.notify(owner, Property::relations(kind, view));
        if view != View::Effective {
            self.notify(owner, Property::relations(kind, View::Effective));
        }
        for node in reached {
            self.notify(node, Property::relations(kind, View::Effective));
        }
        Ok(())
    }

    fn effective_reach(
        &self,
        owner: NodeId,
        kind: RelationKind,
        key: Option<NodeId>,
    ) -> WorldResult<Vec<NodeId>> {
        let resolver = self.resolver();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<NodeId> = self.graph.children(owner).iter().copied().collect();
        while let Some(node) = queue.pop_front() {
            if !seen.insert(node) {
                continue;
            }
            if let Some(key) = key {
                if resolver.has_overridden(node, kind, key)? {
                    continue;
                }
            }
            out.push(node);
            queue.extend(self.graph.children(node).iter().copied());
        }
        Ok(out)
    }
}

fn require_standard_tables(schema: &SchemaRegistry) -> Result<(), SchemaError> {
    match schema.missing_standard_table() {
        Some(table) => Err(SchemaError::InvalidDeclaration {
            reason: format!("missing standard table {table}"),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::role;

    fn world() -> World {
        World::new(WorldConfig::default()).unwrap()
    }

    #[test]
    fn ids_are_allocated_from_one() {
        let mut w = world();
        let a = w.create_node(NodeClass::Entity, "a").unwrap();
        let b = w.create_node(NodeClass::Entity, "").unwrap();
        assert_eq!(a.id(), NodeId::from_raw(1));
        assert_eq!(b.id(), NodeId::from_raw(2));
        assert_eq!(w.name(a.id()).unwrap().as_deref(), Some("a"));
        assert_eq!(w.name(b.id()).unwrap(), None);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = WorldConfig {
            stream_capacity: 0,
            ..WorldConfig::default()
        };
        assert!(matches!(World::new(config), Err(WorldError::Validation(_))));
    }

    #[test]
    fn incomplete_schema_is_rejected() {
        let err = World::with_schema(WorldConfig::default(), crate::schema::SchemaBuilder::new().build())
            .unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn create_instance_checks_target_class() {
        let mut w = world();
        let apple = w.create_node(NodeClass::TangibleObject, "apple").unwrap();
        let ok = w
            .create_instance::<role::Change>(NodeClass::TangibleObject, Some(apple.id()))
            .unwrap();
        assert!(ok.is_success());
        let bad = w
            .create_instance::<role::Change>(NodeClass::Compound, Some(apple.id()))
            .unwrap();
        assert!(bad.is_fail());

        let id = ok.success().unwrap().id();
        assert!(w.instance::<role::Change>(id).is_some());
        assert!(w.instance::<role::Condition>(id).is_none());
        assert!(w.prototype(id).is_none());
    }

    #[test]
    fn parent_edges_follow_graph_rules() {
        let mut w = world();
        let a = w.create_node(NodeClass::Entity, "a").unwrap().id();
        let b = w.create_node(NodeClass::Entity, "b").unwrap().id();
        assert!(w.add_parent(b, a).unwrap().is_success());
        assert!(w.add_parent(b, a).unwrap().is_already_exists());
        assert!(w.add_parent(a, b).unwrap().is_fail());
        assert!(w.remove_parent(b, a).unwrap().is_success());
        assert!(w.remove_parent(b, a).unwrap().is_fail());
    }

    #[test]
    fn batch_closes_bracket_on_error() {
        let mut w = world();
        let result: WorldResult<()> = w.batch(|_| Err(WorldError::internal("boom")));
        assert!(result.unwrap_err().is_internal());
        assert!(!w.in_transaction());
        assert!(w.stop_change().unwrap_err().is_unbalanced_transaction());
    }
}
