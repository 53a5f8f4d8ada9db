//! Three-tier relation resolution.
//!
//! For a node `n` and relation kind `R`:
//!
//! - `personal(n, R)`: entries stored in `n`'s own table.
//! - `overridden(n, R)`: entries stored in `n`'s overridden table, each
//!   shadowing one inherited entry with the same target.
//! - `inherited(n, R)`: the effective entries of every parent, minus those
//!   whose target is overridden on `n`.
//! - `effective(n, R)`: personal, then inherited, then overridden.
//!
//! Entries reached through several parents (diamond inheritance) are kept
//! once, by instance identity.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::graph::InheritanceGraph;
use crate::node::NodeId;
use crate::schema::{columns, RelationKind, TableId};
use crate::storage::RelationStore;

/// Where an entry sits relative to the node it was resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Stored on the node itself.
    Personal,
    /// Reached through a parent.
    Inherited,
    /// Stored in the node's overridden table.
    Overridden,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Personal => "personal",
            Self::Inherited => "inherited",
            Self::Overridden => "overridden",
        })
    }
}

/// One resolved relation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationEntry {
    /// Relation instance node holding the entry's properties.
    pub instance: NodeId,
    /// Key of the entry.
    pub target: NodeId,
    /// Node whose table stores the entry.
    pub owner: NodeId,
    /// Tier relative to the node the entry was resolved for.
    pub tier: Tier,
}

type Memo = RefCell<HashMap<(NodeId, RelationKind), Vec<RelationEntry>>>;

/// Read-only resolver over a graph and a store.
///
/// A resolver is meant to live for one external call. With memoization
/// enabled it caches `effective` per (node, kind); it borrows the world
/// immutably, so the cache can never observe a write.
pub struct Resolver<'a> {
    graph: &'a InheritanceGraph,
    store: &'a dyn RelationStore,
    memo: Option<Memo>,
}

impl<'a> Resolver<'a> {
    /// A resolver over `graph` and `store`, caching `effective` if `memoize`.
    #[must_use]
    pub fn new(graph: &'a InheritanceGraph, store: &'a dyn RelationStore, memoize: bool) -> Self {
        Self {
            graph,
            store,
            memo: memoize.then(Memo::default),
        }
    }

    /// Entries stored directly on `node`.
    pub fn personal(&self, node: NodeId, kind: RelationKind) -> Result<Vec<RelationEntry>, StoreError> {
        self.stored(node, kind, false)
    }

    /// Entries stored in `node`'s overridden table.
    pub fn overridden(&self, node: NodeId, kind: RelationKind) -> Result<Vec<RelationEntry>, StoreError> {
        if !kind.is_overridable() {
            self.require(node)?;
            return Ok(Vec::new());
        }
        self.stored(node, kind, true)
    }

    /// Parents' effective entries not shadowed by an override on `node`.
    pub fn inherited(&self, node: NodeId, kind: RelationKind) -> Result<Vec<RelationEntry>, StoreError> {
        let overridden = self.overridden(node, kind)?;
        self.inherited_excluding(node, kind, &overridden)
    }

    /// Personal, then inherited, then overridden entries.
    pub fn effective(&self, node: NodeId, kind: RelationKind) -> Result<Vec<RelationEntry>, StoreError> {
        if let Some(memo) = &self.memo {
            if let Some(hit) = memo.borrow().get(&(node, kind)) {
                return Ok(hit.clone());
            }
        }

        let personal = self.personal(node, kind)?;
        let overridden = self.overridden(node, kind)?;
        let inherited = self.inherited_excluding(node, kind, &overridden)?;

        let mut out = personal;
        out.reserve(inherited.len() + overridden.len());
        out.extend(inherited);
        out.extend(overridden);

        if let Some(memo) = &self.memo {
            memo.borrow_mut().insert((node, kind), out.clone());
        }
        Ok(out)
    }

    /// Whether `target` keys a personal entry.
    pub fn has_personal(&self, node: NodeId, kind: RelationKind, target: NodeId) -> Result<bool, StoreError> {
        Ok(find(&self.personal(node, kind)?, target).is_some())
    }

    /// Whether `target` keys an overridden entry.
    pub fn has_overridden(&self, node: NodeId, kind: RelationKind, target: NodeId) -> Result<bool, StoreError> {
        Ok(find(&self.overridden(node, kind)?, target).is_some())
    }

    /// Whether `target` keys an inherited entry.
    pub fn has_inherited(&self, node: NodeId, kind: RelationKind, target: NodeId) -> Result<bool, StoreError> {
        Ok(find(&self.inherited(node, kind)?, target).is_some())
    }

    /// Whether `target` is a key of the effective view.
    pub fn has(&self, node: NodeId, kind: RelationKind, target: NodeId) -> Result<bool, StoreError> {
        Ok(find(&self.effective(node, kind)?, target).is_some())
    }

    /// The effective entry keyed by `target`, if any.
    pub fn find(
        &self,
        node: NodeId,
        kind: RelationKind,
        target: NodeId,
    ) -> Result<Option<RelationEntry>, StoreError> {
        Ok(find(&self.effective(node, kind)?, target))
    }

    fn inherited_excluding(
        &self,
        node: NodeId,
        kind: RelationKind,
        overridden: &[RelationEntry],
    ) -> Result<Vec<RelationEntry>, StoreError> {
        let shadowed: HashSet<NodeId> = overridden.iter().map(|e| e.target).collect();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for parent in self.graph.parents(node) {
            for entry in self.effective(*parent, kind)? {
                if shadowed.contains(&entry.target) || !seen.insert(entry.instance) {
                    continue;
                }
                out.push(RelationEntry {
                    tier: Tier::Inherited,
                    ..entry
                });
            }
        }
        Ok(out)
    }

    fn stored(&self, node: NodeId, kind: RelationKind, overridden: bool) -> Result<Vec<RelationEntry>, StoreError> {
        let node_type = self.require(node)?;
        if !kind.accepts_owner(node_type) {
            return Ok(Vec::new());
        }
        let table = TableId::relation(node_type, kind, overridden);
        let targets = self.store.select_all_as::<NodeId>(node, &table, columns::TARGET)?;
        let instances = self.store.select_all_as::<NodeId>(node, &table, columns::INSTANCE)?;
        let tier = if overridden { Tier::Overridden } else { Tier::Personal };
        Ok(targets
            .into_iter()
            .zip(instances)
            .map(|(target, instance)| RelationEntry {
                instance,
                target,
                owner: node,
                tier,
            })
            .collect())
    }

    fn require(&self, node: NodeId) -> Result<crate::node::NodeType, StoreError> {
        self.graph
            .node_type(node)
            .ok_or(StoreError::NodeNotFound { id: node })
    }
}

/// First entry keyed by `target`.
#[must_use]
pub fn find(entries: &[RelationEntry], target: NodeId) -> Option<RelationEntry> {
    entries.iter().copied().find(|e| e.target == target)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::node::{NodeClass, NodeType, Role};
    use crate::schema::SchemaRegistry;
    use crate::storage::InMemoryRelationStore;
    use crate::value::Value;

    struct Fixture {
        graph: InheritanceGraph,
        store: InMemoryRelationStore,
        next: u64,
    }

    impl Fixture {
        fn new() -> Self {
            let schema = Arc::new(SchemaRegistry::standard().unwrap());
            Self {
                graph: InheritanceGraph::new(),
                store: InMemoryRelationStore::new(schema),
                next: 1,
            }
        }

        fn node(&mut self, node_type: NodeType) -> NodeId {
            let id = NodeId::from_raw(self.next);
            self.next += 1;
            self.graph.insert(id, node_type);
            id
        }

        fn entity(&mut self) -> NodeId {
            self.node(NodeType::prototype(NodeClass::Entity))
        }

        fn relate(&mut self, owner: NodeId, target: NodeId, overridden: bool) -> NodeId {
            let instance = self.node(NodeType::instance(Role::Valued, NodeClass::Attribute));
            let table = TableId::relation(
                self.graph.node_type(owner).unwrap(),
                RelationKind::Attributes,
                overridden,
            );
            self.store
                .insert(
                    owner,
                    &table,
                    &[
                        (columns::TARGET, Value::Node(target)),
                        (columns::INSTANCE, Value::Node(instance)),
                    ],
                )
                .unwrap();
            instance
        }

        fn resolver(&self, memoize: bool) -> Resolver<'_> {
            Resolver::new(&self.graph, &self.store, memoize)
        }
    }

    #[test]
    fn diamond_collapses_shared_entries() {
        for memoize in [true, false] {
            let mut f = Fixture::new();
            let weight = f.node(NodeType::prototype(NodeClass::Attribute));
            let (a, b, c, d) = (f.entity(), f.entity(), f.entity(), f.entity());
            let instance = f.relate(a, weight, false);
            assert!(f.graph.add_parent(b, a).is_success());
            assert!(f.graph.add_parent(c, a).is_success());
            assert!(f.graph.add_parent(d, b).is_success());
            assert!(f.graph.add_parent(d, c).is_success());

            let r = f.resolver(memoize);
            let effective = r.effective(d, RelationKind::Attributes).unwrap();
            assert_eq!(effective.len(), 1);
            assert_eq!(effective[0].instance, instance);
            assert_eq!(effective[0].owner, a);
            assert_eq!(effective[0].tier, Tier::Inherited);
        }
    }

    #[test]
    fn overridden_entries_shadow_inherited() {
        let mut f = Fixture::new();
        let flammable = f.node(NodeType::prototype(NodeClass::Attribute));
        let (a, b) = (f.entity(), f.entity());
        f.relate(a, flammable, false);
        assert!(f.graph.add_parent(b, a).is_success());
        let clone = f.relate(b, flammable, true);

        let r = f.resolver(true);
        assert!(r.inherited(b, RelationKind::Attributes).unwrap().is_empty());
        assert!(r.has_overridden(b, RelationKind::Attributes, flammable).unwrap());
        assert!(!r.has_personal(b, RelationKind::Attributes, flammable).unwrap());

        let effective = r.effective(b, RelationKind::Attributes).unwrap();
        assert_eq!(effective.len(), 1);
        assert_eq!(effective[0].instance, clone);
        assert_eq!(effective[0].tier, Tier::Overridden);
    }

    #[test]
    fn grandchildren_see_overrides_as_inherited() {
        let mut f = Fixture::new();
        let flammable = f.node(NodeType::prototype(NodeClass::Attribute));
        let (a, b, c) = (f.entity(), f.entity(), f.entity());
        f.relate(a, flammable, false);
        assert!(f.graph.add_parent(b, a).is_success());
        assert!(f.graph.add_parent(c, b).is_success());
        let clone = f.relate(b, flammable, true);

        let r = f.resolver(false);
        assert!(r.overridden(c, RelationKind::Attributes).unwrap().is_empty());
        let inherited = r.inherited(c, RelationKind::Attributes).unwrap();
        assert_eq!(inherited.len(), 1);
        assert_eq!(inherited[0].instance, clone);
    }

    #[test]
    fn effective_orders_tiers() {
        let mut f = Fixture::new();
        let (x, y, z) = (
            f.node(NodeType::prototype(NodeClass::Attribute)),
            f.node(NodeType::prototype(NodeClass::Attribute)),
            f.node(NodeType::prototype(NodeClass::Attribute)),
        );
        let (a, b) = (f.entity(), f.entity());
        f.relate(a, x, false);
        f.relate(a, y, false);
        assert!(f.graph.add_parent(b, a).is_success());
        f.relate(b, z, false);
        f.relate(b, y, true);

        let tiers: Vec<(NodeId, Tier)> = f
            .resolver(true)
            .effective(b, RelationKind::Attributes)
            .unwrap()
            .into_iter()
            .map(|e| (e.target, e.tier))
            .collect();
        assert_eq!(
            tiers,
            vec![(z, Tier::Personal), (x, Tier::Inherited), (y, Tier::Overridden)]
        );
    }

    #[test]
    fn unknown_nodes_are_store_errors() {
        let f = Fixture::new();
        let err = f
            .resolver(true)
            .effective(NodeId::from_raw(77), RelationKind::Attributes)
            .unwrap_err();
        assert!(matches!(err, StoreError::NodeNotFound { .. }));
    }

    #[test]
    fn kinds_not_carried_by_owner_are_empty() {
        let mut f = Fixture::new();
        let attribute = f.node(NodeType::prototype(NodeClass::Attribute));
        assert!(f
            .resolver(true)
            .effective(attribute, RelationKind::Parts)
            .unwrap()
            .is_empty());
    }
}
