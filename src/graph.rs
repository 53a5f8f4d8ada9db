//! Inheritance graph.
//!
//! A multi-parent DAG over node ids held in an arena. Several independent
//! hierarchies may coexist; there is no root. Acyclicity is enforced when an
//! edge is created, since relation resolution recurses through parents
//! without a depth bound.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{WorldError, WorldResult};
use crate::node::{NodeId, NodeType};
use crate::outcome::Outcome;
use crate::schema::RelationKind;

/// Where a relation instance is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attachment {
    /// Node whose relation table holds the instance.
    pub owner: NodeId,
    /// Relation kind the entry belongs to.
    pub kind: RelationKind,
    /// Held in the overridden table rather than the personal one.
    pub overridden: bool,
}

/// Arena entry for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Prototype class or instance role and class.
    pub node_type: NodeType,
    /// Personal parents, in the order they were added.
    pub parents: Vec<NodeId>,
    /// Direct children, in the order their edges were added.
    pub children: Vec<NodeId>,
    /// Set for relation instances held in some owner's table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl NodeRecord {
    fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            parents: Vec::new(),
            children: Vec::new(),
            attachment: None,
        }
    }
}

/// Multi-parent inheritance DAG.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritanceGraph {
    nodes: BTreeMap<NodeId, NodeRecord>,
}

impl InheritanceGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node with no parents. Returns false if the id is taken.
    pub fn insert(&mut self, id: NodeId, node_type: NodeType) -> bool {
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.nodes.insert(id, NodeRecord::new(node_type));
        true
    }

    /// Whether `id` is a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Arena record of `id`.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    /// Type of `id`, if known.
    #[must_use]
    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.nodes.get(&id).map(|r| r.node_type)
    }

    /// Personal parents of `id`. Empty for unknown ids.
    #[must_use]
    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map_or(&[], |r| r.parents.as_slice())
    }

    /// Direct children of `id`. Empty for unknown ids.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map_or(&[], |r| r.children.as_slice())
    }

    /// Owner and table of a relation instance.
    #[must_use]
    pub fn attachment(&self, id: NodeId) -> Option<Attachment> {
        self.nodes.get(&id).and_then(|r| r.attachment)
    }

    pub(crate) fn set_attachment(&mut self, id: NodeId, attachment: Option<Attachment>) {
        if let Some(record) = self.nodes.get_mut(&id) {
            record.attachment = attachment;
        }
    }

    /// Add `parent` to the personal parents of `child`.
    ///
    /// Fails for unknown nodes, self-parenting, incompatible node types and
    /// any edge that would close a cycle.
    pub fn add_parent(&mut self, child: NodeId, parent: NodeId) -> Outcome {
        let (Some(child_type), Some(parent_type)) = (self.node_type(child), self.node_type(parent))
        else {
            return Outcome::Fail;
        };
        if child == parent || !child_type.can_inherit_from(parent_type) {
            return Outcome::Fail;
        }
        if self.parents(child).contains(&parent) {
            return Outcome::AlreadyExists;
        }
        if self.is_ancestor(child, parent) {
            return Outcome::Fail;
        }

        if let Some(record) = self.nodes.get_mut(&child) {
            record.parents.push(parent);
        }
        if let Some(record) = self.nodes.get_mut(&parent) {
            record.children.push(child);
        }
        Outcome::Success(())
    }

    /// Remove a parent edge. Returns whether it existed.
    pub fn remove_parent(&mut self, child: NodeId, parent: NodeId) -> bool {
        let Some(record) = self.nodes.get_mut(&child) else {
            return false;
        };
        let before = record.parents.len();
        record.parents.retain(|p| *p != parent);
        if record.parents.len() == before {
            return false;
        }
        if let Some(record) = self.nodes.get_mut(&parent) {
            record.children.retain(|c| *c != child);
        }
        true
    }

    /// True if `ancestor` is reachable from `node` through parent edges.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.walk(node, |r| &r.parents).contains(&ancestor)
    }

    /// Every transitive ancestor, nearest first, each once.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        self.walk(id, |r| &r.parents)
    }

    /// Every transitive descendant, nearest first, each once.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.walk(id, |r| &r.children)
    }

    fn walk(&self, start: NodeId, next: impl Fn(&NodeRecord) -> &Vec<NodeId>) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        if let Some(record) = self.nodes.get(&start) {
            queue.extend(next(record).iter().copied());
        }
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            if let Some(record) = self.nodes.get(&id) {
                queue.extend(next(record).iter().copied());
            }
        }
        out
    }

    /// Remove a node and every edge touching it. Children simply lose this
    /// parent.
    pub fn remove(&mut self, id: NodeId) -> Option<NodeRecord> {
        let record = self.nodes.remove(&id)?;
        for parent in &record.parents {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        for child in &record.children {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parents.retain(|p| *p != id);
            }
        }
        Some(record)
    }

    /// Check the invariants that edge creation maintains, for graphs that
    /// did not go through [`InheritanceGraph::add_parent`], such as restored
    /// snapshots.
    ///
    /// Every edge must join known nodes of compatible types, be listed once
    /// on both ends, and the parent relation must be acyclic. Attached
    /// instances must point at a known owner.
    pub fn validate(&self) -> WorldResult<()> {
        for (&id, record) in &self.nodes {
            let mut parents = HashSet::new();
            for &parent in &record.parents {
                let Some(p) = self.nodes.get(&parent) else {
                    return Err(invalid(format!("{id} has unknown parent {parent}")));
                };
                if parent == id || !parents.insert(parent) {
                    return Err(invalid(format!("{id} lists parent {parent} more than once")));
                }
                if !record.node_type.can_inherit_from(p.node_type) {
                    return Err(invalid(format!("{id} cannot inherit from {parent}")));
                }
                if !p.children.contains(&id) {
                    return Err(invalid(format!("{parent} does not list child {id}")));
                }
            }
            let mut children = HashSet::new();
            for &child in &record.children {
                if !children.insert(child) {
                    return Err(invalid(format!("{id} lists child {child} more than once")));
                }
                if !self.parents(child).contains(&id) {
                    return Err(invalid(format!("{child} does not list parent {id}")));
                }
            }
            if let Some(attachment) = record.attachment {
                if !self.nodes.contains_key(&attachment.owner) {
                    return Err(invalid(format!("{id} is attached to unknown owner {}", attachment.owner)));
                }
            }
        }

        // Kahn's algorithm: nodes left unordered sit on or below a cycle.
        let mut pending: HashMap<NodeId, usize> =
            self.nodes.iter().map(|(id, r)| (*id, r.parents.len())).collect();
        let mut ready: Vec<NodeId> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut ordered = 0;
        while let Some(id) = ready.pop() {
            ordered += 1;
            for child in self.children(id) {
                if let Some(count) = pending.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(*child);
                    }
                }
            }
        }
        if ordered != self.nodes.len() {
            return Err(invalid(format!(
                "{} nodes sit on or below an inheritance cycle",
                self.nodes.len() - ordered
            )));
        }
        Ok(())
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node id, ascending.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Highest allocated id, if any.
    #[must_use]
    pub fn max_id(&self) -> Option<NodeId> {
        self.nodes.keys().next_back().copied()
    }
}

fn invalid(reason: String) -> WorldError {
    WorldError::InvalidSnapshot { reason }
}
