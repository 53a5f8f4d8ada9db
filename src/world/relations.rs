//! The per-key relation protocol.
//!
//! ```text
//! Absent --add--> Personal --remove--> Absent
//! InheritedOnly --override--> InheritedAndOverridden --remove_override--> InheritedOnly
//! ```
//!
//! There is no InheritedOnly -> Personal transition: overriding is the only
//! way to shadow an inherited entry.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::error::{StoreError, WorldError, WorldResult};
use crate::graph::Attachment;
use crate::monitor::View;
use crate::node::{NodeId, NodeType, Role};
use crate::outcome::Outcome;
use crate::resolver::{RelationEntry, Tier};
use crate::schema::{columns, tables, Multiplicity, RelationKind, TableId, TableSpec};
use crate::value::Value;

use super::World;

/// Role of instances created under an owner of `owner` type.
fn role_for(owner: NodeType) -> Role {
    owner.role().unwrap_or(Role::Valued)
}

fn is_keyed(kind: RelationKind) -> bool {
    kind.descriptor().key == Multiplicity::Unique
}

impl World {
    /// Add a personal relation from `owner` to `target`.
    ///
    /// Returns the new relation instance. `AlreadyExists` if the key is
    /// already personal, overridden or inherited; `Fail` for unknown nodes,
    /// a kind the owner cannot carry, a target of the wrong class, or a
    /// containment loop.
    pub fn add_relation(
        &mut self,
        owner: NodeId,
        kind: RelationKind,
        target: NodeId,
    ) -> WorldResult<Outcome<NodeId>> {
        let (Some(owner_type), Some(target_type)) = (self.node_type(owner), self.node_type(target))
        else {
            return Ok(Outcome::Fail);
        };
        if target_type.is_instance()
            || !kind.accepts_owner(owner_type)
            || !kind.accepts_target(target_type.class())
        {
            return Ok(Outcome::Fail);
        }
        if is_keyed(kind) && self.has(owner, kind, target)? {
            return Ok(Outcome::AlreadyExists);
        }
        if self.closes_containment_loop(owner, kind, target)? {
            debug!(%owner, %kind, %target, "relation rejected: containment loop");
            return Ok(Outcome::Fail);
        }

        let instance_type = NodeType::instance(role_for(owner_type), target_type.class());
        let instance = self.alloc(instance_type);
        self.graph.set_attachment(
            instance,
            Some(Attachment {
                owner,
                kind,
                overridden: false,
            }),
        );
        self.store.set(
            instance,
            &TableId::new(instance_type, tables::TARGET),
            columns::TARGET,
            Some(Value::Node(target)),
        )?;
        self.insert_entry(owner, owner_type, kind, false, target, instance)?;
        trace!(%owner, %kind, %target, %instance, "relation added");

        self.notify_relation(owner, kind, View::Personal, Some(target))?;
        Ok(Outcome::Success(instance))
    }

    /// Shadow the inherited entry keyed by `target` with an independent deep
    /// copy of it, stored in `owner`'s overridden table.
    ///
    /// Returns the copy. `AlreadyExists` if the key is personal or already
    /// overridden; `Fail` if it is not inherited or the kind has no key.
    pub fn override_relation(
        &mut self,
        owner: NodeId,
        kind: RelationKind,
        target: NodeId,
    ) -> WorldResult<Outcome<NodeId>> {
        let Some(owner_type) = self.node_type(owner) else {
            return Ok(Outcome::Fail);
        };
        if !is_keyed(kind) || !kind.accepts_owner(owner_type) {
            return Ok(Outcome::Fail);
        }
        let source = {
            let resolver = self.resolver();
            if resolver.has_personal(owner, kind, target)?
                || resolver.has_overridden(owner, kind, target)?
            {
                return Ok(Outcome::AlreadyExists);
            }
            match crate::resolver::find(&resolver.inherited(owner, kind)?, target) {
                Some(entry) => entry,
                None => return Ok(Outcome::Fail),
            }
        };

        let copy = self.clone_instance(
            source.instance,
            Attachment {
                owner,
                kind,
                overridden: true,
            },
        )?;
        self.insert_entry(owner, owner_type, kind, true, target, copy)?;
        debug!(%owner, %kind, %target, source = %source.instance, %copy, "relation overridden");

        self.notify_relation(owner, kind, View::Overridden, Some(target))?;
        Ok(Outcome::Success(copy))
    }

    /// Drop the override keyed by `target`, destroying the overridden
    /// instance. The inherited entry becomes visible again.
    pub fn remove_override(
        &mut self,
        owner: NodeId,
        kind: RelationKind,
        target: NodeId,
    ) -> WorldResult<Outcome> {
        if !self.contains(owner) {
            return Ok(Outcome::Fail);
        }
        match crate::resolver::find(&self.overridden(owner, kind)?, target) {
            Some(entry) => Ok(self.remove_node(entry.instance)?.discard()),
            None => Ok(Outcome::Fail),
        }
    }

    /// Remove the personal entry keyed by `target`, destroying its instance.
    /// Absent keys fail and change nothing.
    pub fn remove_relation(
        &mut self,
        owner: NodeId,
        kind: RelationKind,
        target: NodeId,
    ) -> WorldResult<Outcome> {
        if !self.contains(owner) {
            return Ok(Outcome::Fail);
        }
        match crate::resolver::find(&self.personal(owner, kind)?, target) {
            Some(entry) => Ok(self.remove_node(entry.instance)?.discard()),
            None => Ok(Outcome::Fail),
        }
    }

    /// Every stored entry, in any owner's personal or overridden table, whose
    /// target is `target`. Tiers are relative to each entry's owner.
    ///
    /// One [`RelationStore::select_where`] scan per relation table.
    ///
    /// [`RelationStore::select_where`]: crate::storage::RelationStore::select_where
    pub fn referrers(&self, target: NodeId) -> WorldResult<Vec<RelationEntry>> {
        let key = Value::Node(target);
        let mut out = Vec::new();
        for node_type in NodeType::all() {
            for kind in RelationKind::for_owner(node_type) {
                for overridden in [false, true] {
                    if overridden && !kind.is_overridable() {
                        continue;
                    }
                    let table = TableId::relation(node_type, kind, overridden);
                    let Some(spec) = self.schema().table(&table) else {
                        continue;
                    };
                    let tier = if overridden { Tier::Overridden } else { Tier::Personal };
                    for owner in self.store.select_where(&table, columns::TARGET, &key)? {
                        for row in self.store.select_rows(owner, &table)? {
                            if row.get(spec, columns::TARGET) != Some(&key) {
                                continue;
                            }
                            if let Some(instance) = row.get(spec, columns::INSTANCE).and_then(Value::as_node) {
                                out.push(RelationEntry {
                                    instance,
                                    target,
                                    owner,
                                    tier,
                                });
                            }
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Prototypes whose effective `kind` view holds `target`, e.g. the
    /// wholes a part belongs to or the spaces an item sits in.
    pub fn containers(&self, target: NodeId, kind: RelationKind) -> WorldResult<Vec<NodeId>> {
        let resolver = self.resolver();
        let mut out = Vec::new();
        for id in self.graph.ids() {
            let Some(NodeType::Prototype { .. }) = self.graph.node_type(id) else {
                continue;
            };
            if resolver.has(id, kind, target)? {
                out.push(id);
            }
        }
        Ok(out)
    }

    fn insert_entry(
        &mut self,
        owner: NodeId,
        owner_type: NodeType,
        kind: RelationKind,
        overridden: bool,
        target: NodeId,
        instance: NodeId,
    ) -> WorldResult<()> {
        self.store.insert(
            owner,
            &TableId::relation(owner_type, kind, overridden),
            &[
                (columns::TARGET, Value::Node(target)),
                (columns::INSTANCE, Value::Node(instance)),
            ],
        )?;
        Ok(())
    }

    /// Whether adding `owner -> target` under a containment kind would let a
    /// node contain itself, directly or through inheritance.
    ///
    /// Descendants of `owner` inherit the new entry, so reaching any of them
    /// from `target` closes a loop too. Instances describe rather than
    /// contain and are never checked.
    fn closes_containment_loop(
        &self,
        owner: NodeId,
        kind: RelationKind,
        target: NodeId,
    ) -> WorldResult<bool> {
        if !kind.descriptor().containment || self.node_type(owner).is_some_and(NodeType::is_instance) {
            return Ok(false);
        }
        self.reaches_lineage(owner, kind, [target])
    }

    /// Whether making `parent` a parent of `child` would let `child` or one
    /// of its descendants inherit a containment entry leading back to itself.
    pub(super) fn inheritance_closes_containment_loop(
        &self,
        child: NodeId,
        parent: NodeId,
    ) -> WorldResult<bool> {
        let Some(child_type) = self.node_type(child) else {
            return Ok(false);
        };
        if child_type.is_instance() || !self.contains(parent) {
            return Ok(false);
        }
        for kind in RelationKind::for_owner(child_type) {
            if !kind.descriptor().containment {
                continue;
            }
            let targets: Vec<NodeId> = self.effective(parent, kind)?.into_iter().map(|e| e.target).collect();
            if self.reaches_lineage(child, kind, targets)? {
                debug!(%child, %parent, %kind, "parent rejected: containment loop");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Walk `kind`'s effective views from `starts` and report whether `root`
    /// or any of its descendants is reached. Removed nodes are leaves.
    fn reaches_lineage(
        &self,
        root: NodeId,
        kind: RelationKind,
        starts: impl IntoIterator<Item = NodeId>,
    ) -> WorldResult<bool> {
        let mut guarded: HashSet<NodeId> = self.graph.descendants(root).into_iter().collect();
        guarded.insert(root);

        let resolver = self.resolver();
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeId> = starts.into_iter().collect();
        while let Some(node) = stack.pop() {
            if guarded.contains(&node) {
                return Ok(true);
            }
            if !seen.insert(node) || !self.graph.contains(node) {
                continue;
            }
            stack.extend(resolver.effective(node, kind)?.into_iter().map(|e| e.target));
        }
        Ok(false)
    }

    /// Deep copy of a relation instance: properties, parents and every
    /// nested personal or overridden relation, recursively.
    pub(super) fn clone_instance(&mut self, source: NodeId, attachment: Attachment) -> WorldResult<NodeId> {
        let node_type = self
            .node_type(source)
            .ok_or(StoreError::NodeNotFound { id: source })?;
        let copy = self.alloc(node_type);
        self.graph.set_attachment(copy, Some(attachment));

        let property_tables: Vec<TableSpec> = self
            .schema()
            .tables_for(node_type)
            .filter(|spec| spec.is_nullable())
            .cloned()
            .collect();
        for spec in &property_tables {
            for row in self.store.select_rows(source, &spec.id)? {
                let cells: Vec<(&str, Value)> = spec
                    .columns
                    .iter()
                    .map(|c| c.name.as_ref())
                    .zip(row.values)
                    .filter(|(_, v)| !v.is_null())
                    .collect();
                if !cells.is_empty() {
                    self.store.insert(copy, &spec.id, &cells)?;
                }
            }
        }

        for parent in self.graph.parents(source).to_vec() {
            if self.graph.add_parent(copy, parent).is_fail() {
                return Err(WorldError::internal(format!(
                    "copy {copy} of {source} cannot inherit from {parent}"
                )));
            }
        }

        for kind in RelationKind::for_owner(node_type) {
            for overridden in [false, true] {
                if overridden && !kind.is_overridable() {
                    continue;
                }
                let entries = if overridden {
                    self.overridden(source, kind)?
                } else {
                    self.personal(source, kind)?
                };
                for entry in entries {
                    let nested = self.clone_instance(
                        entry.instance,
                        Attachment {
                            owner: copy,
                            kind,
                            overridden,
                        },
                    )?;
                    self.insert_entry(copy, node_type, kind, overridden, entry.target, nested)?;
                }
            }
        }
        Ok(copy)
    }
}
