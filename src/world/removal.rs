//! Cascading node removal.

use std::collections::HashSet;

use tracing::debug;

use crate::error::WorldResult;
use crate::monitor::{Property, View};
use crate::node::NodeId;
use crate::outcome::Outcome;
use crate::resolver::Resolver;
use crate::schema::{columns, RelationKind, TableId};
use crate::value::Value;

use super::World;

impl World {
    /// Remove a node and everything it personally owns.
    ///
    /// Runs inside a remove bracket: owned relation instances go first
    /// (deepest first, each once), then the node leaves the inheritance graph
    /// and the store. Children simply lose the parent. If the node is a
    /// relation instance, its entry in the owner's table goes too.
    ///
    /// Valued references to the node held elsewhere are left in place; see
    /// [`World::referrers`].
    ///
    /// Returns the number of nodes removed; `Fail` for unknown nodes.
    pub fn remove_node(&mut self, id: NodeId) -> WorldResult<Outcome<usize>> {
        if !self.contains(id) {
            return Ok(Outcome::Fail);
        }
        let doomed = self.owned_closure(id)?;

        self.log.start_remove();
        self.log.mark_cascade(id, doomed.iter().copied());
        let result = self.tear_down(id, &doomed);
        let stopped = self.stop_change();
        let removed = result?;
        stopped?;

        debug!(%id, removed, "node removed");
        Ok(Outcome::Success(removed))
    }

    /// `root` plus every instance it owns transitively, children before
    /// their owners, `root` last.
    fn owned_closure(&self, root: NodeId) -> WorldResult<Vec<NodeId>> {
        let resolver = self.resolver();
        let mut seen = HashSet::from([root]);
        let mut order = Vec::new();
        self.collect_owned(&resolver, root, &mut seen, &mut order)?;
        order.push(root);
        Ok(order)
    }

    fn collect_owned(
        &self,
        resolver: &Resolver<'_>,
        node: NodeId,
        seen: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) -> WorldResult<()> {
        let Some(node_type) = self.node_type(node) else {
            return Ok(());
        };
        for kind in RelationKind::for_owner(node_type) {
            let mut entries = resolver.personal(node, kind)?;
            entries.extend(resolver.overridden(node, kind)?);
            for entry in entries {
                if seen.insert(entry.instance) {
                    self.collect_owned(resolver, entry.instance, seen, order)?;
                    order.push(entry.instance);
                }
            }
        }
        Ok(())
    }

    fn tear_down(&mut self, root: NodeId, doomed: &[NodeId]) -> WorldResult<usize> {
        self.detach_from_owner(root)?;

        let doomed_set: HashSet<NodeId> = doomed.iter().copied().collect();
        let mut removed = 0;
        for &node in doomed {
            let Some(node_type) = self.node_type(node) else {
                continue;
            };

            let heirs: Vec<NodeId> = self
                .graph
                .children(node)
                .iter()
                .copied()
                .filter(|c| !doomed_set.contains(c))
                .collect();
            if !heirs.is_empty() {
                let kinds = self.lost_kinds(node)?;
                for heir in heirs {
                    self.notify_lineage(heir, node, &kinds);
                }
            }
            for parent in self.graph.parents(node).to_vec() {
                self.notify(parent, Property::Children);
            }

            let tables: Vec<TableId> = self
                .schema()
                .tables_for(node_type)
                .map(|spec| spec.id.clone())
                .collect();
            for table in &tables {
                self.store.remove_all(node, table)?;
            }
            self.graph.remove(node);
            self.notify(node, Property::Removed);
            removed += 1;
        }
        Ok(removed)
    }

    /// Kinds for which `node`'s effective view is non-empty.
    fn lost_kinds(&self, node: NodeId) -> WorldResult<Vec<RelationKind>> {
        let node_type = self.require(node)?;
        let resolver = self.resolver();
        let mut kinds = Vec::new();
        for kind in RelationKind::for_owner(node_type) {
            if !resolver.effective(node, kind)?.is_empty() {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    /// Delete the entry pointing at an attached instance from its owner's
    /// table.
    fn detach_from_owner(&mut self, instance: NodeId) -> WorldResult<()> {
        let Some(attachment) = self.graph.attachment(instance) else {
            return Ok(());
        };
        let Some(owner_type) = self.node_type(attachment.owner) else {
            return Ok(());
        };
        let key = self.target(instance)?;
        let table = TableId::relation(owner_type, attachment.kind, attachment.overridden);
        let removed = self.store.remove(
            attachment.owner,
            &table,
            columns::INSTANCE,
            &Value::Node(instance),
        )?;
        self.graph.set_attachment(instance, None);
        if removed {
            let view = if attachment.overridden {
                View::Overridden
            } else {
                View::Personal
            };
            self.notify_relation(attachment.owner, attachment.kind, view, key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::WorldConfig;
    use crate::node::NodeClass;

    use super::*;

    #[test]
    fn removal_cascades_through_owned_instances() {
        let mut w = World::new(WorldConfig::default()).unwrap();
        let bread = w.create_node(NodeClass::Compound, "bread").unwrap().id();
        let flour = w.create_node(NodeClass::Substance, "flour").unwrap().id();
        let sandwich = w.create_node(NodeClass::TangibleObject, "sandwich").unwrap().id();

        let matter = w.add_relation(sandwich, RelationKind::Matter, bread).unwrap().success().unwrap();
        let nested = w
            .add_relation(matter, RelationKind::Substances, flour)
            .unwrap()
            .success()
            .unwrap();

        let before = w.node_count();
        assert_eq!(w.remove_node(sandwich).unwrap(), Outcome::Success(3));
        assert_eq!(w.node_count(), before - 3);
        assert!(!w.contains(matter));
        assert!(!w.contains(nested));
        // valued targets survive
        assert!(w.contains(bread));
        assert!(w.referrers(bread).unwrap().is_empty());
    }

    #[test]
    fn removing_an_instance_detaches_it_from_its_owner() {
        let mut w = World::new(WorldConfig::default()).unwrap();
        let weight = w.create_node(NodeClass::Attribute, "weight").unwrap().id();
        let apple = w.create_node(NodeClass::TangibleObject, "apple").unwrap().id();
        let inst = w.add_relation(apple, RelationKind::Attributes, weight).unwrap().success().unwrap();

        assert!(w.remove_node(inst).unwrap().is_success());
        assert!(w.personal(apple, RelationKind::Attributes).unwrap().is_empty());
        assert!(w.remove_node(inst).unwrap().is_fail());
    }

    #[test]
    fn children_lose_removed_parent() {
        let mut w = World::new(WorldConfig::default()).unwrap();
        let fruit = w.create_node(NodeClass::TangibleObject, "fruit").unwrap().id();
        let apple = w.create_node(NodeClass::TangibleObject, "apple").unwrap().id();
        assert!(w.add_parent(apple, fruit).unwrap().is_success());

        assert!(w.remove_node(fruit).unwrap().is_success());
        assert!(w.parents(apple).is_empty());
        assert!(w.contains(apple));
    }
}
