//! Relation kinds and their static descriptors.
//!
//! Each [`RelationKind`] maps to a compile-time [`RelationDescriptor`] naming
//! its tables, the classes that may own it, the classes it may point at and
//! how entries are keyed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::{NodeClass, NodeType};

use super::registry::Multiplicity;

/// The relation collections a node can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Properties such as weight or colour.
    Attributes,
    /// Physical components.
    Parts,
    /// Compounds or substances an object is made of.
    Matter,
    /// Objects an object is joined to.
    Connections,
    /// Objects covering an object.
    Covers,
    /// Materials layered on an object or space.
    Layers,
    /// Substances a compound is made of.
    Substances,
    /// Events attached to a node.
    Events,
    /// Variables an event depends on. Not keyed.
    Variables,
    /// Items located in a space.
    SpaceItems,
}

/// Static description of one relation kind.
#[derive(Debug)]
pub struct RelationDescriptor {
    /// The kind described.
    pub kind: RelationKind,
    /// Table holding personal entries.
    pub table: &'static str,
    /// Table holding overridden entries. Unused for non-overridable kinds.
    pub overridden_table: &'static str,
    /// Classes that may own this relation.
    pub owners: &'static [NodeClass],
    /// Classes a relation of this kind may point at.
    pub targets: &'static [NodeClass],
    /// Multiplicity of the target key column.
    pub key: Multiplicity,
    /// Owner and target form a containment hierarchy that must not loop.
    pub containment: bool,
}

const ENTITIES: &[NodeClass] = &[
    NodeClass::Entity,
    NodeClass::TangibleObject,
    NodeClass::Space,
    NodeClass::Compound,
    NodeClass::Substance,
];
const OBJECTS: &[NodeClass] = &[NodeClass::TangibleObject];
const PHYSICAL: &[NodeClass] = &[NodeClass::TangibleObject, NodeClass::Space];
const MATTER: &[NodeClass] = &[NodeClass::Compound, NodeClass::Substance];

static DESCRIPTORS: [RelationDescriptor; 10] = [
    RelationDescriptor {
        kind: RelationKind::Attributes,
        table: "attributes",
        overridden_table: "overridden_attributes",
        owners: ENTITIES,
        targets: &[NodeClass::Attribute],
        key: Multiplicity::Unique,
        containment: false,
    },
    RelationDescriptor {
        kind: RelationKind::Parts,
        table: "parts",
        overridden_table: "overridden_parts",
        owners: OBJECTS,
        targets: OBJECTS,
        key: Multiplicity::Unique,
        containment: true,
    },
    RelationDescriptor {
        kind: RelationKind::Matter,
        table: "matter",
        overridden_table: "overridden_matter",
        owners: OBJECTS,
        targets: MATTER,
        key: Multiplicity::Unique,
        containment: false,
    },
    RelationDescriptor {
        kind: RelationKind::Connections,
        table: "connections",
        overridden_table: "overridden_connections",
        owners: OBJECTS,
        targets: OBJECTS,
        key: Multiplicity::Unique,
        containment: false,
    },
    RelationDescriptor {
        kind: RelationKind::Covers,
        table: "covers",
        overridden_table: "overridden_covers",
        owners: OBJECTS,
        targets: OBJECTS,
        key: Multiplicity::Unique,
        containment: false,
    },
    RelationDescriptor {
        kind: RelationKind::Layers,
        table: "layers",
        overridden_table: "overridden_layers",
        owners: PHYSICAL,
        targets: MATTER,
        key: Multiplicity::Unique,
        containment: false,
    },
    RelationDescriptor {
        kind: RelationKind::Substances,
        table: "substances",
        overridden_table: "overridden_substances",
        owners: &[NodeClass::Compound],
        targets: &[NodeClass::Substance],
        key: Multiplicity::Unique,
        containment: false,
    },
    RelationDescriptor {
        kind: RelationKind::Events,
        table: "events",
        overridden_table: "overridden_events",
        owners: ENTITIES,
        targets: &[NodeClass::Event],
        key: Multiplicity::Unique,
        containment: false,
    },
    RelationDescriptor {
        kind: RelationKind::Variables,
        table: "variables",
        overridden_table: "overridden_variables",
        owners: &[NodeClass::Event],
        targets: &[NodeClass::Variable],
        key: Multiplicity::Intermediate,
        containment: false,
    },
    RelationDescriptor {
        kind: RelationKind::SpaceItems,
        table: "space_items",
        overridden_table: "overridden_space_items",
        owners: &[NodeClass::Space],
        targets: PHYSICAL,
        key: Multiplicity::Unique,
        containment: true,
    },
];

impl RelationKind {
    /// Every relation kind, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Attributes,
        Self::Parts,
        Self::Matter,
        Self::Connections,
        Self::Covers,
        Self::Layers,
        Self::Substances,
        Self::Events,
        Self::Variables,
        Self::SpaceItems,
    ];

    /// The static descriptor for this kind.
    #[must_use]
    pub fn descriptor(self) -> &'static RelationDescriptor {
        &DESCRIPTORS[self as usize]
    }

    /// Name of the personal table.
    #[must_use]
    pub fn table_name(self) -> &'static str {
        self.descriptor().table
    }

    /// Name of the overridden table.
    #[must_use]
    pub fn overridden_table_name(self) -> &'static str {
        self.descriptor().overridden_table
    }

    /// Whether inherited entries of this kind can be shadowed by an override.
    ///
    /// Only uniquely keyed kinds can: an intermediate (join) entry has no
    /// singular key to shadow.
    #[must_use]
    pub fn is_overridable(self) -> bool {
        self.descriptor().key == Multiplicity::Unique
    }

    /// Whether nodes of `owner` type may carry this relation.
    ///
    /// Instances accept the same kinds as the class they refer to, so a
    /// condition on a compound can hold substance conditions.
    #[must_use]
    pub fn accepts_owner(self, owner: NodeType) -> bool {
        self.descriptor().owners.contains(&owner.class())
    }

    /// Whether a relation of this kind may point at a node of class `target`.
    #[must_use]
    pub fn accepts_target(self, target: NodeClass) -> bool {
        self.descriptor().targets.contains(&target)
    }

    /// Every kind a node of type `owner` may carry.
    pub fn for_owner(owner: NodeType) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |k| k.accepts_owner(owner))
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Role;

    #[test]
    fn descriptors_are_indexed_by_kind() {
        for kind in RelationKind::ALL {
            assert_eq!(kind.descriptor().kind, kind);
        }
    }

    #[test]
    fn table_names_are_distinct() {
        let mut names: Vec<&str> = RelationKind::ALL
            .iter()
            .flat_map(|k| [k.table_name(), k.overridden_table_name()])
            .collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), RelationKind::ALL.len() * 2);
    }

    #[test]
    fn owner_acceptance_follows_class() {
        let object = NodeType::prototype(NodeClass::TangibleObject);
        let compound_cond = NodeType::instance(Role::Condition, NodeClass::Compound);
        let attribute = NodeType::prototype(NodeClass::Attribute);

        assert!(RelationKind::Parts.accepts_owner(object));
        assert!(RelationKind::Attributes.accepts_owner(object));
        assert!(RelationKind::Substances.accepts_owner(compound_cond));
        assert!(!RelationKind::Parts.accepts_owner(compound_cond));
        assert_eq!(RelationKind::for_owner(attribute).count(), 0);
    }

    #[test]
    fn variables_are_not_overridable() {
        assert!(!RelationKind::Variables.is_overridable());
        assert!(RelationKind::Attributes.is_overridable());
    }
}
