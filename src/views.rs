//! Per-relation-kind accessors.
//!
//! Each relation kind gets the same family of methods (effective, personal,
//! overridden and inherited views, add, override, remove override, remove,
//! membership). They are generated once for every [`Handle`], so prototypes
//! and relation instances of all three roles share them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WorldResult;
use crate::instance::{RelationInstance, RoleMarker, ValuedEntity};
use crate::node::NodeId;
use crate::outcome::Outcome;
use crate::resolver::RelationEntry;
use crate::schema::RelationKind;
use crate::world::World;

/// A typed node id.
pub trait Handle: Copy {
    /// Handle type of the relation instances this node owns.
    type Child: Handle;

    /// Raw node id.
    fn id(self) -> NodeId;

    #[doc(hidden)]
    fn child(id: NodeId) -> Self::Child;
}

/// Handle to a prototype node. Relations added to a prototype are valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prototype(NodeId);

impl Prototype {
    pub(crate) const fn from_id(id: NodeId) -> Self {
        Self(id)
    }

    /// Raw node id.
    #[must_use]
    pub const fn id(self) -> NodeId {
        self.0
    }

    /// Name, if set.
    pub fn name(self, world: &World) -> WorldResult<Option<String>> {
        world.name(self.0)
    }

    /// Set or clear the name.
    pub fn set_name(self, world: &mut World, name: Option<&str>) -> WorldResult<Outcome> {
        world.set_name(self.0, name)
    }

    /// See [`World::add_parent`].
    pub fn add_parent(self, world: &mut World, parent: Prototype) -> WorldResult<Outcome> {
        world.add_parent(self.0, parent.0)
    }

    /// See [`World::remove_parent`].
    pub fn remove_parent(self, world: &mut World, parent: Prototype) -> WorldResult<Outcome> {
        world.remove_parent(self.0, parent.0)
    }

    /// Remove this prototype and everything it owns.
    pub fn remove(self, world: &mut World) -> WorldResult<Outcome<usize>> {
        world.remove_node(self.0)
    }
}

impl From<Prototype> for NodeId {
    fn from(prototype: Prototype) -> Self {
        prototype.0
    }
}

impl fmt::Display for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Handle for Prototype {
    type Child = ValuedEntity;

    fn id(self) -> NodeId {
        self.0
    }

    fn child(id: NodeId) -> Self::Child {
        ValuedEntity::from_id(id)
    }
}

impl<R: RoleMarker> Handle for RelationInstance<R> {
    type Child = Self;

    fn id(self) -> NodeId {
        RelationInstance::id(self)
    }

    fn child(id: NodeId) -> Self::Child {
        Self::from_id(id)
    }
}

macro_rules! relation_views {
    ($(
        $kind:ident {
            effective: $effective:ident,
            personal: $personal:ident,
            overridden: $overridden:ident,
            inherited: $inherited:ident,
            add: $add:ident,
            shadow: $shadow:ident,
            unshadow: $unshadow:ident,
            remove: $remove:ident,
            has: $has:ident $(,)?
        }
    )*) => {
        /// Per-kind relation accessors, available on every [`Handle`].
        ///
        /// Kinds the node cannot carry read as empty and refuse writes with
        /// [`Outcome::Fail`].
        pub trait RelationViews: Handle {
            $(
                #[doc = concat!("Effective `", stringify!($kind), "`: personal, then inherited, then overridden.")]
                fn $effective(self, world: &World) -> WorldResult<Vec<RelationEntry>> {
                    world.effective(self.id(), RelationKind::$kind)
                }

                #[doc = concat!("`", stringify!($kind), "` stored on this node.")]
                fn $personal(self, world: &World) -> WorldResult<Vec<RelationEntry>> {
                    world.personal(self.id(), RelationKind::$kind)
                }

                #[doc = concat!("`", stringify!($kind), "` overriding inherited entries.")]
                fn $overridden(self, world: &World) -> WorldResult<Vec<RelationEntry>> {
                    world.overridden(self.id(), RelationKind::$kind)
                }

                #[doc = concat!("`", stringify!($kind), "` inherited and not overridden.")]
                fn $inherited(self, world: &World) -> WorldResult<Vec<RelationEntry>> {
                    world.inherited(self.id(), RelationKind::$kind)
                }

                #[doc = concat!("See [`World::add_relation`] with `RelationKind::", stringify!($kind), "`.")]
                fn $add(self, world: &mut World, target: impl Into<NodeId>) -> WorldResult<Outcome<Self::Child>> {
                    Ok(world
                        .add_relation(self.id(), RelationKind::$kind, target.into())?
                        .map(Self::child))
                }

                #[doc = concat!("See [`World::override_relation`] with `RelationKind::", stringify!($kind), "`.")]
                fn $shadow(self, world: &mut World, target: impl Into<NodeId>) -> WorldResult<Outcome<Self::Child>> {
                    Ok(world
                        .override_relation(self.id(), RelationKind::$kind, target.into())?
                        .map(Self::child))
                }

                #[doc = concat!("See [`World::remove_override`] with `RelationKind::", stringify!($kind), "`.")]
                fn $unshadow(self, world: &mut World, target: impl Into<NodeId>) -> WorldResult<Outcome> {
                    world.remove_override(self.id(), RelationKind::$kind, target.into())
                }

                #[doc = concat!("See [`World::remove_relation`] with `RelationKind::", stringify!($kind), "`.")]
                fn $remove(self, world: &mut World, target: impl Into<NodeId>) -> WorldResult<Outcome> {
                    world.remove_relation(self.id(), RelationKind::$kind, target.into())
                }

                #[doc = concat!("Whether `target` keys an effective `", stringify!($kind), "` entry.")]
                fn $has(self, world: &World, target: impl Into<NodeId>) -> WorldResult<bool> {
                    world.has(self.id(), RelationKind::$kind, target.into())
                }
            )*
        }

        impl<T: Handle> RelationViews for T {}
    };
}

relation_views! {
    Attributes {
        effective: attributes,
        personal: personal_attributes,
        overridden: overridden_attributes,
        inherited: inherited_attributes,
        add: add_attribute,
        shadow: override_attribute,
        unshadow: remove_attribute_override,
        remove: remove_attribute,
        has: has_attribute,
    }
    Parts {
        effective: parts,
        personal: personal_parts,
        overridden: overridden_parts,
        inherited: inherited_parts,
        add: add_part,
        shadow: override_part,
        unshadow: remove_part_override,
        remove: remove_part,
        has: has_part,
    }
    Matter {
        effective: matter,
        personal: personal_matter,
        overridden: overridden_matter,
        inherited: inherited_matter,
        add: add_matter,
        shadow: override_matter,
        unshadow: remove_matter_override,
        remove: remove_matter,
        has: has_matter,
    }
    Connections {
        effective: connections,
        personal: personal_connections,
        overridden: overridden_connections,
        inherited: inherited_connections,
        add: add_connection,
        shadow: override_connection,
        unshadow: remove_connection_override,
        remove: remove_connection,
        has: has_connection,
    }
    Covers {
        effective: covers,
        personal: personal_covers,
        overridden: overridden_covers,
        inherited: inherited_covers,
        add: add_cover,
        shadow: override_cover,
        unshadow: remove_cover_override,
        remove: remove_cover,
        has: has_cover,
    }
    Layers {
        effective: layers,
        personal: personal_layers,
        overridden: overridden_layers,
        inherited: inherited_layers,
        add: add_layer,
        shadow: override_layer,
        unshadow: remove_layer_override,
        remove: remove_layer,
        has: has_layer,
    }
    Substances {
        effective: substances,
        personal: personal_substances,
        overridden: overridden_substances,
        inherited: inherited_substances,
        add: add_substance,
        shadow: override_substance,
        unshadow: remove_substance_override,
        remove: remove_substance,
        has: has_substance,
    }
    Events {
        effective: events,
        personal: personal_events,
        overridden: overridden_events,
        inherited: inherited_events,
        add: add_event,
        shadow: override_event,
        unshadow: remove_event_override,
        remove: remove_event,
        has: has_event,
    }
    Variables {
        effective: variables,
        personal: personal_variables,
        overridden: overridden_variables,
        inherited: inherited_variables,
        add: add_variable,
        shadow: override_variable,
        unshadow: remove_variable_override,
        remove: remove_variable,
        has: has_variable,
    }
    SpaceItems {
        effective: space_items,
        personal: personal_space_items,
        overridden: overridden_space_items,
        inherited: inherited_space_items,
        add: add_space_item,
        shadow: override_space_item,
        unshadow: remove_space_item_override,
        remove: remove_space_item,
        has: has_space_item,
    }
}
