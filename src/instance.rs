//! Role-typed relation instance handles.
//!
//! Every relation kind comes in three parallel forms sharing one shape:
//! valued data, a condition to test world state against, and a change to
//! apply. The role is a type parameter here so that a condition cannot be
//! passed where a valued entry is expected; the world stores all three the
//! same way.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::error::WorldResult;
use crate::node::{NodeId, Role};
use crate::outcome::Outcome;
use crate::value::{Necessity, Presence, QuantityRange, Value};
use crate::world::World;

/// Compile-time role tag.
pub trait RoleMarker: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Role this marker stands for.
    const ROLE: Role;
}

/// Role marker types.
pub mod role {
    use super::RoleMarker;
    use crate::node::Role;

    /// Concrete data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Valued;

    /// A predicate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Condition;

    /// A delta.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Change;

    impl RoleMarker for Valued {
        const ROLE: Role = Role::Valued;
    }

    impl RoleMarker for Condition {
        const ROLE: Role = Role::Condition;
    }

    impl RoleMarker for Change {
        const ROLE: Role = Role::Change;
    }
}

/// Handle to a relation instance of role `R`.
///
/// A plain id: all state lives in the [`World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationInstance<R: RoleMarker> {
    id: NodeId,
    #[serde(skip)]
    _role: PhantomData<R>,
}

/// Instance of concrete data held by a prototype.
pub type ValuedEntity = RelationInstance<role::Valued>;
/// Instance describing a predicate over world state.
pub type ConditionEntity = RelationInstance<role::Condition>;
/// Instance describing a delta to apply.
pub type ChangeEntity = RelationInstance<role::Change>;

impl<R: RoleMarker> RelationInstance<R> {
    pub(crate) const fn from_id(id: NodeId) -> Self {
        Self {
            id,
            _role: PhantomData,
        }
    }

    /// Raw node id.
    #[must_use]
    pub const fn id(self) -> NodeId {
        self.id
    }

    /// Role fixed by the handle type.
    #[must_use]
    pub const fn role(self) -> Role {
        R::ROLE
    }

    /// Node this instance refers to.
    pub fn target(self, world: &World) -> WorldResult<Option<NodeId>> {
        world.target(self.id)
    }

    /// Quantity range, if set.
    pub fn quantity(self, world: &World) -> WorldResult<Option<QuantityRange>> {
        world.quantity(self.id)
    }

    /// Set or clear the quantity range.
    pub fn set_quantity(self, world: &mut World, quantity: Option<QuantityRange>) -> WorldResult<Outcome> {
        world.set_quantity(self.id, quantity)
    }

    /// Necessity, if set.
    pub fn necessity(self, world: &World) -> WorldResult<Option<Necessity>> {
        world.necessity(self.id)
    }

    /// Set or clear the necessity.
    pub fn set_necessity(self, world: &mut World, necessity: Option<Necessity>) -> WorldResult<Outcome> {
        world.set_necessity(self.id, necessity)
    }

    /// Presence, if set.
    pub fn presence(self, world: &World) -> WorldResult<Option<Presence>> {
        world.presence(self.id)
    }

    /// Set or clear the presence.
    pub fn set_presence(self, world: &mut World, presence: Option<Presence>) -> WorldResult<Outcome> {
        world.set_presence(self.id, presence)
    }

    /// Scalar value, if set.
    pub fn value(self, world: &World) -> WorldResult<Option<Value>> {
        world.value(self.id)
    }

    /// Set or clear the scalar value.
    pub fn set_value(self, world: &mut World, value: Option<Value>) -> WorldResult<Outcome> {
        world.set_value(self.id, value)
    }

    /// Remove this instance and everything it owns.
    pub fn remove(self, world: &mut World) -> WorldResult<Outcome<usize>> {
        world.remove_node(self.id)
    }
}

impl ChangeEntity {
    /// Apply this change to `subject`. See [`World::apply_change`].
    pub fn apply_to(
        self,
        world: &mut World,
        subject: impl Into<NodeId>,
    ) -> WorldResult<Outcome<crate::world::ChangeReport>> {
        world.apply_change(subject.into(), self.id)
    }
}

impl<R: RoleMarker> From<RelationInstance<R>> for NodeId {
    fn from(instance: RelationInstance<R>) -> Self {
        instance.id
    }
}

impl<R: RoleMarker> fmt::Display for RelationInstance<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", R::ROLE, self.id)
    }
}
