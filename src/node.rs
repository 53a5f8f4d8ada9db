//! Node identity and classification.
//!
//! Every addressable thing in the world is a node: prototypes such as
//! "apple" or "kitchen", and relation instances such as "this apple has
//! weight 5". Nodes are identified by a process-unique [`NodeId`] and typed by
//! a [`NodeType`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Process-unique node identifier.
///
/// Ids are allocated by a [`crate::World`] and never reused within it.
///
/// # Examples
///
/// ```
/// use kyroworld::NodeId;
///
/// let id = NodeId::from_raw(42);
/// assert_eq!(id.raw(), 42);
/// assert_eq!(id.to_string(), "#42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Wraps a raw id. Used when restoring snapshots and in tests.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer id.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What kind of thing a node describes.
///
/// `TangibleObject`, `Space`, `Compound` and `Substance` are all entities;
/// attributes, events and variables stand alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// An abstract entity.
    Entity,
    /// A physical object.
    TangibleObject,
    /// A region that holds items.
    Space,
    /// A material made of substances.
    Compound,
    /// An elementary material.
    Substance,
    /// A property such as weight or colour.
    Attribute,
    /// Something that happens.
    Event,
    /// A quantity an event depends on.
    Variable,
}

impl NodeClass {
    /// Every class, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Entity,
        Self::TangibleObject,
        Self::Space,
        Self::Compound,
        Self::Substance,
        Self::Attribute,
        Self::Event,
        Self::Variable,
    ];

    /// Stable snake_case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::TangibleObject => "tangible_object",
            Self::Space => "space",
            Self::Compound => "compound",
            Self::Substance => "substance",
            Self::Attribute => "attribute",
            Self::Event => "event",
            Self::Variable => "variable",
        }
    }

    /// Returns true if `self` is `other` or a specialisation of it.
    #[must_use]
    pub const fn is_a(self, other: Self) -> bool {
        if self as u8 == other as u8 {
            return true;
        }
        matches!(other, Self::Entity) && self.is_entity()
    }

    /// Returns true for every class that is an entity.
    #[must_use]
    pub const fn is_entity(self) -> bool {
        matches!(
            self,
            Self::Entity | Self::TangibleObject | Self::Space | Self::Compound | Self::Substance
        )
    }

    /// Returns true for classes that occupy physical space.
    #[must_use]
    pub const fn is_physical(self) -> bool {
        matches!(self, Self::TangibleObject | Self::Space)
    }

    /// Returns true for classes that can make up matter.
    #[must_use]
    pub const fn is_matter(self) -> bool {
        matches!(self, Self::Compound | Self::Substance)
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeClass {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.name() == key)
            .ok_or_else(|| SchemaError::UnknownNodeType {
                name: s.to_string(),
            })
    }
}

/// Semantic role of a relation instance.
///
/// The three roles share one shape and differ only in meaning: concrete
/// data, a predicate to test world state against, or a delta to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Concrete data.
    Valued,
    /// A predicate over world state.
    Condition,
    /// A delta to apply.
    Change,
}

impl Role {
    /// Every role.
    pub const ALL: [Self; 3] = [Self::Valued, Self::Condition, Self::Change];

    /// Stable snake_case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Valued => "valued",
            Self::Condition => "condition",
            Self::Change => "change",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Full node type: a prototype of some class, or a relation instance of some
/// role referring to a node of some class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeType {
    /// A prototype of `class`.
    Prototype { class: NodeClass },
    /// A relation instance of `role` referring to a node of `class`.
    Instance { role: Role, class: NodeClass },
}

impl NodeType {
    /// Shorthand for a prototype type.
    #[must_use]
    pub const fn prototype(class: NodeClass) -> Self {
        Self::Prototype { class }
    }

    /// Shorthand for a relation instance type.
    #[must_use]
    pub const fn instance(role: Role, class: NodeClass) -> Self {
        Self::Instance { role, class }
    }

    /// Every node type: all prototypes followed by all instances.
    #[must_use]
    pub fn all() -> Vec<Self> {
        let mut out: Vec<Self> = NodeClass::ALL.into_iter().map(Self::prototype).collect();
        for role in Role::ALL {
            out.extend(NodeClass::ALL.into_iter().map(|c| Self::instance(role, c)));
        }
        out
    }

    /// The class this node is, or refers to for instances.
    #[must_use]
    pub const fn class(self) -> NodeClass {
        match self {
            Self::Prototype { class } | Self::Instance { class, .. } => class,
        }
    }

    /// The role of an instance, `None` for prototypes.
    #[must_use]
    pub const fn role(self) -> Option<Role> {
        match self {
            Self::Prototype { .. } => None,
            Self::Instance { role, .. } => Some(role),
        }
    }

    /// Whether this is a relation instance type.
    #[must_use]
    pub const fn is_instance(self) -> bool {
        matches!(self, Self::Instance { .. })
    }

    /// Whether a node of type `self` may list a node of type `parent` among
    /// its parents.
    #[must_use]
    pub fn can_inherit_from(self, parent: Self) -> bool {
        match (self, parent) {
            (Self::Prototype { class: c }, Self::Prototype { class: p }) => c.is_a(p),
            (Self::Instance { role: r1, class: c }, Self::Instance { role: r2, class: p }) => {
                r1 == r2 && c.is_a(p)
            }
            _ => false,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prototype { class } => write!(f, "{class}"),
            Self::Instance { role, class } => write!(f, "{role}<{class}>"),
        }
    }
}

impl FromStr for NodeType {
    type Err = SchemaError;

    /// Parses `"compound"` or `"condition<compound>"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((role, rest)) = s.split_once('<') else {
            return s.parse::<NodeClass>().map(Self::prototype);
        };
        let unknown = || SchemaError::UnknownNodeType {
            name: s.to_string(),
        };
        let class = rest.strip_suffix('>').ok_or_else(unknown)?;
        let role = Role::ALL
            .into_iter()
            .find(|r| r.name() == role.trim())
            .ok_or_else(unknown)?;
        let class = class.parse::<NodeClass>().map_err(|_| unknown())?;
        Ok(Self::instance(role, class))
    }
}
