//! Subscription and event types for change notifications.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::node::NodeId;
use crate::schema::RelationKind;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Which set of a relation collection changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// Entries stored on the node itself.
    Personal,
    /// Entries shadowing inherited ones.
    Overridden,
    /// The union callers observe. Also raised on descendants when an
    /// ancestor edit reaches them.
    Effective,
}

/// An observable property of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "property", rename_all = "snake_case")]
pub enum Property {
    /// One view of a relation collection.
    Relations { kind: RelationKind, view: View },
    /// Personal parent list.
    Parents,
    /// Direct children list.
    Children,
    /// Prototype name.
    Name,
    /// Target of a relation instance.
    Target,
    /// Quantity range of a relation instance.
    Quantity,
    /// Necessity of a relation instance.
    Necessity,
    /// Presence of a relation instance.
    Presence,
    /// Scalar value of a relation instance.
    Value,
    /// The node itself was removed.
    Removed,
}

impl Property {
    /// Shorthand for a relation collection property.
    #[must_use]
    pub const fn relations(kind: RelationKind, view: View) -> Self {
        Self::Relations { kind, view }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relations { kind, view } => {
                let view = match view {
                    View::Personal => "personal",
                    View::Overridden => "overridden",
                    View::Effective => "effective",
                };
                write!(f, "{kind}:{view}")
            }
            Self::Parents => f.write_str("parents"),
            Self::Children => f.write_str("children"),
            Self::Name => f.write_str("name"),
            Self::Target => f.write_str("target"),
            Self::Quantity => f.write_str("quantity"),
            Self::Necessity => f.write_str("necessity"),
            Self::Presence => f.write_str("presence"),
            Self::Value => f.write_str("value"),
            Self::Removed => f.write_str("removed"),
        }
    }
}

/// A delivered change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Bus-wide publication counter. Gaps mean events were dropped or
    /// filtered for this subscriber.
    pub sequence: u64,
    /// Node that changed.
    pub node: NodeId,
    /// What changed on it.
    pub property: Property,
    /// Publication time.
    pub at: DateTime<Utc>,
}

/// What a subscription listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Filter {
    pub node: NodeId,
    /// `None` matches every property of the node.
    pub property: Option<Property>,
}

impl Filter {
    pub fn matches(&self, node: NodeId, property: Property) -> bool {
        self.node == node && self.property.map_or(true, |p| p == property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_node_and_property() {
        let n = NodeId::from_raw(1);
        let attrs = Property::relations(RelationKind::Attributes, View::Effective);
        let exact = Filter {
            node: n,
            property: Some(attrs),
        };
        let any = Filter {
            node: n,
            property: None,
        };

        assert!(exact.matches(n, attrs));
        assert!(!exact.matches(n, Property::Name));
        assert!(!exact.matches(NodeId::from_raw(2), attrs));
        assert!(any.matches(n, Property::Removed));
    }

    #[test]
    fn property_display() {
        assert_eq!(
            Property::relations(RelationKind::SpaceItems, View::Overridden).to_string(),
            "space_items:overridden"
        );
        assert_eq!(Property::Quantity.to_string(), "quantity");
    }
}
