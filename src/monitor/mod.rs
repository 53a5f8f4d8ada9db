//! Change notifications.
//!
//! Observers subscribe to a (node, property) pair and receive events on a
//! bounded stream. The bus is synchronous and in-process; the world batches
//! publications through its transaction log before they reach it.

/// Notification hub.
pub mod bus;
/// Subscription and event types.
pub mod events;
/// Subscriber stream handle.
pub mod stream;

pub use bus::ChangeNotificationBus;
pub use events::{ChangeEvent, Property, SubscriptionId, View};
pub use stream::ChangeStream;
