//! Change notification bus.
//!
//! Owns subscriptions keyed by (node, property) and delivers [`ChangeEvent`]s
//! to per-subscription bounded streams. Delivery never blocks: an event for
//! a full stream is dropped and counted.

use std::collections::HashMap;

use chrono::Utc;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use tracing::{trace, warn};

use crate::node::NodeId;

use super::events::{ChangeEvent, Filter, Property, SubscriptionId};
use super::stream::ChangeStream;

#[derive(Debug)]
struct SubscriptionEntry {
    filter: Filter,
    tx: Sender<ChangeEvent>,
}

/// Synchronous publish/subscribe hub for node property changes.
#[derive(Debug)]
pub struct ChangeNotificationBus {
    stream_capacity: usize,
    subs: HashMap<SubscriptionId, SubscriptionEntry>,
    control_tx: Sender<SubscriptionId>,
    control_rx: Receiver<SubscriptionId>,
    sequence: u64,
    dropped_events: u64,
}

impl ChangeNotificationBus {
    /// A bus whose streams buffer up to `stream_capacity` events.
    #[must_use]
    pub fn new(stream_capacity: usize) -> Self {
        let (control_tx, control_rx) = unbounded();
        Self {
            stream_capacity: stream_capacity.max(1),
            subs: HashMap::new(),
            control_tx,
            control_rx,
            sequence: 0,
            dropped_events: 0,
        }
    }

    /// Listen to one property of `node`.
    pub fn subscribe(&mut self, node: NodeId, property: Property) -> ChangeStream {
        self.register(Filter {
            node,
            property: Some(property),
        })
    }

    /// Listen to every property of `node`.
    pub fn subscribe_node(&mut self, node: NodeId) -> ChangeStream {
        self.register(Filter {
            node,
            property: None,
        })
    }

    fn register(&mut self, filter: Filter) -> ChangeStream {
        self.collect_unregistered();
        let subscription_id = SubscriptionId::new();
        let (tx, rx) = bounded(self.stream_capacity);
        self.subs
            .insert(subscription_id, SubscriptionEntry { filter, tx });
        trace!(node = %filter.node, subscriptions = self.subs.len(), "subscription registered");
        ChangeStream::new(subscription_id, rx, self.control_tx.clone())
    }

    /// Deliver one event to every matching subscription.
    pub fn publish(&mut self, node: NodeId, property: Property) {
        self.collect_unregistered();
        self.sequence += 1;
        if self.subs.is_empty() {
            return;
        }

        let event = ChangeEvent {
            sequence: self.sequence,
            node,
            property,
            at: Utc::now(),
        };
        let mut disconnected = Vec::new();
        for (id, sub) in &self.subs {
            if !sub.filter.matches(node, property) {
                continue;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped_events += 1;
                    warn!(%node, %property, subscription = ?id, "subscriber stream full, event dropped");
                }
                Err(TrySendError::Disconnected(_)) => disconnected.push(*id),
            }
        }
        for id in disconnected {
            self.subs.remove(&id);
        }
    }

    /// Events dropped because a subscriber's stream was full.
    #[must_use]
    pub const fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&mut self) -> usize {
        self.collect_unregistered();
        self.subs.len()
    }

    fn collect_unregistered(&mut self) {
        while let Ok(id) = self.control_rx.try_recv() {
            self.subs.remove(&id);
        }
    }
}
