use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use super::events::{ChangeEvent, SubscriptionId};

/// A subscription stream for change events.
///
/// Dropping this stream unregisters the subscription; the bus notices on its
/// next publication.
#[derive(Debug)]
pub struct ChangeStream {
    subscription_id: SubscriptionId,
    rx: Receiver<ChangeEvent>,
    control_tx: Sender<SubscriptionId>,
    unregistered: AtomicBool,
}

impl ChangeStream {
    pub(crate) fn new(
        subscription_id: SubscriptionId,
        rx: Receiver<ChangeEvent>,
        control_tx: Sender<SubscriptionId>,
    ) -> Self {
        Self {
            subscription_id,
            rx,
            control_tx,
            unregistered: AtomicBool::new(false),
        }
    }

    /// The subscription id backing this stream.
    #[must_use]
    pub const fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    /// Explicit unregistration. Idempotent.
    ///
    /// Events already buffered stay readable.
    pub fn unsubscribe(&self) {
        if self.unregistered.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.control_tx.try_send(self.subscription_id);
    }

    /// The next buffered event, if any. Never blocks.
    #[must_use]
    pub fn try_recv(&self) -> Option<ChangeEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Every buffered event, oldest first.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.rx.try_iter().collect()
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no events are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
