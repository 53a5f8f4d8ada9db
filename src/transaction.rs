//! Notification batching and cascade guard.
//!
//! The log is not an isolation mechanism. It holds a stack of open brackets;
//! while any is open, notifications are queued and deduplicated by
//! (node, property). Closing the outermost bracket hands the queue back in
//! first-occurrence order for delivery.
//!
//! Remove brackets additionally carry the set of nodes being torn down.
//! Notifications about those nodes are dropped, except the `Removed` notice
//! of a cascade root.

use std::collections::HashSet;

use tracing::trace;

use crate::error::{WorldError, WorldResult};
use crate::monitor::Property;
use crate::node::NodeId;

/// Kind of an open bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bracket {
    /// Batches notifications.
    Change,
    /// Batches notifications and suppresses those about removed nodes.
    Remove,
}

/// A queued notification.
pub type Notice = (NodeId, Property);

/// Bracket stack plus pending notification queue.
#[derive(Debug, Default)]
pub struct TransactionLog {
    brackets: Vec<Bracket>,
    pending: Vec<Notice>,
    queued: HashSet<Notice>,
    cascade: HashSet<NodeId>,
    cascade_roots: HashSet<NodeId>,
}

impl TransactionLog {
    /// A log with no open bracket.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a change bracket.
    pub fn start_change(&mut self) {
        self.brackets.push(Bracket::Change);
    }

    /// Open a remove bracket.
    pub fn start_remove(&mut self) {
        self.brackets.push(Bracket::Remove);
    }

    /// Close the innermost bracket.
    ///
    /// Returns the deduplicated queue when the outermost bracket closes,
    /// `None` while brackets remain open.
    pub fn stop(&mut self) -> WorldResult<Option<Vec<Notice>>> {
        let bracket = self.brackets.pop().ok_or(WorldError::UnbalancedTransaction)?;
        if bracket == Bracket::Remove && !self.removing() {
            self.cascade.clear();
            self.cascade_roots.clear();
        }
        if !self.brackets.is_empty() {
            return Ok(None);
        }
        self.queued.clear();
        let flushed = std::mem::take(&mut self.pending);
        trace!(notices = flushed.len(), "transaction flushed");
        Ok(Some(flushed))
    }

    /// True while any bracket is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.brackets.is_empty()
    }

    /// True while a remove bracket is open.
    #[must_use]
    pub fn removing(&self) -> bool {
        self.brackets.contains(&Bracket::Remove)
    }

    /// Number of open brackets.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.brackets.len()
    }

    /// Mark `nodes` as torn down by the cascade rooted at `root`.
    pub fn mark_cascade(&mut self, root: NodeId, nodes: impl IntoIterator<Item = NodeId>) {
        self.cascade_roots.insert(root);
        self.cascade.insert(root);
        self.cascade.extend(nodes);
    }

    /// Whether a notice would be suppressed by the open cascade.
    #[must_use]
    pub fn is_suppressed(&self, node: NodeId, property: Property) -> bool {
        if !self.cascade.contains(&node) {
            return false;
        }
        !(property == Property::Removed && self.cascade_roots.contains(&node))
    }

    /// Queue a notice. Duplicates and suppressed notices are discarded.
    ///
    /// Must only be called while a bracket is open.
    pub fn queue(&mut self, node: NodeId, property: Property) {
        if self.is_suppressed(node, property) {
            return;
        }
        if self.queued.insert((node, property)) {
            self.pending.push((node, property));
        }
    }

    /// Number of distinct notices waiting for the outermost stop.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(raw: u64) -> NodeId {
        NodeId::from_raw(raw)
    }

    #[test]
    fn stop_without_start_is_unbalanced() {
        let mut log = TransactionLog::new();
        assert!(log.stop().unwrap_err().is_unbalanced_transaction());
    }

    #[test]
    fn nested_brackets_flush_once_deduplicated() {
        let mut log = TransactionLog::new();
        log.start_change();
        log.queue(n(1), Property::Value);
        log.start_change();
        log.queue(n(2), Property::Name);
        log.queue(n(1), Property::Value);
        assert_eq!(log.stop().unwrap(), None);
        log.queue(n(1), Property::Value);

        let flushed = log.stop().unwrap().unwrap();
        assert_eq!(flushed, vec![(n(1), Property::Value), (n(2), Property::Name)]);
        assert!(!log.is_open());
    }

    #[test]
    fn cascade_suppresses_all_but_root_removal() {
        let mut log = TransactionLog::new();
        log.start_remove();
        log.mark_cascade(n(1), [n(2), n(3)]);
        log.queue(n(2), Property::Removed);
        log.queue(n(1), Property::Value);
        log.queue(n(1), Property::Removed);
        log.queue(n(9), Property::Children);

        let flushed = log.stop().unwrap().unwrap();
        assert_eq!(flushed, vec![(n(1), Property::Removed), (n(9), Property::Children)]);
        assert!(!log.is_suppressed(n(2), Property::Removed));
    }

    #[test]
    fn cascade_set_survives_until_last_remove_bracket() {
        let mut log = TransactionLog::new();
        log.start_change();
        log.start_remove();
        log.mark_cascade(n(1), std::iter::empty());
        log.start_remove();
        log.stop().unwrap();
        assert!(log.is_suppressed(n(1), Property::Name));
        log.stop().unwrap();
        assert!(!log.is_suppressed(n(1), Property::Name));
        assert!(log.is_open());
    }
}
