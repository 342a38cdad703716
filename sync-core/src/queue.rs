//! Outbound queue for tasksync.
//!
//! This module holds the client's view of the event log:
//! - pending events, coalesced and kept in causal order
//! - the published log of events the authority has accepted
//!
//! Events flow through the queue in this order:
//! 1. `enqueue()` - merge a newly created event into the pending set
//! 2. `snapshot()` - copy the pending set into a publication request
//! 3. `apply_acks()` - move accepted events to the published log
//!
//! Nothing but a count-correct acknowledgement moves an event out of the
//! pending set; failed or aborted publications leave it untouched.

use tasksync_types::{sort_causal, Ack, Event};
use thiserror::Error;

use crate::merge::merge;

/// Error applying a publication response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AckError {
    /// Response slot count differs from the number of published events.
    #[error("acknowledged {actual} events, expected {expected}")]
    CountMismatch {
        /// Number of events in the request.
        expected: usize,
        /// Number of slots in the response.
        actual: usize,
    },
}

/// Result of applying a publication response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckOutcome {
    /// Events moved to the published log.
    pub published: usize,
    /// Events the authority did not accept (still pending).
    pub rejected: usize,
}

/// Pending and published events, owned by a single writer.
#[derive(Debug, Clone, Default)]
pub struct OutboundQueue {
    /// Events waiting for publication, in causal order.
    pending: Vec<Event>,
    /// Events the authority has accepted, in arrival order.
    published: Vec<Event>,
}

impl OutboundQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a newly created event into the pending set.
    pub fn enqueue(&mut self, event: Event) {
        let merged = merge(event, &self.pending);
        self.pending = merged;
    }

    /// Copy of the pending set in causal order.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut events = self.pending.clone();
        sort_causal(&mut events);
        events
    }

    /// Apply the authority's acknowledgement of `snapshot`.
    ///
    /// `acks[i]` answers `snapshot[i]`. On a count mismatch nothing changes.
    /// Accepted events get their `seq`, leave the pending set and join the
    /// published log; `NotFound` slots stay pending for a later retry.
    pub fn apply_acks(&mut self, snapshot: &[Event], acks: &[Ack]) -> Result<AckOutcome, AckError> {
        if snapshot.len() != acks.len() {
            return Err(AckError::CountMismatch {
                expected: snapshot.len(),
                actual: acks.len(),
            });
        }

        let mut outcome = AckOutcome::default();
        for (event, ack) in snapshot.iter().zip(acks) {
            let Some(seq) = ack.seq() else {
                outcome.rejected += 1;
                continue;
            };
            if let Some(pos) = self.pending.iter().position(|p| p == event) {
                let accepted = self.pending.remove(pos).with_seq(seq);
                self.published.push(accepted);
                outcome.published += 1;
            }
        }
        Ok(outcome)
    }

    /// Record an event pushed by the authority.
    ///
    /// Returns `false` if an event with the same `seq` is already in the
    /// published log (duplicate delivery).
    pub fn record_inbound(&mut self, event: Event) -> bool {
        if let Some(seq) = event.seq() {
            if self.published.iter().any(|e| e.seq() == Some(seq)) {
                return false;
            }
        }
        self.published.push(event);
        true
    }

    /// Pending events.
    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    /// Published log.
    pub fn published(&self) -> &[Event] {
        &self.published
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_types::{Seq, SeqPointer, TaskId};

    fn ptr(preceding: u64, client: u64) -> SeqPointer {
        SeqPointer::new(Seq::new(preceding), client)
    }

    fn insert(client: u64) -> Event {
        Event::insert(TaskId::new(), ptr(0, client), false, "task", 0)
    }

    #[test]
    fn enqueue_coalesces_same_target() {
        let mut queue = OutboundQueue::new();
        let first = insert(0);
        queue.enqueue(first.clone());
        queue.enqueue(Event::update(first.identifier(), ptr(0, 1), Some(true), None, None));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pending()[0].completed(), Some(true));
    }

    #[test]
    fn snapshot_is_causally_ordered() {
        let mut queue = OutboundQueue::new();
        queue.enqueue(insert(0));
        queue.enqueue(insert(1));
        queue.enqueue(insert(2));

        let keys: Vec<_> = queue.snapshot().iter().map(Event::pointer).collect();
        assert_eq!(keys, vec![ptr(0, 0), ptr(0, 1), ptr(0, 2)]);
    }

    #[test]
    fn acks_move_events_to_published_log() {
        let mut queue = OutboundQueue::new();
        queue.enqueue(insert(0));
        queue.enqueue(insert(1));
        let snapshot = queue.snapshot();

        let outcome = queue
            .apply_acks(&snapshot, &[Ack::Accepted(Seq::new(1)), Ack::Accepted(Seq::new(2))])
            .unwrap();

        assert_eq!(outcome, AckOutcome { published: 2, rejected: 0 });
        assert!(queue.is_empty());
        assert_eq!(queue.published()[0].seq(), Some(Seq::new(1)));
        assert_eq!(queue.published()[1].seq(), Some(Seq::new(2)));
    }

    #[test]
    fn not_found_slot_stays_pending() {
        let mut queue = OutboundQueue::new();
        queue.enqueue(insert(0));
        queue.enqueue(insert(1));
        let snapshot = queue.snapshot();

        let outcome = queue
            .apply_acks(&snapshot, &[Ack::NotFound, Ack::Accepted(Seq::new(5))])
            .unwrap();

        assert_eq!(outcome, AckOutcome { published: 1, rejected: 1 });
        assert_eq!(queue.pending(), &snapshot[..1]);
        assert_eq!(queue.published().len(), 1);
        assert_eq!(queue.published()[0].identifier(), snapshot[1].identifier());
    }

    #[test]
    fn count_mismatch_leaves_queue_untouched() {
        let mut queue = OutboundQueue::new();
        queue.enqueue(insert(0));
        queue.enqueue(insert(1));
        let snapshot = queue.snapshot();

        let result = queue.apply_acks(&snapshot, &[Ack::Accepted(Seq::new(1))]);

        assert_eq!(
            result,
            Err(AckError::CountMismatch { expected: 2, actual: 1 })
        );
        assert_eq!(queue.pending(), snapshot.as_slice());
        assert!(queue.published().is_empty());
    }

    #[test]
    fn duplicate_inbound_event_is_recorded_once() {
        let mut queue = OutboundQueue::new();
        let event = insert(0).with_seq(Seq::new(3));

        assert!(queue.record_inbound(event.clone()));
        assert!(!queue.record_inbound(event));
        assert_eq!(queue.published().len(), 1);
    }

    #[test]
    fn inbound_events_do_not_touch_pending() {
        let mut queue = OutboundQueue::new();
        queue.enqueue(insert(0));
        queue.record_inbound(insert(1).with_seq(Seq::new(1)));
        assert_eq!(queue.len(), 1);
    }
}
