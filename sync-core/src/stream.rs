//! Sequence tracking for tasksync.
//!
//! The tracker holds the authority's watermark (`latest_seq`) and a
//! client-local counter. Every locally created event takes a
//! [`SeqPointer`] snapshot of both, which places it in causal order:
//! after everything the client had seen, and after every earlier local
//! event created against the same watermark.

use tasksync_types::{Seq, SeqPointer};

/// Issues causal pointers for new events.
///
/// Not thread-safe on its own; the client keeps it behind a mutex so that
/// two concurrent mutations never receive the same pointer.
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    /// Last watermark acknowledged by the authority.
    latest_seq: Seq,
    /// Next client-local counter value within `latest_seq`.
    client_seq: u64,
}

impl SequenceTracker {
    /// Create a tracker at watermark 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker resuming from a known watermark.
    pub fn with_watermark(latest_seq: Seq) -> Self {
        Self {
            latest_seq,
            client_seq: 0,
        }
    }

    /// The authority's last known watermark.
    pub fn latest_seq(&self) -> Seq {
        self.latest_seq
    }

    /// The counter value the next pointer will carry.
    pub fn client_seq(&self) -> u64 {
        self.client_seq
    }

    /// Return `(latest_seq, client_seq)` and advance the counter.
    pub fn issue_pointer(&mut self) -> SeqPointer {
        let pointer = SeqPointer::new(self.latest_seq, self.client_seq);
        self.client_seq = self.client_seq.saturating_add(1);
        pointer
    }

    /// Move to a newer watermark and restart the counter.
    ///
    /// Returns `false` (and changes nothing) if `seq` is not newer than the
    /// current watermark: re-using an old watermark would hand out pointers
    /// that were already issued.
    pub fn advance_watermark(&mut self, seq: Seq) -> bool {
        if seq <= self.latest_seq {
            return false;
        }
        self.latest_seq = seq;
        self.client_seq = 0;
        true
    }
}
