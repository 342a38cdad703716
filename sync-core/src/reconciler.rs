//! Capabilities connecting the task model and the sync client.
//!
//! The model exposes [`ModelReconciler`] so the client can apply events it
//! receives. The client exposes [`OutboundEventReceiver`] so the model can
//! stamp and hand over the events it creates. Each side is given the other
//! at construction; neither owns the other.

use tasksync_types::{Event, SeqPointer, TaskId};
use thiserror::Error;

/// An event's target precondition did not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// Insert for a task that already exists.
    #[error("task already exists: {0}")]
    AlreadyExists(TaskId),

    /// Update or Delete for a task that does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),
}

/// Applies causally ordered events to a model.
pub trait ModelReconciler {
    /// Apply `events` in the order given.
    ///
    /// Stops at the first event that fails; events before it stay applied,
    /// events after it are not applied. An empty batch succeeds.
    fn apply(&mut self, events: &[Event]) -> Result<(), ApplyError>;
}

/// Receives events created by the model.
pub trait OutboundEventReceiver {
    /// Take the next causal pointer for a new event.
    fn issue_pointer(&self) -> SeqPointer;

    /// A new event was created and applied locally.
    fn on_event_created(&self, event: Event);
}
