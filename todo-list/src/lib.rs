//! # tasksync-todo
//!
//! In-memory task list kept in step by tasksync events.
//!
//! [`TodoList`] implements [`ModelReconciler`](tasksync_core::ModelReconciler)
//! so a sync client can apply the authority's events, and reports its own
//! mutations to an [`OutboundEventReceiver`](tasksync_core::OutboundEventReceiver).

#![warn(missing_docs)]
#![warn(clippy::all)]

mod list;
mod task;

pub use list::TodoList;
pub use task::{ColorLabel, Task};
