//! # sync-core
//!
//! Pure logic for tasksync (no I/O, instant tests).
//!
//! This crate implements the algorithms and state machines of the sync
//! engine without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`merge`] coalesces a new event into the pending queue
//! - [`SequenceTracker`] issues causal pointers and tracks the watermark
//! - [`OutboundQueue`] holds pending and published events
//! - [`PublishState`] decides when to publish and reconnect
//!
//! The actual I/O (network, timers) is performed by `sync-client`, which
//! interprets the actions produced by these state machines. The task list
//! plugs in through the [`ModelReconciler`] and [`OutboundEventReceiver`]
//! traits.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod merge;
pub mod queue;
pub mod reconciler;
pub mod state;
pub mod stream;

pub use merge::merge;
pub use queue::{AckError, AckOutcome, OutboundQueue};
pub use reconciler::{ApplyError, ModelReconciler, OutboundEventReceiver};
pub use state::{backoff_delay, Action, Notification, PublishState, Signal};
pub use stream::SequenceTracker;
