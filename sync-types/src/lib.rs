//! # sync-types
//!
//! Wire format types for the tasksync event-sourcing protocol.
//!
//! This crate provides the foundational types used across all tasksync crates:
//! - [`TaskId`], [`RequestId`], [`Seq`], [`SeqPointer`] - Identity and ordering types
//! - [`Event`] - Immutable record of a single model mutation
//! - [`Payload`] - Every object that travels over the wire
//! - [`Envelope`], [`PayloadRegistry`] - Tagged JSON wrapper and its decoder table
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod envelope;
mod error;
mod event;
mod ids;
mod messages;

pub use envelope::{Decoder, Envelope, PayloadRegistry};
pub use error::SyncError;
pub use event::{sort_causal, Event, EventType};
pub use ids::{RequestId, Seq, SeqPointer, TaskId};
pub use messages::{
    Ack, EventPublicationRequest, EventPublicationResponse, Payload, Stream, SEQ_NOT_FOUND,
};
