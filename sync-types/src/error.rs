//! Error types for tasksync wire handling.

use thiserror::Error;

/// Errors that can occur while encoding or decoding tasksync payloads.
#[derive(Debug, Error)]
pub enum SyncError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Envelope root key is not in the payload registry
    #[error("unknown payload tag: {0}")]
    UnknownPayloadTag(String),

    /// Envelope is not a single-key JSON object
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Invalid event type discriminator
    #[error("invalid event type: {0}")]
    InvalidEventType(u8),

    /// Payload decoded but violates a protocol invariant
    #[error("invalid data: {0}")]
    InvalidData(String),
}
