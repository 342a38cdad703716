//! Envelope - the wire format wrapper for all tasksync payloads.
//!
//! On the wire every message is a JSON object with exactly one key. The key
//! names the payload type and the value holds its fields:
//!
//! ```json
//! { "stream": { "latestSeq": 42 } }
//! ```
//!
//! Decoding goes through a [`PayloadRegistry`] that maps each tag to a
//! decoder function. The registry is built once and handed to the transport.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::{Payload, SyncError};

/// A tagged payload body, not yet decoded into a typed [`Payload`].
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Payload type tag (the envelope's single root key).
    pub tag: String,
    /// Payload fields.
    pub body: serde_json::Value,
}

impl Envelope {
    /// Wrap a typed payload.
    pub fn from_payload(payload: &Payload) -> Result<Self, SyncError> {
        Ok(Self {
            tag: payload.tag().to_string(),
            body: payload.to_value()?,
        })
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        let mut root = serde_json::Map::with_capacity(1);
        root.insert(self.tag.clone(), self.body.clone());
        serde_json::to_vec(&serde_json::Value::Object(root)).map_err(SyncError::Serialization)
    }

    /// Parse JSON bytes into an envelope.
    ///
    /// Fails unless the document is an object with exactly one key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(SyncError::Deserialization)?;
        let serde_json::Value::Object(root) = value else {
            return Err(SyncError::MalformedEnvelope("root is not an object".into()));
        };
        if root.len() != 1 {
            return Err(SyncError::MalformedEnvelope(format!(
                "expected exactly one root key, found {}",
                root.len()
            )));
        }
        let (tag, body) = root
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::MalformedEnvelope("empty object".into()))?;
        Ok(Self { tag, body })
    }
}

/// Decoder turning an envelope body into a typed payload.
pub type Decoder = fn(serde_json::Value) -> Result<Payload, SyncError>;

/// Lookup table from envelope tag to decoder.
#[derive(Clone)]
pub struct PayloadRegistry {
    decoders: HashMap<String, Decoder>,
}

impl PayloadRegistry {
    /// An empty registry that decodes nothing.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register (or replace) the decoder for `tag`.
    pub fn register(mut self, tag: &str, decoder: Decoder) -> Self {
        self.decoders.insert(tag.to_string(), decoder);
        self
    }

    /// Check whether `tag` has a decoder.
    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Encode a payload into envelope bytes.
    pub fn encode(&self, payload: &Payload) -> Result<Vec<u8>, SyncError> {
        Envelope::from_payload(payload)?.to_bytes()
    }

    /// Decode envelope bytes into a typed payload.
    pub fn decode(&self, bytes: &[u8]) -> Result<Payload, SyncError> {
        let envelope = Envelope::from_bytes(bytes)?;
        self.decode_envelope(envelope)
    }

    /// Decode an already parsed envelope.
    pub fn decode_envelope(&self, envelope: Envelope) -> Result<Payload, SyncError> {
        let decoder = self
            .decoders
            .get(&envelope.tag)
            .ok_or_else(|| SyncError::UnknownPayloadTag(envelope.tag.clone()))?;
        decoder(envelope.body)
    }
}

impl Default for PayloadRegistry {
    /// Registry with every tasksync payload type.
    fn default() -> Self {
        Self::empty()
            .register(Payload::EVENT, |v| body::<crate::Event>(v).map(Payload::Event))
            .register(Payload::STREAM, |v| {
                body::<crate::Stream>(v).map(Payload::Stream)
            })
            .register(Payload::EVENT_PUBLICATION_REQUEST, |v| {
                body(v).map(Payload::EventPublicationRequest)
            })
            .register(Payload::EVENT_PUBLICATION_RESPONSE, |v| {
                body(v).map(Payload::EventPublicationResponse)
            })
    }
}

impl std::fmt::Debug for PayloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("PayloadRegistry").field("tags", &tags).finish()
    }
}

fn body<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, SyncError> {
    serde_json::from_value(value).map_err(SyncError::Deserialization)
}
