//! Protocol payloads for tasksync.
//!
//! These are the objects that get wrapped in an [`Envelope`](crate::Envelope)
//! before going over the wire.

use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};

use crate::{Event, RequestId, Seq, SyncError};

/// Wire value marking a publication slot the authority did not accept.
pub const SEQ_NOT_FOUND: i64 = -1;

/// All payloads the protocol exchanges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A single accepted event pushed by the authority.
    Event(Event),
    /// Watermark update pushed by the authority.
    Stream(Stream),
    /// Client asks the authority to accept a batch of events.
    EventPublicationRequest(EventPublicationRequest),
    /// Authority's answer to a publication request.
    EventPublicationResponse(EventPublicationResponse),
}

impl Payload {
    /// Envelope root key for an [`Event`].
    pub const EVENT: &'static str = "event";
    /// Envelope root key for a [`Stream`].
    pub const STREAM: &'static str = "stream";
    /// Envelope root key for an [`EventPublicationRequest`].
    pub const EVENT_PUBLICATION_REQUEST: &'static str = "event_publication_request";
    /// Envelope root key for an [`EventPublicationResponse`].
    pub const EVENT_PUBLICATION_RESPONSE: &'static str = "event_publication_response";

    /// The envelope tag identifying this payload's type.
    pub fn tag(&self) -> &'static str {
        match self {
            Payload::Event(_) => Self::EVENT,
            Payload::Stream(_) => Self::STREAM,
            Payload::EventPublicationRequest(_) => Self::EVENT_PUBLICATION_REQUEST,
            Payload::EventPublicationResponse(_) => Self::EVENT_PUBLICATION_RESPONSE,
        }
    }

    /// Correlation identifier, for RPC payloads.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Payload::EventPublicationRequest(req) => Some(req.identifier),
            Payload::EventPublicationResponse(resp) => Some(resp.identifier),
            Payload::Event(_) | Payload::Stream(_) => None,
        }
    }

    /// Encode the payload body (without the envelope).
    pub fn to_value(&self) -> Result<serde_json::Value, SyncError> {
        match self {
            Payload::Event(e) => serde_json::to_value(e),
            Payload::Stream(s) => serde_json::to_value(s),
            Payload::EventPublicationRequest(r) => serde_json::to_value(r),
            Payload::EventPublicationResponse(r) => serde_json::to_value(r),
        }
        .map_err(SyncError::Serialization)
    }
}

impl From<Event> for Payload {
    fn from(value: Event) -> Self {
        Payload::Event(value)
    }
}

impl From<Stream> for Payload {
    fn from(value: Stream) -> Self {
        Payload::Stream(value)
    }
}

impl From<EventPublicationRequest> for Payload {
    fn from(value: EventPublicationRequest) -> Self {
        Payload::EventPublicationRequest(value)
    }
}

impl From<EventPublicationResponse> for Payload {
    fn from(value: EventPublicationResponse) -> Self {
        Payload::EventPublicationResponse(value)
    }
}

/// The authority's watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    /// Last sequence number the authority has accepted.
    pub latest_seq: Seq,
}

impl Stream {
    /// Create a watermark update.
    pub fn new(latest_seq: Seq) -> Self {
        Self { latest_seq }
    }
}

/// Request for the authority to accept a batch of pending events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPublicationRequest {
    /// Correlation token echoed by the response.
    pub identifier: RequestId,
    /// Pending events in causal order.
    pub events: Vec<Event>,
}

impl EventPublicationRequest {
    /// Create a request with a fresh identifier.
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            identifier: RequestId::new(),
            events,
        }
    }
}

/// Outcome of a single publication slot.
///
/// Slots travel as signed integers, so an accepted seq above `i64::MAX`
/// cannot be encoded and fails serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i64")]
pub enum Ack {
    /// The event was accepted and assigned this sequence number.
    Accepted(Seq),
    /// The event was not accepted; it stays pending.
    NotFound,
}

impl Ack {
    /// Sequence number for an accepted slot.
    pub fn seq(&self) -> Option<Seq> {
        match self {
            Ack::Accepted(seq) => Some(*seq),
            Ack::NotFound => None,
        }
    }
}

impl TryFrom<i64> for Ack {
    type Error = SyncError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            SEQ_NOT_FOUND => Ok(Ack::NotFound),
            v if v >= 0 => Ok(Ack::Accepted(Seq::new(v as u64))),
            v => Err(SyncError::InvalidData(format!("invalid ack slot: {}", v))),
        }
    }
}

impl Serialize for Ack {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Ack::Accepted(seq) => {
                let value = i64::try_from(seq.value())
                    .map_err(|_| S::Error::custom(format!("seq {} out of wire range", seq)))?;
                serializer.serialize_i64(value)
            }
            Ack::NotFound => serializer.serialize_i64(SEQ_NOT_FOUND),
        }
    }
}

/// The authority's answer to an [`EventPublicationRequest`].
///
/// `seqs[i]` corresponds to `events[i]` of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPublicationResponse {
    /// Identifier of the request being answered.
    pub identifier: RequestId,
    /// One slot per published event.
    pub seqs: Vec<Ack>,
}

impl EventPublicationResponse {
    /// Build the response to `request`.
    pub fn for_request(request: &EventPublicationRequest, seqs: Vec<Ack>) -> Self {
        Self {
            identifier: request.identifier,
            seqs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SeqPointer, TaskId};
    use serde_json::json;

    #[test]
    fn stream_roundtrip() {
        let stream = Stream::new(Seq::new(42));
        let value = serde_json::to_value(stream).unwrap();
        assert_eq!(value, json!({ "latestSeq": 42 }));
        let restored: Stream = serde_json::from_value(value).unwrap();
        assert_eq!(stream, restored);
    }

    #[test]
    fn publication_request_roundtrip() {
        let request = EventPublicationRequest::new(vec![
            Event::insert(TaskId::new(), SeqPointer::default(), false, "Buy milk", 6),
            Event::delete(TaskId::new(), SeqPointer::new(Seq::new(0), 1)),
        ]);

        let json = serde_json::to_string(&request).unwrap();
        let restored: EventPublicationRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(request, restored);
    }

    #[test]
    fn publication_response_uses_sentinel() {
        let request = EventPublicationRequest::new(vec![]);
        let response = EventPublicationResponse::for_request(
            &request,
            vec![Ack::Accepted(Seq::new(7)), Ack::NotFound],
        );

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["seqs"], json!([7, -1]));
        assert_eq!(value["identifier"], json!(request.identifier.to_string()));

        let restored: EventPublicationResponse = serde_json::from_value(value).unwrap();
        assert_eq!(response, restored);
    }

    #[test]
    fn negative_ack_other_than_sentinel_is_rejected() {
        assert!(Ack::try_from(-2).is_err());
        assert_eq!(Ack::try_from(0).unwrap(), Ack::Accepted(Seq::zero()));
    }

    #[test]
    fn seq_above_wire_range_fails_to_encode() {
        let max = Seq::new(i64::MAX as u64);
        assert_eq!(serde_json::to_value(Ack::Accepted(max)).unwrap(), json!(i64::MAX));

        let too_large = Ack::Accepted(Seq::new(i64::MAX as u64 + 1));
        assert!(serde_json::to_value(too_large).is_err());

        let request = EventPublicationRequest::new(vec![]);
        let response = EventPublicationResponse::for_request(&request, vec![too_large]);
        assert!(serde_json::to_string(&response).is_err());
    }

    #[test]
    fn request_id_only_on_rpc_payloads() {
        let request = EventPublicationRequest::new(vec![]);
        let id = request.identifier;
        assert_eq!(Payload::from(request).request_id(), Some(id));
        assert_eq!(Payload::from(Stream::new(Seq::zero())).request_id(), None);
    }

    #[test]
    fn tags_match_wire_names() {
        assert_eq!(Payload::from(Stream::new(Seq::zero())).tag(), "stream");
        assert_eq!(
            Payload::from(EventPublicationRequest::new(vec![])).tag(),
            "event_publication_request"
        );
    }
}
