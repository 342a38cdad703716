//! Events - immutable records of task mutations.
//!
//! Every change to the task list travels as an [`Event`]. Events carry the
//! [`SeqPointer`] that was current when they were created, which gives them a
//! total causal order independent of network arrival order.

use serde::{Deserialize, Serialize};

use crate::{Seq, SeqPointer, SyncError, TaskId};

/// Kind of mutation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum EventType {
    /// Adds a new task.
    Insert = 0,
    /// Overwrites the present fields of an existing task.
    Update = 1,
    /// Removes an existing task.
    Delete = 2,
}

impl TryFrom<u8> for EventType {
    type Error = SyncError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EventType::Insert),
            1 => Ok(EventType::Update),
            2 => Ok(EventType::Delete),
            _ => Err(SyncError::InvalidEventType(value)),
        }
    }
}

impl From<EventType> for u8 {
    fn from(value: EventType) -> Self {
        value as u8
    }
}

/// An immutable record of a single model mutation.
///
/// Construct with [`Event::insert`], [`Event::update`] or [`Event::delete`];
/// the constructors enforce the payload rules (Insert carries every field,
/// Delete carries none). Decoding enforces the same rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "EventFields")]
pub struct Event {
    #[serde(rename = "type")]
    event_type: EventType,
    identifier: TaskId,
    preceding_seq: Seq,
    client_seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    seq: Option<Seq>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<u8>,
}

impl Event {
    /// Create an Insert event. All payload fields are required.
    pub fn insert(
        identifier: TaskId,
        pointer: SeqPointer,
        completed: bool,
        title: impl Into<String>,
        label: u8,
    ) -> Self {
        Self {
            event_type: EventType::Insert,
            identifier,
            preceding_seq: pointer.preceding_seq,
            client_seq: pointer.client_seq,
            seq: None,
            completed: Some(completed),
            title: Some(title.into()),
            label: Some(label),
        }
    }

    /// Create an Update event. Absent fields leave the task unchanged.
    pub fn update(
        identifier: TaskId,
        pointer: SeqPointer,
        completed: Option<bool>,
        title: Option<String>,
        label: Option<u8>,
    ) -> Self {
        Self {
            event_type: EventType::Update,
            identifier,
            preceding_seq: pointer.preceding_seq,
            client_seq: pointer.client_seq,
            seq: None,
            completed,
            title,
            label,
        }
    }

    /// Create a Delete event.
    pub fn delete(identifier: TaskId, pointer: SeqPointer) -> Self {
        Self {
            event_type: EventType::Delete,
            identifier,
            preceding_seq: pointer.preceding_seq,
            client_seq: pointer.client_seq,
            seq: None,
            completed: None,
            title: None,
            label: None,
        }
    }

    /// Return a copy carrying the authority-assigned sequence number.
    pub fn with_seq(mut self, seq: Seq) -> Self {
        self.seq = Some(seq);
        self
    }

    /// Mutation kind.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Target task.
    pub fn identifier(&self) -> TaskId {
        self.identifier
    }

    /// Watermark known when the event was created.
    pub fn preceding_seq(&self) -> Seq {
        self.preceding_seq
    }

    /// Client-local counter within `preceding_seq`.
    pub fn client_seq(&self) -> u64 {
        self.client_seq
    }

    /// The pointer this event was created with.
    pub fn pointer(&self) -> SeqPointer {
        SeqPointer::new(self.preceding_seq, self.client_seq)
    }

    /// Authority-assigned sequence number, once accepted.
    pub fn seq(&self) -> Option<Seq> {
        self.seq
    }

    /// New completion state, if set.
    pub fn completed(&self) -> Option<bool> {
        self.completed
    }

    /// New title, if set.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// New color label, if set.
    pub fn label(&self) -> Option<u8> {
        self.label
    }

    /// Sort key for causal order: `(preceding_seq, client_seq)` ascending.
    pub fn causal_key(&self) -> (Seq, u64) {
        (self.preceding_seq, self.client_seq)
    }
}

/// Sort events into causal order. Stable for equal keys.
pub fn sort_causal(events: &mut [Event]) {
    events.sort_by_key(Event::causal_key);
}

/// Unvalidated field set used while decoding an [`Event`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventFields {
    #[serde(rename = "type")]
    event_type: EventType,
    identifier: TaskId,
    preceding_seq: Seq,
    client_seq: u64,
    #[serde(default)]
    seq: Option<Seq>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    label: Option<u8>,
}

impl TryFrom<EventFields> for Event {
    type Error = SyncError;

    fn try_from(fields: EventFields) -> Result<Self, Self::Error> {
        let has_all = fields.completed.is_some() && fields.title.is_some() && fields.label.is_some();
        let has_any = fields.completed.is_some() || fields.title.is_some() || fields.label.is_some();
        match fields.event_type {
            EventType::Insert if !has_all => {
                return Err(SyncError::InvalidData(format!(
                    "insert {} is missing payload fields",
                    fields.identifier
                )));
            }
            EventType::Delete if has_any => {
                return Err(SyncError::InvalidData(format!(
                    "delete {} carries payload fields",
                    fields.identifier
                )));
            }
            _ => {}
        }
        Ok(Self {
            event_type: fields.event_type,
            identifier: fields.identifier,
            preceding_seq: fields.preceding_seq,
            client_seq: fields.client_seq,
            seq: fields.seq,
            completed: fields.completed,
            title: fields.title,
            label: fields.label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ptr(preceding: u64, client: u64) -> SeqPointer {
        SeqPointer::new(Seq::new(preceding), client)
    }

    #[test]
    fn insert_carries_every_field() {
        let id = TaskId::new();
        let event = Event::insert(id, ptr(0, 0), false, "test", 83);
        assert_eq!(event.event_type(), EventType::Insert);
        assert_eq!(event.identifier(), id);
        assert_eq!(event.completed(), Some(false));
        assert_eq!(event.title(), Some("test"));
        assert_eq!(event.label(), Some(83));
        assert_eq!(event.seq(), None);
    }

    #[test]
    fn delete_carries_no_payload() {
        let event = Event::delete(TaskId::new(), ptr(4, 2));
        assert_eq!(event.event_type(), EventType::Delete);
        assert_eq!(event.completed(), None);
        assert_eq!(event.title(), None);
        assert_eq!(event.label(), None);
        assert_eq!(event.pointer(), ptr(4, 2));
    }

    #[test]
    fn event_type_discriminants() {
        for val in 0..=2u8 {
            let et = EventType::try_from(val).unwrap();
            assert_eq!(u8::from(et), val);
        }
        assert!(EventType::try_from(3).is_err());
    }

    #[test]
    fn insert_to_json_uses_wire_names() {
        let id = TaskId::new();
        let event = Event::insert(id, ptr(10, 20), false, "test", 83);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": 0,
                "identifier": id.to_string(),
                "precedingSeq": 10,
                "clientSeq": 20,
                "completed": false,
                "title": "test",
                "label": 83,
            })
        );
    }

    #[test]
    fn delete_to_json_omits_payload() {
        let id = TaskId::new();
        let value = serde_json::to_value(Event::delete(id, ptr(0, 0))).unwrap();
        let map = value.as_object().unwrap();
        assert_eq!(map.get("type"), Some(&json!(2)));
        assert!(!map.contains_key("completed"));
        assert!(!map.contains_key("title"));
        assert!(!map.contains_key("label"));
        assert!(!map.contains_key("seq"));
    }

    #[test]
    fn event_json_roundtrip_preserves_fields() {
        let event = Event::update(
            TaskId::new(),
            ptr(3, 1),
            Some(true),
            None,
            Some(4),
        )
        .with_seq(Seq::new(9));

        let json = serde_json::to_string(&event).unwrap();
        let restored: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, restored);
    }

    #[test]
    fn decoding_insert_without_title_fails() {
        let value = json!({
            "type": 0,
            "identifier": TaskId::new().to_string(),
            "precedingSeq": 0,
            "clientSeq": 0,
            "completed": false,
            "label": 1,
        });
        assert!(serde_json::from_value::<Event>(value).is_err());
    }

    #[test]
    fn decoding_delete_with_payload_fails() {
        let value = json!({
            "type": 2,
            "identifier": TaskId::new().to_string(),
            "precedingSeq": 0,
            "clientSeq": 0,
            "title": "nope",
        });
        assert!(serde_json::from_value::<Event>(value).is_err());
    }

    #[test]
    fn decoding_unknown_type_fails() {
        let value = json!({
            "type": 7,
            "identifier": TaskId::new().to_string(),
            "precedingSeq": 0,
            "clientSeq": 0,
        });
        assert!(serde_json::from_value::<Event>(value).is_err());
    }

    #[test]
    fn causal_order_prefers_preceding_seq_then_client_seq() {
        let id = TaskId::new();
        let mut events = vec![
            Event::delete(id, ptr(2, 0)),
            Event::delete(id, ptr(1, 9)),
            Event::delete(id, ptr(2, 1)),
            Event::delete(id, ptr(0, 3)),
        ];
        sort_causal(&mut events);
        let keys: Vec<_> = events.iter().map(|e| e.pointer()).collect();
        assert_eq!(keys, vec![ptr(0, 3), ptr(1, 9), ptr(2, 0), ptr(2, 1)]);
    }
}
