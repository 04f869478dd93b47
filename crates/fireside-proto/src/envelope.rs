//! Event envelope variants.
//!
//! Four wrappers share the (sender, type, content) core and differ in which
//! routing fields they carry:
//!
//! - [`RoomEvent`]: fully-qualified timeline event with room id
//! - [`SyncRoomEvent`]: timeline/state event inside a sync section, where the
//!   room id is implied by the enclosing section
//! - [`StrippedStateEvent`]: invitation preview state, no event id or
//!   timestamp
//! - [`ToDeviceEvent`]: direct device-to-device payload, no room scope at all
//!
//! All of them delegate content decoding to a [`ContentRegistry`], so an
//! envelope's content is decodable from its type tag alone.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::EventContent;
use crate::error::DecodeError;
use crate::event_type::EventType;
use crate::identifiers::{EventId, RoomId, UserId};
use crate::registry::ContentRegistry;

/// Unsigned metadata attached by the server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnsignedData {
    /// Milliseconds since the event was sent, relative to the sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,

    /// Client-supplied transaction id, echoed on the sender's own events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    /// Previous content of a replaced state event, raw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_content: Option<Value>,

    /// The redaction event that removed this event's content, raw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacted_because: Option<Value>,
}

impl UnsignedData {
    /// Whether no metadata is present (used to skip serialization).
    pub fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.transaction_id.is_none()
            && self.prev_content.is_none()
            && self.redacted_because.is_none()
    }
}

/// A fully-qualified room event as returned outside sync responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomEvent {
    /// Globally unique event id.
    pub event_id: EventId,

    /// The room the event belongs to.
    pub room_id: RoomId,

    /// The user who sent the event.
    pub sender: UserId,

    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Origin server timestamp, milliseconds since the epoch.
    pub origin_server_ts: u64,

    /// State key; present exactly for state events. `""` is a valid key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,

    /// Decoded content.
    pub content: EventContent,

    /// Server-attached metadata.
    #[serde(default, skip_serializing_if = "UnsignedData::is_empty")]
    pub unsigned: UnsignedData,
}

#[derive(Deserialize)]
struct RawRoomEvent {
    event_id: EventId,
    room_id: RoomId,
    sender: UserId,
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(default)]
    origin_server_ts: u64,
    #[serde(default)]
    state_key: Option<String>,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    unsigned: UnsignedData,
}

impl RoomEvent {
    /// Decode a raw JSON event, resolving content through the registry.
    pub fn from_value(registry: &ContentRegistry, value: Value) -> Result<Self, DecodeError> {
        let raw: RawRoomEvent =
            serde_json::from_value(value).map_err(|source| DecodeError::Envelope { source })?;
        let content = registry.decode(&raw.event_type, &raw.content)?;
        Ok(Self {
            event_id: raw.event_id,
            room_id: raw.room_id,
            sender: raw.sender,
            event_type: raw.event_type,
            origin_server_ts: raw.origin_server_ts,
            state_key: raw.state_key,
            content,
            unsigned: raw.unsigned,
        })
    }

    /// Encode back into the JSON wire form.
    pub fn to_value(&self) -> Value {
        serialize_envelope(self)
    }

    /// Whether this is a state event (has a state key).
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }
}

/// A room event inside a sync section; the room id is implied by context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncRoomEvent {
    /// Globally unique event id.
    pub event_id: EventId,

    /// The user who sent the event.
    pub sender: UserId,

    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Origin server timestamp, milliseconds since the epoch.
    pub origin_server_ts: u64,

    /// State key; present exactly for state events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,

    /// Decoded content.
    pub content: EventContent,

    /// Server-attached metadata.
    #[serde(default, skip_serializing_if = "UnsignedData::is_empty")]
    pub unsigned: UnsignedData,
}

#[derive(Deserialize)]
struct RawSyncRoomEvent {
    event_id: EventId,
    sender: UserId,
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(default)]
    origin_server_ts: u64,
    #[serde(default)]
    state_key: Option<String>,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    unsigned: UnsignedData,
}

impl SyncRoomEvent {
    /// Decode a raw JSON event, resolving content through the registry.
    pub fn from_value(registry: &ContentRegistry, value: Value) -> Result<Self, DecodeError> {
        let raw: RawSyncRoomEvent =
            serde_json::from_value(value).map_err(|source| DecodeError::Envelope { source })?;
        let content = registry.decode(&raw.event_type, &raw.content)?;
        Ok(Self {
            event_id: raw.event_id,
            sender: raw.sender,
            event_type: raw.event_type,
            origin_server_ts: raw.origin_server_ts,
            state_key: raw.state_key,
            content,
            unsigned: raw.unsigned,
        })
    }

    /// Encode back into the JSON wire form.
    pub fn to_value(&self) -> Value {
        serialize_envelope(self)
    }

    /// Whether this is a state event (has a state key).
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    /// Qualify with a room id, producing a full [`RoomEvent`].
    pub fn into_full(self, room_id: RoomId) -> RoomEvent {
        RoomEvent {
            event_id: self.event_id,
            room_id,
            sender: self.sender,
            event_type: self.event_type,
            origin_server_ts: self.origin_server_ts,
            state_key: self.state_key,
            content: self.content,
            unsigned: self.unsigned,
        }
    }
}

impl From<RoomEvent> for SyncRoomEvent {
    fn from(event: RoomEvent) -> Self {
        Self {
            event_id: event.event_id,
            sender: event.sender,
            event_type: event.event_type,
            origin_server_ts: event.origin_server_ts,
            state_key: event.state_key,
            content: event.content,
            unsigned: event.unsigned,
        }
    }
}

/// A stripped state event from an invitation preview.
///
/// Carries no event id and no timestamp; a preview is built once from a
/// one-shot batch and never incrementally updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrippedStateEvent {
    /// The user who sent the event.
    pub sender: UserId,

    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// State key. `""` is a valid key.
    pub state_key: String,

    /// Decoded content.
    pub content: EventContent,
}

#[derive(Deserialize)]
struct RawStrippedStateEvent {
    sender: UserId,
    #[serde(rename = "type")]
    event_type: EventType,
    state_key: String,
    #[serde(default)]
    content: Value,
}

impl StrippedStateEvent {
    /// Decode a raw JSON event, resolving content through the registry.
    pub fn from_value(registry: &ContentRegistry, value: Value) -> Result<Self, DecodeError> {
        let raw: RawStrippedStateEvent =
            serde_json::from_value(value).map_err(|source| DecodeError::Envelope { source })?;
        let content = registry.decode(&raw.event_type, &raw.content)?;
        Ok(Self {
            sender: raw.sender,
            event_type: raw.event_type,
            state_key: raw.state_key,
            content,
        })
    }

    /// Encode back into the JSON wire form.
    pub fn to_value(&self) -> Value {
        serialize_envelope(self)
    }
}

/// A to-device event, delivered outside any room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToDeviceEvent {
    /// The user who sent the event.
    pub sender: UserId,

    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Decoded content.
    pub content: EventContent,
}

#[derive(Deserialize)]
struct RawToDeviceEvent {
    sender: UserId,
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(default)]
    content: Value,
}

impl ToDeviceEvent {
    /// Decode a raw JSON event, resolving content through the registry.
    pub fn from_value(registry: &ContentRegistry, value: Value) -> Result<Self, DecodeError> {
        let raw: RawToDeviceEvent =
            serde_json::from_value(value).map_err(|source| DecodeError::Envelope { source })?;
        let content = registry.decode(&raw.event_type, &raw.content)?;
        Ok(Self { sender: raw.sender, event_type: raw.event_type, content })
    }

    /// Encode back into the JSON wire form.
    pub fn to_value(&self) -> Value {
        serialize_envelope(self)
    }
}

fn serialize_envelope<T: Serialize>(envelope: &T) -> Value {
    let Ok(value) = serde_json::to_value(envelope) else {
        // Envelopes serialize to JSON objects with string keys only.
        unreachable!("envelope serialization is infallible")
    };
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Membership;
    use serde_json::json;

    fn registry() -> ContentRegistry {
        ContentRegistry::new()
    }

    #[test]
    fn room_event_round_trips() {
        let raw = json!({
            "event_id": "$e1",
            "room_id": "!r:x.org",
            "sender": "@a:x.org",
            "type": "m.room.member",
            "origin_server_ts": 1_700_000_000_000_u64,
            "state_key": "@a:x.org",
            "content": {"membership": "join"},
        });
        let event = RoomEvent::from_value(&registry(), raw.clone()).unwrap();
        assert!(event.is_state());
        let EventContent::RoomMember(member) = &event.content else {
            unreachable!("expected member content");
        };
        assert_eq!(member.membership, Membership::Join);
        assert_eq!(event.to_value(), raw);
    }

    #[test]
    fn empty_state_key_is_still_a_state_event() {
        let event = SyncRoomEvent::from_value(
            &registry(),
            json!({
                "event_id": "$e2",
                "sender": "@a:x.org",
                "type": "m.room.name",
                "origin_server_ts": 1,
                "state_key": "",
                "content": {"name": "Ops"},
            }),
        )
        .unwrap();
        assert!(event.is_state());
        assert_eq!(event.state_key.as_deref(), Some(""));
    }

    #[test]
    fn message_event_is_not_state() {
        let event = SyncRoomEvent::from_value(
            &registry(),
            json!({
                "event_id": "$e3",
                "sender": "@a:x.org",
                "type": "m.room.message",
                "origin_server_ts": 2,
                "content": {"msgtype": "m.text", "body": "hi"},
            }),
        )
        .unwrap();
        assert!(!event.is_state());
    }

    #[test]
    fn unknown_event_type_round_trips_content() {
        let raw = json!({
            "event_id": "$e4",
            "sender": "@a:x.org",
            "type": "org.example.telemetry",
            "origin_server_ts": 3,
            "content": {"reading": [1, 2, 3]},
        });
        let event = SyncRoomEvent::from_value(&registry(), raw.clone()).unwrap();
        assert_eq!(event.to_value(), raw);
    }

    #[test]
    fn stripped_event_has_no_event_id() {
        let event = StrippedStateEvent::from_value(
            &registry(),
            json!({
                "sender": "@a:x.org",
                "type": "m.room.name",
                "state_key": "",
                "content": {"name": "Preview"},
            }),
        )
        .unwrap();
        assert_eq!(event.event_type, EventType::RoomName);
    }

    #[test]
    fn envelope_missing_sender_fails() {
        let err = ToDeviceEvent::from_value(
            &registry(),
            json!({"type": "m.room_key", "content": {}}),
        );
        assert!(matches!(err, Err(DecodeError::Envelope { .. })));
    }

    #[test]
    fn malformed_content_does_not_decode() {
        let err = SyncRoomEvent::from_value(
            &registry(),
            json!({
                "event_id": "$e5",
                "sender": "@a:x.org",
                "type": "m.room.member",
                "origin_server_ts": 4,
                "state_key": "@a:x.org",
                "content": {"membership": "definitely-not-a-membership"},
            }),
        );
        assert!(matches!(err, Err(DecodeError::Malformed { .. })));
    }
}
