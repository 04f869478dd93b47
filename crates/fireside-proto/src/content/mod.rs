//! Typed event content.
//!
//! [`EventContent`] is a closed tagged union over the known content shapes
//! plus one [`UnknownContent`] passthrough variant. Decoding is tolerant:
//! unexpected extra fields never fail, so the engine survives server-side
//! protocol evolution. Missing required fields fail with a
//! [`DecodeError`](crate::DecodeError).

pub mod account;
pub mod encrypted;
pub mod member;
pub mod message;
pub mod poll;
pub mod relation;
pub mod room;
pub mod space;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::event_type::EventType;

pub use account::{DirectContent, FullyReadContent, TagContent, TagInfo};
pub use encrypted::{EncryptedContent, OlmCiphertext, RoomKeyContent};
pub use member::{MemberContent, Membership};
pub use message::{FilePayload, MessageContent, MessageKind, TextPayload};
pub use poll::{PollAnswer, PollEndContent, PollResponseContent, PollStartContent};
pub use relation::{ReactionContent, Relation};
pub use room::{
    AvatarContent, CanonicalAliasContent, CreateContent, EncryptionContent, GuestAccessContent,
    HistoryVisibilityContent, JoinRule, JoinRulesContent, NameContent, PowerLevel,
    PowerLevelsContent, PreviousRoom, RedactionContent, TombstoneContent, TopicContent,
};
pub use space::{SpaceChildContent, SpaceParentContent};

/// Decoded payload of a single event.
///
/// Owned by exactly one envelope. The variant is determined by the envelope's
/// type tag (plus the in-content `algorithm` discriminator for encrypted
/// payloads).
#[derive(Debug, Clone, PartialEq)]
pub enum EventContent {
    /// `m.room.create`
    RoomCreate(CreateContent),
    /// `m.room.member`
    RoomMember(MemberContent),
    /// `m.room.name`
    RoomName(NameContent),
    /// `m.room.topic`
    RoomTopic(TopicContent),
    /// `m.room.avatar`
    RoomAvatar(AvatarContent),
    /// `m.room.canonical_alias`
    RoomCanonicalAlias(CanonicalAliasContent),
    /// `m.room.join_rules`
    RoomJoinRules(JoinRulesContent),
    /// `m.room.history_visibility`
    RoomHistoryVisibility(HistoryVisibilityContent),
    /// `m.room.guest_access`
    RoomGuestAccess(GuestAccessContent),
    /// `m.room.power_levels`
    RoomPowerLevels(PowerLevelsContent),
    /// `m.room.encryption`
    RoomEncryption(EncryptionContent),
    /// `m.room.tombstone`
    RoomTombstone(TombstoneContent),
    /// `m.room.message`
    RoomMessage(MessageContent),
    /// `m.room.encrypted`
    RoomEncrypted(EncryptedContent),
    /// `m.room.redaction`
    RoomRedaction(RedactionContent),
    /// `m.reaction`
    Reaction(ReactionContent),
    /// `m.poll.start`
    PollStart(PollStartContent),
    /// `m.poll.response`
    PollResponse(PollResponseContent),
    /// `m.poll.end`
    PollEnd(PollEndContent),
    /// `m.fully_read`
    FullyRead(FullyReadContent),
    /// `m.tag`
    Tag(TagContent),
    /// `m.direct`
    Direct(DirectContent),
    /// `m.room_key`
    RoomKey(RoomKeyContent),
    /// `m.space.child`
    SpaceChild(SpaceChildContent),
    /// `m.space.parent`
    SpaceParent(SpaceParentContent),
    /// Content of an unknown event type, preserved verbatim.
    Unknown(UnknownContent),
}

impl EventContent {
    /// The event type tag this content decodes under.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::RoomCreate(_) => EventType::RoomCreate,
            Self::RoomMember(_) => EventType::RoomMember,
            Self::RoomName(_) => EventType::RoomName,
            Self::RoomTopic(_) => EventType::RoomTopic,
            Self::RoomAvatar(_) => EventType::RoomAvatar,
            Self::RoomCanonicalAlias(_) => EventType::RoomCanonicalAlias,
            Self::RoomJoinRules(_) => EventType::RoomJoinRules,
            Self::RoomHistoryVisibility(_) => EventType::RoomHistoryVisibility,
            Self::RoomGuestAccess(_) => EventType::RoomGuestAccess,
            Self::RoomPowerLevels(_) => EventType::RoomPowerLevels,
            Self::RoomEncryption(_) => EventType::RoomEncryption,
            Self::RoomTombstone(_) => EventType::RoomTombstone,
            Self::RoomMessage(_) => EventType::RoomMessage,
            Self::RoomEncrypted(_) => EventType::RoomEncrypted,
            Self::RoomRedaction(_) => EventType::RoomRedaction,
            Self::Reaction(_) => EventType::Reaction,
            Self::PollStart(_) => EventType::PollStart,
            Self::PollResponse(_) => EventType::PollResponse,
            Self::PollEnd(_) => EventType::PollEnd,
            Self::FullyRead(_) => EventType::FullyRead,
            Self::Tag(_) => EventType::Tag,
            Self::Direct(_) => EventType::Direct,
            Self::RoomKey(_) => EventType::RoomKey,
            Self::SpaceChild(_) => EventType::SpaceChild,
            Self::SpaceParent(_) => EventType::SpaceParent,
            Self::Unknown(unknown) => EventType::from(unknown.event_type.as_str()),
        }
    }

    /// Encode this content back into its JSON wire form.
    ///
    /// Unknown content round-trips to the exact value it was decoded from.
    pub fn to_value(&self) -> Value {
        match self {
            Self::RoomCreate(c) => serialize_infallible(c),
            Self::RoomMember(c) => serialize_infallible(c),
            Self::RoomName(c) => serialize_infallible(c),
            Self::RoomTopic(c) => serialize_infallible(c),
            Self::RoomAvatar(c) => serialize_infallible(c),
            Self::RoomCanonicalAlias(c) => serialize_infallible(c),
            Self::RoomJoinRules(c) => serialize_infallible(c),
            Self::RoomHistoryVisibility(c) => serialize_infallible(c),
            Self::RoomGuestAccess(c) => serialize_infallible(c),
            Self::RoomPowerLevels(c) => serialize_infallible(c),
            Self::RoomEncryption(c) => serialize_infallible(c),
            Self::RoomTombstone(c) => serialize_infallible(c),
            Self::RoomRedaction(c) => serialize_infallible(c),
            Self::RoomMessage(c) => c.to_value(),
            Self::RoomEncrypted(c) => c.to_value(),
            Self::Reaction(c) => c.to_value(),
            Self::PollStart(c) => serialize_infallible(c),
            Self::PollResponse(c) => c.to_value(),
            Self::PollEnd(c) => c.to_value(),
            Self::FullyRead(c) => serialize_infallible(c),
            Self::Tag(c) => serialize_infallible(c),
            Self::Direct(c) => serialize_infallible(c),
            Self::RoomKey(c) => serialize_infallible(c),
            Self::SpaceChild(c) => serialize_infallible(c),
            Self::SpaceParent(c) => serialize_infallible(c),
            Self::Unknown(unknown) => unknown.raw.clone(),
        }
    }
}

// Envelopes and room snapshots serialize content through its wire form.
impl Serialize for EventContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Content of an event type outside the known subset.
///
/// Preserves the original fields so the event can be re-encoded without loss.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownContent {
    /// The original type tag.
    pub event_type: String,
    /// The original content value, untouched.
    pub raw: Value,
}

fn serialize_infallible<T: Serialize>(content: &T) -> Value {
    let Ok(value) = serde_json::to_value(content) else {
        // All content structs serialize to plain JSON objects with string
        // keys; serde_json cannot fail on them.
        unreachable!("event content serialization is infallible")
    };
    value
}

/// Borrow `value` as an object, or fail for the given event type.
pub(crate) fn as_object<'v>(
    event_type: &EventType,
    value: &'v Value,
) -> Result<&'v Map<String, Value>, DecodeError> {
    value.as_object().ok_or_else(|| DecodeError::NotAnObject { event_type: event_type.clone() })
}

/// Fetch a required string field.
pub(crate) fn req_str<'v>(
    event_type: &EventType,
    obj: &'v Map<String, Value>,
    field: &'static str,
) -> Result<&'v str, DecodeError> {
    match obj.get(field) {
        None | Some(Value::Null) => {
            Err(DecodeError::MissingField { event_type: event_type.clone(), field })
        }
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(DecodeError::InvalidField {
            event_type: event_type.clone(),
            field,
            reason: "expected a string".to_owned(),
        }),
    }
}

/// Fetch an optional string field; wrong types read as absent.
pub(crate) fn opt_str<'v>(obj: &'v Map<String, Value>, field: &str) -> Option<&'v str> {
    obj.get(field).and_then(Value::as_str)
}

/// Decode a content struct with derived `Deserialize`, tolerantly.
pub(crate) fn from_value<T: serde::de::DeserializeOwned>(
    event_type: &EventType,
    value: &Value,
) -> Result<T, DecodeError> {
    serde_json::from_value(value.clone())
        .map_err(|source| DecodeError::Malformed { event_type: event_type.clone(), source })
}
