//! Open event-type tag.
//!
//! Event types are open strings on the wire. A closed subset is known to the
//! content registry; everything else is carried verbatim in [`EventType::Other`]
//! so unknown events survive a decode/encode round trip.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Event type tag. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// `m.room.create`
    RoomCreate,
    /// `m.room.member`
    RoomMember,
    /// `m.room.name`
    RoomName,
    /// `m.room.topic`
    RoomTopic,
    /// `m.room.avatar`
    RoomAvatar,
    /// `m.room.canonical_alias`
    RoomCanonicalAlias,
    /// `m.room.join_rules`
    RoomJoinRules,
    /// `m.room.history_visibility`
    RoomHistoryVisibility,
    /// `m.room.guest_access`
    RoomGuestAccess,
    /// `m.room.power_levels`
    RoomPowerLevels,
    /// `m.room.encryption`
    RoomEncryption,
    /// `m.room.tombstone`
    RoomTombstone,
    /// `m.room.message`
    RoomMessage,
    /// `m.room.encrypted`
    RoomEncrypted,
    /// `m.room.redaction`
    RoomRedaction,
    /// `m.reaction`
    Reaction,
    /// `m.poll.start`
    PollStart,
    /// `m.poll.response`
    PollResponse,
    /// `m.poll.end`
    PollEnd,
    /// `m.fully_read`
    FullyRead,
    /// `m.tag`
    Tag,
    /// `m.direct`
    Direct,
    /// `m.room_key`
    RoomKey,
    /// `m.space.child`
    SpaceChild,
    /// `m.space.parent`
    SpaceParent,
    /// Any tag outside the known subset, preserved verbatim.
    Other(String),
}

impl EventType {
    /// The wire representation of this tag.
    pub fn as_str(&self) -> &str {
        match self {
            Self::RoomCreate => "m.room.create",
            Self::RoomMember => "m.room.member",
            Self::RoomName => "m.room.name",
            Self::RoomTopic => "m.room.topic",
            Self::RoomAvatar => "m.room.avatar",
            Self::RoomCanonicalAlias => "m.room.canonical_alias",
            Self::RoomJoinRules => "m.room.join_rules",
            Self::RoomHistoryVisibility => "m.room.history_visibility",
            Self::RoomGuestAccess => "m.room.guest_access",
            Self::RoomPowerLevels => "m.room.power_levels",
            Self::RoomEncryption => "m.room.encryption",
            Self::RoomTombstone => "m.room.tombstone",
            Self::RoomMessage => "m.room.message",
            Self::RoomEncrypted => "m.room.encrypted",
            Self::RoomRedaction => "m.room.redaction",
            Self::Reaction => "m.reaction",
            Self::PollStart => "m.poll.start",
            Self::PollResponse => "m.poll.response",
            Self::PollEnd => "m.poll.end",
            Self::FullyRead => "m.fully_read",
            Self::Tag => "m.tag",
            Self::Direct => "m.direct",
            Self::RoomKey => "m.room_key",
            Self::SpaceChild => "m.space.child",
            Self::SpaceParent => "m.space.parent",
            Self::Other(tag) => tag,
        }
    }

    /// Whether this tag is in the known subset mapped by the registry.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for EventType {
    fn from(tag: &str) -> Self {
        match tag {
            "m.room.create" => Self::RoomCreate,
            "m.room.member" => Self::RoomMember,
            "m.room.name" => Self::RoomName,
            "m.room.topic" => Self::RoomTopic,
            "m.room.avatar" => Self::RoomAvatar,
            "m.room.canonical_alias" => Self::RoomCanonicalAlias,
            "m.room.join_rules" => Self::RoomJoinRules,
            "m.room.history_visibility" => Self::RoomHistoryVisibility,
            "m.room.guest_access" => Self::RoomGuestAccess,
            "m.room.power_levels" => Self::RoomPowerLevels,
            "m.room.encryption" => Self::RoomEncryption,
            "m.room.tombstone" => Self::RoomTombstone,
            "m.room.message" => Self::RoomMessage,
            "m.room.encrypted" => Self::RoomEncrypted,
            "m.room.redaction" => Self::RoomRedaction,
            "m.reaction" => Self::Reaction,
            "m.poll.start" => Self::PollStart,
            "m.poll.response" => Self::PollResponse,
            "m.poll.end" => Self::PollEnd,
            "m.fully_read" => Self::FullyRead,
            "m.tag" => Self::Tag,
            "m.direct" => Self::Direct,
            "m.room_key" => Self::RoomKey,
            "m.space.child" => Self::SpaceChild,
            "m.space.parent" => Self::SpaceParent,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for EventType {
    fn from(tag: String) -> Self {
        match Self::from(tag.as_str()) {
            // Reuse the allocation for unknown tags.
            Self::Other(_) => Self::Other(tag),
            known => known,
        }
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Other(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
