//! Room configuration state-event contents.
//!
//! Everything here is a plain serde struct decoded tolerantly: optional
//! fields default, unknown fields are ignored, and power levels accept the
//! string-encoded integers some older servers emit.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::event_type::EventType;
use crate::identifiers::{EventId, RoomId, UserId};

/// Content of the `m.room.create` event. One per room, set at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateContent {
    /// Room version the server created the room with.
    #[serde(default = "default_room_version")]
    pub room_version: String,

    /// The room this one replaced, if it was upgraded into existence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predecessor: Option<PreviousRoom>,

    /// Room type (`m.space` for spaces, absent for plain rooms).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,

    /// Whether users on other servers may join. Defaults to `true`.
    #[serde(rename = "m.federate", default = "default_true")]
    pub federate: bool,

    /// Creator of the room (absent from room version 11 onward).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserId>,
}

/// Reference to the room a tombstoned predecessor was upgraded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousRoom {
    /// The predecessor room.
    pub room_id: RoomId,

    /// The tombstone event in the predecessor, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
}

fn default_room_version() -> String {
    "1".to_owned()
}

fn default_true() -> bool {
    true
}

/// Content of `m.room.name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameContent {
    /// The room's display name.
    pub name: String,
}

/// Content of `m.room.topic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicContent {
    /// The room's topic text.
    pub topic: String,
}

/// Content of `m.room.avatar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarContent {
    /// Content URI of the avatar image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Content of `m.room.canonical_alias`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalAliasContent {
    /// The canonical alias, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Additional published aliases.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alt_aliases: Vec<String>,
}

/// Join rule for a room.
///
/// Open on the wire like [`EventType`]: unrecognized rules are preserved
/// verbatim rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JoinRule {
    /// Anyone may join.
    Public,
    /// Users may knock to request an invite.
    Knock,
    /// Only invited users may join.
    Invite,
    /// No one may join.
    Private,
    /// Joinable by members of listed rooms.
    Restricted,
    /// Knock or restricted-join.
    KnockRestricted,
    /// A rule this client does not recognize, preserved verbatim.
    Other(String),
}

impl JoinRule {
    /// The wire representation of this rule.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Public => "public",
            Self::Knock => "knock",
            Self::Invite => "invite",
            Self::Private => "private",
            Self::Restricted => "restricted",
            Self::KnockRestricted => "knock_restricted",
            Self::Other(rule) => rule,
        }
    }
}

impl From<String> for JoinRule {
    fn from(rule: String) -> Self {
        match rule.as_str() {
            "public" => Self::Public,
            "knock" => Self::Knock,
            "invite" => Self::Invite,
            "private" => Self::Private,
            "restricted" => Self::Restricted,
            "knock_restricted" => Self::KnockRestricted,
            _ => Self::Other(rule),
        }
    }
}

impl From<JoinRule> for String {
    fn from(rule: JoinRule) -> Self {
        match rule {
            JoinRule::Other(rule) => rule,
            known => known.as_str().to_owned(),
        }
    }
}

/// Content of `m.room.join_rules`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRulesContent {
    /// The active join rule.
    pub join_rule: JoinRule,
}

/// Content of `m.room.history_visibility`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryVisibilityContent {
    /// Visibility rule string (`shared`, `invited`, `joined`, `world_readable`).
    pub history_visibility: String,
}

/// Content of `m.room.guest_access`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestAccessContent {
    /// Guest access rule string (`can_join` or `forbidden`).
    pub guest_access: String,
}

/// A power-level integer.
///
/// Deserializes from either a JSON number or a decimal string; some servers
/// emit stringified levels in old rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PowerLevel(pub i64);

impl Serialize for PowerLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for PowerLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LevelVisitor;

        impl Visitor<'_> for LevelVisitor {
            type Value = PowerLevel;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer or a decimal string")
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(PowerLevel(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                i64::try_from(v)
                    .map(PowerLevel)
                    .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.trim()
                    .parse::<i64>()
                    .map(PowerLevel)
                    .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(LevelVisitor)
    }
}

impl From<i64> for PowerLevel {
    fn from(level: i64) -> Self {
        Self(level)
    }
}

fn level_zero() -> PowerLevel {
    PowerLevel(0)
}

fn level_fifty() -> PowerLevel {
    PowerLevel(50)
}

/// Content of `m.room.power_levels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerLevelsContent {
    /// Per-user levels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub users: BTreeMap<UserId, PowerLevel>,

    /// Default level for users not listed in `users`.
    #[serde(default = "level_zero")]
    pub users_default: PowerLevel,

    /// Required level to send specific event types.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: BTreeMap<EventType, PowerLevel>,

    /// Default level required to send message events.
    #[serde(default = "level_zero")]
    pub events_default: PowerLevel,

    /// Default level required to send state events.
    #[serde(default = "level_fifty")]
    pub state_default: PowerLevel,

    /// Level required to ban.
    #[serde(default = "level_fifty")]
    pub ban: PowerLevel,

    /// Level required to kick.
    #[serde(default = "level_fifty")]
    pub kick: PowerLevel,

    /// Level required to redact others' events.
    #[serde(default = "level_fifty")]
    pub redact: PowerLevel,

    /// Level required to invite.
    #[serde(default = "level_zero")]
    pub invite: PowerLevel,
}

impl PowerLevelsContent {
    /// The effective level of a user under this content.
    pub fn user_level(&self, user: &UserId) -> PowerLevel {
        self.users.get(user).copied().unwrap_or(self.users_default)
    }
}

impl Default for PowerLevelsContent {
    fn default() -> Self {
        Self {
            users: BTreeMap::new(),
            users_default: level_zero(),
            events: BTreeMap::new(),
            events_default: level_zero(),
            state_default: level_fifty(),
            ban: level_fifty(),
            kick: level_fifty(),
            redact: level_fifty(),
            invite: level_zero(),
        }
    }
}

/// Content of `m.room.encryption`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionContent {
    /// Encryption algorithm for message payloads in this room.
    pub algorithm: String,

    /// Session rotation period in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_period_ms: Option<u64>,

    /// Session rotation period in message count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_period_msgs: Option<u64>,
}

/// Content of `m.room.tombstone`, marking a room replaced by a successor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TombstoneContent {
    /// Server-suggested message to show for the dead room.
    #[serde(default)]
    pub body: String,

    /// The room that replaces this one.
    pub replacement_room: RoomId,
}

/// Content of `m.room.redaction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionContent {
    /// The redacted event (in-content from room version 11).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacts: Option<EventId>,

    /// Optional reason for the redaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_defaults_apply() {
        let content: CreateContent = serde_json::from_value(json!({})).unwrap();
        assert_eq!(content.room_version, "1");
        assert!(content.federate);
        assert!(content.predecessor.is_none());
    }

    #[test]
    fn create_with_predecessor() {
        let content: CreateContent = serde_json::from_value(json!({
            "room_version": "9",
            "predecessor": {"room_id": "!old:x.org", "event_id": "$tomb"},
        }))
        .unwrap();
        assert_eq!(content.room_version, "9");
        let prev = content.predecessor.unwrap();
        assert_eq!(prev.room_id.as_str(), "!old:x.org");
    }

    #[test]
    fn power_levels_accept_stringified_integers() {
        let content: PowerLevelsContent = serde_json::from_value(json!({
            "users": {"@a:x.org": "100", "@b:x.org": 50},
            "state_default": "50",
        }))
        .unwrap();
        let alice = UserId::new("@a:x.org").unwrap();
        assert_eq!(content.user_level(&alice), PowerLevel(100));
        assert_eq!(content.state_default, PowerLevel(50));
    }

    #[test]
    fn power_levels_default_for_unlisted_user() {
        let content = PowerLevelsContent::default();
        let user = UserId::new("@nobody:x.org").unwrap();
        assert_eq!(content.user_level(&user), PowerLevel(0));
    }

    #[test]
    fn join_rule_unknown_variant_survives() {
        let content: JoinRulesContent =
            serde_json::from_value(json!({"join_rule": "org.example.secret"})).unwrap();
        assert_eq!(content.join_rule, JoinRule::Other("org.example.secret".to_owned()));
        assert_eq!(serde_json::to_value(&content).unwrap(), json!({"join_rule": "org.example.secret"}));
    }
}
