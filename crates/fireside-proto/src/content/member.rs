//! `m.room.member` content.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The five membership states a user can hold in a room.
///
/// A user occupies at most one state per room at any time; the room state
/// machine enforces that every transition moves the user atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    /// Full participant in the room.
    Join,
    /// Invited but not yet joined.
    Invite,
    /// Left voluntarily or was kicked.
    Leave,
    /// Banned; cannot rejoin until unbanned.
    Ban,
    /// Knocking, awaiting an invite.
    Knock,
}

impl Membership {
    /// The wire representation of this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Invite => "invite",
            Self::Leave => "leave",
            Self::Ban => "ban",
            Self::Knock => "knock",
        }
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of an `m.room.member` state event.
///
/// The state key of the enclosing envelope names the affected user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberContent {
    /// The new membership state.
    pub membership: Membership,

    /// Display name to show for the user in this room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,

    /// Avatar URL for the user in this room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Optional human-readable reason for the change (kick, ban, knock).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Set on invites that establish a direct chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_direct: Option<bool>,
}

impl MemberContent {
    /// A minimal content for the given membership state.
    pub fn new(membership: Membership) -> Self {
        Self { membership, displayname: None, avatar_url: None, reason: None, is_direct: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_strings_round_trip() {
        for m in [
            Membership::Join,
            Membership::Invite,
            Membership::Leave,
            Membership::Ban,
            Membership::Knock,
        ] {
            let json = serde_json::to_string(&m).unwrap();
            let back: Membership = serde_json::from_str(&json).unwrap();
            assert_eq!(m, back);
        }
    }

    #[test]
    fn decode_tolerates_extra_fields() {
        let content: MemberContent = serde_json::from_value(serde_json::json!({
            "membership": "join",
            "displayname": "Alice",
            "org.example.extension": {"nested": true},
        }))
        .unwrap();
        assert_eq!(content.membership, Membership::Join);
        assert_eq!(content.displayname.as_deref(), Some("Alice"));
    }

    #[test]
    fn decode_requires_membership() {
        let err: Result<MemberContent, _> =
            serde_json::from_value(serde_json::json!({"displayname": "Alice"}));
        assert!(err.is_err());
    }
}
