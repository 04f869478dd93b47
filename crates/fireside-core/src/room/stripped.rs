//! Invitation-preview room built from stripped state.
//!
//! A [`StrippedStateRoom`] is created once from the stripped-state batch of
//! an invite and is read-only afterwards: every derived field is computed on
//! read from the one-shot state table, never cached, because the preview is
//! never incrementally updated. It is discarded when the invite resolves.

use std::collections::{BTreeMap, HashMap};

use fireside_proto::content::{EventContent, JoinRule, Membership};
use fireside_proto::{EventType, RoomId, StrippedStateEvent, UserId};

use crate::error::RoomError;

/// Read-only preview of a room the user has been invited to.
#[derive(Debug, Clone)]
pub struct StrippedStateRoom {
    room_id: RoomId,
    state: HashMap<(EventType, String), StrippedStateEvent>,
}

impl StrippedStateRoom {
    /// Build a preview from an invite's stripped-state batch.
    ///
    /// Like the joined form, a preview without an `m.room.create` event is a
    /// construction failure. Within the batch, the last event per
    /// `(type, state_key)` slot wins.
    pub fn new(room_id: RoomId, events: Vec<StrippedStateEvent>) -> Result<Self, RoomError> {
        let mut state = HashMap::new();
        for event in events {
            state.insert((event.event_type.clone(), event.state_key.clone()), event);
        }
        let room = Self { room_id, state };
        if room.create_content().is_none() {
            return Err(RoomError::MissingCreateEvent { room_id: room.room_id });
        }
        Ok(room)
    }

    fn content_of(&self, event_type: &EventType, state_key: &str) -> Option<&EventContent> {
        self.state
            .get(&(event_type.clone(), state_key.to_owned()))
            .map(|event| &event.content)
    }

    fn create_content(&self) -> Option<&fireside_proto::content::CreateContent> {
        match self.content_of(&EventType::RoomCreate, "") {
            Some(EventContent::RoomCreate(create)) => Some(create),
            _ => None,
        }
    }

    /// The room's identifier.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// The room display name, when the preview carries one.
    pub fn name(&self) -> Option<&str> {
        match self.content_of(&EventType::RoomName, "") {
            Some(EventContent::RoomName(content)) => Some(&content.name),
            _ => None,
        }
    }

    /// The room topic, when the preview carries one.
    pub fn topic(&self) -> Option<&str> {
        match self.content_of(&EventType::RoomTopic, "") {
            Some(EventContent::RoomTopic(content)) => Some(&content.topic),
            _ => None,
        }
    }

    /// The room avatar URL, when the preview carries one.
    pub fn avatar_url(&self) -> Option<&str> {
        match self.content_of(&EventType::RoomAvatar, "") {
            Some(EventContent::RoomAvatar(content)) => content.url.as_deref(),
            _ => None,
        }
    }

    /// The room type from the create event (`m.space` for spaces).
    pub fn room_type(&self) -> Option<&str> {
        self.create_content().and_then(|create| create.room_type.as_deref())
    }

    /// Whether the previewed room is a space.
    pub fn is_space(&self) -> bool {
        self.room_type() == Some("m.space")
    }

    /// Whether the previewed room has encryption enabled.
    pub fn is_encrypted(&self) -> bool {
        matches!(
            self.content_of(&EventType::RoomEncryption, ""),
            Some(EventContent::RoomEncryption(_))
        )
    }

    /// The join rule, when the preview carries one.
    pub fn join_rule(&self) -> Option<&JoinRule> {
        match self.content_of(&EventType::RoomJoinRules, "") {
            Some(EventContent::RoomJoinRules(content)) => Some(&content.join_rule),
            _ => None,
        }
    }

    /// Memberships visible in the preview, keyed by user.
    pub fn members(&self) -> BTreeMap<UserId, Membership> {
        self.state
            .iter()
            .filter_map(|((event_type, state_key), event)| {
                if *event_type != EventType::RoomMember {
                    return None;
                }
                let EventContent::RoomMember(content) = &event.content else {
                    return None;
                };
                let user = UserId::new(state_key.as_str()).ok()?;
                Some((user, content.membership))
            })
            .collect()
    }

    /// Number of members visible in the preview.
    pub fn member_count(&self) -> usize {
        self.members().len()
    }

    /// The membership the preview shows for a user, if any.
    pub fn membership_of(&self, user: &UserId) -> Option<Membership> {
        match self.content_of(&EventType::RoomMember, user.as_str()) {
            Some(EventContent::RoomMember(content)) => Some(content.membership),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fireside_proto::ContentRegistry;
    use serde_json::json;

    fn stripped(events: Vec<serde_json::Value>) -> Result<StrippedStateRoom, RoomError> {
        let registry = ContentRegistry::new();
        let events = events
            .into_iter()
            .map(|v| StrippedStateEvent::from_value(&registry, v).unwrap())
            .collect();
        StrippedStateRoom::new(RoomId::new("!invite:x.org").unwrap(), events)
    }

    fn create() -> serde_json::Value {
        json!({
            "sender": "@a:x.org",
            "type": "m.room.create",
            "state_key": "",
            "content": {"room_version": "10", "type": "m.space"},
        })
    }

    #[test]
    fn preview_requires_create_event() {
        let err = stripped(vec![json!({
            "sender": "@a:x.org",
            "type": "m.room.name",
            "state_key": "",
            "content": {"name": "No create"},
        })]);
        assert!(matches!(err, Err(RoomError::MissingCreateEvent { .. })));
    }

    #[test]
    fn derived_fields_are_computed_on_read() {
        let room = stripped(vec![
            create(),
            json!({
                "sender": "@a:x.org",
                "type": "m.room.name",
                "state_key": "",
                "content": {"name": "Garden"},
            }),
            json!({
                "sender": "@a:x.org",
                "type": "m.room.encryption",
                "state_key": "",
                "content": {"algorithm": "m.megolm.v1.aes-sha2"},
            }),
            json!({
                "sender": "@a:x.org",
                "type": "m.room.member",
                "state_key": "@b:x.org",
                "content": {"membership": "invite"},
            }),
        ])
        .unwrap();

        assert_eq!(room.name(), Some("Garden"));
        assert!(room.is_encrypted());
        assert!(room.is_space());
        assert_eq!(room.member_count(), 1);
        let bob = UserId::new("@b:x.org").unwrap();
        assert_eq!(room.membership_of(&bob), Some(Membership::Invite));
    }

    #[test]
    fn last_event_per_slot_wins_within_batch() {
        let room = stripped(vec![
            create(),
            json!({
                "sender": "@a:x.org",
                "type": "m.room.name",
                "state_key": "",
                "content": {"name": "First"},
            }),
            json!({
                "sender": "@a:x.org",
                "type": "m.room.name",
                "state_key": "",
                "content": {"name": "Second"},
            }),
        ])
        .unwrap();
        assert_eq!(room.name(), Some("Second"));
    }
}
