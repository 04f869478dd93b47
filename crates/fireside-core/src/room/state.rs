//! Joined-room state machine.
//!
//! [`RoomState`] folds an ordered batch of state events into a queryable
//! snapshot. The fold is pure data manipulation: no I/O, no clocks. Batches
//! are assumed to arrive in server order, so the merge rule is
//! last-applied-wins per `(type, state_key)` slot.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::{Map, Value, json};
use tracing::{debug, trace};

use fireside_proto::content::{
    EncryptionContent, EventContent, JoinRule, Membership, PowerLevelsContent,
};
use fireside_proto::{ContentRegistry, EventId, EventType, RoomId, SyncRoomEvent, UserId};

use crate::error::RoomError;

/// A projected field that changed during a state or timeline fold.
///
/// Callers subscribe to changes by inspecting the returned set instead of
/// observing mutations; the engine has no reactive layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoomField {
    /// The room display name.
    Name,
    /// The room topic.
    Topic,
    /// The room avatar URL.
    AvatarUrl,
    /// The encryption parameters.
    Encryption,
    /// The tombstone / successor pointer.
    Tombstone,
    /// Any of the five membership sets.
    Members,
    /// The power-levels table.
    PowerLevels,
    /// The join rule.
    JoinRules,
    /// The message timeline.
    Timeline,
    /// Per-room account data.
    AccountData,
}

/// The tombstone marking a room as replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Tombstone {
    /// The tombstone event itself.
    pub event_id: EventId,
    /// The successor room.
    pub successor: RoomId,
    /// Server-suggested message for the dead room.
    pub body: String,
}

/// Authoritative per-room projection for a joined room.
///
/// # Invariants
///
/// - `room_id`, `version`, and `predecessor` are fixed at construction.
/// - The five membership sets are pairwise disjoint; every membership event
///   moves its user atomically between sets.
/// - The `(type, state_key)` index always holds the most recently applied
///   event per slot, regardless of how batches were split.
/// - `messages` is deduplicated by event id; replays are no-ops.
#[derive(Debug, Clone)]
pub struct RoomState {
    room_id: RoomId,
    version: String,
    predecessor: Option<RoomId>,
    room_type: Option<String>,

    name: Option<String>,
    topic: Option<String>,
    avatar_url: Option<String>,
    encryption: Option<EncryptionContent>,
    tombstone: Option<Tombstone>,
    join_rule: Option<JoinRule>,
    power_levels: Option<PowerLevelsContent>,

    joined: BTreeSet<UserId>,
    invited: BTreeSet<UserId>,
    left: BTreeSet<UserId>,
    banned: BTreeSet<UserId>,
    knocking: BTreeSet<UserId>,

    messages: BTreeMap<EventId, SyncRoomEvent>,
    state_index: HashMap<(EventType, String), SyncRoomEvent>,
    account_data: BTreeMap<EventType, EventContent>,
}

impl RoomState {
    /// Build a room from its initial state batch.
    ///
    /// # Errors
    ///
    /// [`RoomError::MissingCreateEvent`] when the batch carries no
    /// `m.room.create` event; a room cannot be constructed without one.
    pub fn from_initial_state(
        room_id: RoomId,
        events: Vec<SyncRoomEvent>,
    ) -> Result<Self, RoomError> {
        let create = events
            .iter()
            .filter(|event| event.is_state())
            .find_map(|event| match &event.content {
                EventContent::RoomCreate(create) => Some(create.clone()),
                _ => None,
            })
            .ok_or_else(|| RoomError::MissingCreateEvent { room_id: room_id.clone() })?;

        let mut room = Self {
            room_id,
            version: create.room_version,
            predecessor: create.predecessor.map(|prev| prev.room_id),
            room_type: create.room_type,
            name: None,
            topic: None,
            avatar_url: None,
            encryption: None,
            tombstone: None,
            join_rule: None,
            power_levels: None,
            joined: BTreeSet::new(),
            invited: BTreeSet::new(),
            left: BTreeSet::new(),
            banned: BTreeSet::new(),
            knocking: BTreeSet::new(),
            messages: BTreeMap::new(),
            state_index: HashMap::new(),
            account_data: BTreeMap::new(),
        };
        room.update_state(events);
        Ok(room)
    }

    /// Fold a batch of state events into the room.
    ///
    /// Later events in the batch win over earlier ones for the same
    /// `(type, state_key)` slot, and the whole batch wins over whatever the
    /// index already held. Events of unrecognized type are stored in the
    /// index but affect no projected field. Non-state events are skipped.
    ///
    /// Returns the set of projected fields that changed.
    pub fn update_state<I>(&mut self, events: I) -> BTreeSet<RoomField>
    where
        I: IntoIterator<Item = SyncRoomEvent>,
    {
        let mut changed = BTreeSet::new();
        for event in events {
            let Some(state_key) = event.state_key.clone() else {
                debug!(room = %self.room_id, event = %event.event_id, "skipping non-state event in state batch");
                continue;
            };
            self.project(&event, &state_key, &mut changed);
            self.state_index.insert((event.event_type.clone(), state_key), event);
        }
        changed
    }

    /// Insert new timeline events, deduplicating by event id.
    ///
    /// State events encountered in the timeline also fold into the state
    /// index; non-state events accumulate in the message set. Re-applying an
    /// already-seen event is a no-op.
    pub fn update_timeline<I>(&mut self, events: I) -> BTreeSet<RoomField>
    where
        I: IntoIterator<Item = SyncRoomEvent>,
    {
        let mut changed = BTreeSet::new();
        for event in events {
            if event.is_state() {
                changed.append(&mut self.update_state([event]));
                continue;
            }
            if self.messages.contains_key(&event.event_id) {
                trace!(room = %self.room_id, event = %event.event_id, "duplicate timeline event");
                continue;
            }
            self.messages.insert(event.event_id.clone(), event);
            changed.insert(RoomField::Timeline);
        }
        changed
    }

    /// Replace per-room account data entries.
    pub fn apply_account_data<I>(&mut self, entries: I) -> BTreeSet<RoomField>
    where
        I: IntoIterator<Item = (EventType, EventContent)>,
    {
        let mut changed = BTreeSet::new();
        for (event_type, content) in entries {
            self.account_data.insert(event_type, content);
            changed.insert(RoomField::AccountData);
        }
        changed
    }

    fn project(&mut self, event: &SyncRoomEvent, state_key: &str, changed: &mut BTreeSet<RoomField>) {
        match &event.content {
            EventContent::RoomName(content) => {
                let name = Some(content.name.clone());
                if self.name != name {
                    self.name = name;
                    changed.insert(RoomField::Name);
                }
            }
            EventContent::RoomTopic(content) => {
                let topic = Some(content.topic.clone());
                if self.topic != topic {
                    self.topic = topic;
                    changed.insert(RoomField::Topic);
                }
            }
            EventContent::RoomAvatar(content) => {
                if self.avatar_url != content.url {
                    self.avatar_url.clone_from(&content.url);
                    changed.insert(RoomField::AvatarUrl);
                }
            }
            EventContent::RoomEncryption(content) => {
                let encryption = Some(content.clone());
                if self.encryption != encryption {
                    self.encryption = encryption;
                    changed.insert(RoomField::Encryption);
                }
            }
            EventContent::RoomTombstone(content) => {
                let tombstone = Some(Tombstone {
                    event_id: event.event_id.clone(),
                    successor: content.replacement_room.clone(),
                    body: content.body.clone(),
                });
                if self.tombstone != tombstone {
                    self.tombstone = tombstone;
                    changed.insert(RoomField::Tombstone);
                }
            }
            EventContent::RoomJoinRules(content) => {
                let rule = Some(content.join_rule.clone());
                if self.join_rule != rule {
                    self.join_rule = rule;
                    changed.insert(RoomField::JoinRules);
                }
            }
            EventContent::RoomPowerLevels(content) => {
                let levels = Some(content.clone());
                if self.power_levels != levels {
                    self.power_levels = levels;
                    changed.insert(RoomField::PowerLevels);
                }
            }
            EventContent::RoomMember(content) => match UserId::new(state_key) {
                Ok(user) => {
                    if self.transition_membership(&user, content.membership) {
                        changed.insert(RoomField::Members);
                    }
                }
                Err(err) => {
                    debug!(room = %self.room_id, %err, "member event with invalid state key");
                }
            },
            // The create event pins version and predecessor at construction;
            // later creates only land in the index.
            _ => {}
        }
    }

    /// Move a user to a new membership set.
    ///
    /// Exhaustive over the five states on both sides; the user ends up in
    /// exactly one set regardless of where it started. Returns whether any
    /// set actually changed.
    fn transition_membership(&mut self, user: &UserId, new: Membership) -> bool {
        let old = self.membership_of(user);
        if old == Some(new) {
            return false;
        }
        trace!(
            room = %self.room_id,
            %user,
            old = old.map_or("none", Membership::as_str),
            new = new.as_str(),
            "membership transition",
        );

        self.joined.remove(user);
        self.invited.remove(user);
        self.left.remove(user);
        self.banned.remove(user);
        self.knocking.remove(user);

        let target = match new {
            Membership::Join => &mut self.joined,
            Membership::Invite => &mut self.invited,
            Membership::Leave => &mut self.left,
            Membership::Ban => &mut self.banned,
            Membership::Knock => &mut self.knocking,
        };
        target.insert(user.clone());
        true
    }

    /// The room's identifier.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// The room version from the create event.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The predecessor room, when this room was created by an upgrade.
    pub fn predecessor(&self) -> Option<&RoomId> {
        self.predecessor.as_ref()
    }

    /// The room type from the create event (`m.space` for spaces).
    pub fn room_type(&self) -> Option<&str> {
        self.room_type.as_deref()
    }

    /// Whether this room is a space.
    pub fn is_space(&self) -> bool {
        self.room_type() == Some("m.space")
    }

    /// The current display name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The current topic.
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// The current avatar URL.
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    /// The encryption parameters, when the room is encrypted.
    pub fn encryption(&self) -> Option<&EncryptionContent> {
        self.encryption.as_ref()
    }

    /// Whether the room has encryption enabled.
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    /// The tombstone, when the room has been replaced.
    pub fn tombstone(&self) -> Option<&Tombstone> {
        self.tombstone.as_ref()
    }

    /// The successor room id, when the room has been replaced.
    pub fn successor(&self) -> Option<&RoomId> {
        self.tombstone.as_ref().map(|t| &t.successor)
    }

    /// The current join rule.
    pub fn join_rule(&self) -> Option<&JoinRule> {
        self.join_rule.as_ref()
    }

    /// The current power-levels table.
    pub fn power_levels(&self) -> Option<&PowerLevelsContent> {
        self.power_levels.as_ref()
    }

    /// Users currently joined.
    pub fn joined_members(&self) -> &BTreeSet<UserId> {
        &self.joined
    }

    /// Users currently invited.
    pub fn invited_members(&self) -> &BTreeSet<UserId> {
        &self.invited
    }

    /// Users who left or were kicked.
    pub fn left_members(&self) -> &BTreeSet<UserId> {
        &self.left
    }

    /// Users currently banned.
    pub fn banned_members(&self) -> &BTreeSet<UserId> {
        &self.banned
    }

    /// Users currently knocking.
    pub fn knocking_members(&self) -> &BTreeSet<UserId> {
        &self.knocking
    }

    /// The membership set a user currently occupies, if any.
    pub fn membership_of(&self, user: &UserId) -> Option<Membership> {
        if self.joined.contains(user) {
            Some(Membership::Join)
        } else if self.invited.contains(user) {
            Some(Membership::Invite)
        } else if self.left.contains(user) {
            Some(Membership::Leave)
        } else if self.banned.contains(user) {
            Some(Membership::Ban)
        } else if self.knocking.contains(user) {
            Some(Membership::Knock)
        } else {
            None
        }
    }

    /// The latest state event for a `(type, state_key)` slot.
    pub fn state_event(&self, event_type: &EventType, state_key: &str) -> Option<&SyncRoomEvent> {
        self.state_index.get(&(event_type.clone(), state_key.to_owned()))
    }

    /// Number of state slots currently indexed.
    pub fn state_len(&self) -> usize {
        self.state_index.len()
    }

    /// Timeline messages in event-id order.
    pub fn messages(&self) -> impl Iterator<Item = &SyncRoomEvent> {
        self.messages.values()
    }

    /// Number of timeline messages.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Per-room account data content for a type, if present.
    pub fn account_data(&self, event_type: &EventType) -> Option<&EventContent> {
        self.account_data.get(event_type)
    }

    /// Serialize the room to a snapshot value for the persistence store.
    ///
    /// The snapshot carries the room and its messages together so both are
    /// saved in one store entry.
    pub fn snapshot(&self) -> Value {
        let state: Vec<Value> = self.state_index.values().map(SyncRoomEvent::to_value).collect();
        let timeline: Vec<Value> = self.messages.values().map(SyncRoomEvent::to_value).collect();
        let account_data: Vec<Value> = self
            .account_data
            .iter()
            .map(|(event_type, content)| {
                json!({"type": event_type, "content": content.to_value()})
            })
            .collect();
        json!({
            "room_id": self.room_id,
            "state": state,
            "timeline": timeline,
            "account_data": account_data,
        })
    }

    /// Rebuild a room from a snapshot produced by [`snapshot`](Self::snapshot).
    ///
    /// Decoding happens through the given registry; no global decoding
    /// context is consulted.
    pub fn from_snapshot(registry: &ContentRegistry, value: &Value) -> Result<Self, RoomError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RoomError::MalformedSnapshot { reason: "not an object".to_owned() })?;
        let room_id = obj
            .get("room_id")
            .and_then(Value::as_str)
            .ok_or_else(|| RoomError::MalformedSnapshot { reason: "missing room_id".to_owned() })
            .and_then(|raw| {
                RoomId::new(raw).map_err(|err| RoomError::MalformedSnapshot {
                    reason: err.to_string(),
                })
            })?;

        let state = decode_events(registry, obj, "state")?;
        let timeline = decode_events(registry, obj, "timeline")?;

        let mut room = Self::from_initial_state(room_id, state)?;
        room.update_timeline(timeline);

        if let Some(entries) = obj.get("account_data").and_then(Value::as_array) {
            let mut decoded = Vec::with_capacity(entries.len());
            for entry in entries {
                let event_type = entry
                    .get("type")
                    .and_then(Value::as_str)
                    .map(EventType::from)
                    .ok_or_else(|| RoomError::MalformedSnapshot {
                        reason: "account data entry missing type".to_owned(),
                    })?;
                let content = entry.get("content").unwrap_or(&Value::Null);
                decoded.push((event_type.clone(), registry.decode(&event_type, content)?));
            }
            room.apply_account_data(decoded);
        }
        Ok(room)
    }
}

fn decode_events(
    registry: &ContentRegistry,
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Vec<SyncRoomEvent>, RoomError> {
    let Some(entries) = obj.get(field).and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    entries
        .iter()
        .map(|entry| SyncRoomEvent::from_value(registry, entry.clone()).map_err(RoomError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> ContentRegistry {
        ContentRegistry::new()
    }

    fn event(value: Value) -> SyncRoomEvent {
        SyncRoomEvent::from_value(&registry(), value).unwrap()
    }

    fn create_event(version: &str) -> SyncRoomEvent {
        event(json!({
            "event_id": "$create",
            "sender": "@a:x.org",
            "type": "m.room.create",
            "origin_server_ts": 1,
            "state_key": "",
            "content": {"room_version": version},
        }))
    }

    fn member_event(id: &str, user: &str, membership: &str) -> SyncRoomEvent {
        event(json!({
            "event_id": id,
            "sender": user,
            "type": "m.room.member",
            "origin_server_ts": 2,
            "state_key": user,
            "content": {"membership": membership},
        }))
    }

    fn room_id() -> RoomId {
        RoomId::new("!room:x.org").unwrap()
    }

    #[test]
    fn construction_requires_create_event() {
        let err = RoomState::from_initial_state(
            room_id(),
            vec![member_event("$m1", "@a:x.org", "join")],
        );
        assert!(matches!(err, Err(RoomError::MissingCreateEvent { .. })));
    }

    #[test]
    fn create_then_join_then_leave() {
        let mut room = RoomState::from_initial_state(
            room_id(),
            vec![create_event("9"), member_event("$m1", "@a:x.org", "join")],
        )
        .unwrap();
        let alice = UserId::new("@a:x.org").unwrap();

        assert_eq!(room.version(), "9");
        assert!(room.joined_members().contains(&alice));
        assert_eq!(room.membership_of(&alice), Some(Membership::Join));

        let changed = room.update_state(vec![member_event("$m2", "@a:x.org", "leave")]);
        assert!(changed.contains(&RoomField::Members));
        assert!(room.joined_members().is_empty());
        assert!(room.left_members().contains(&alice));
    }

    #[test]
    fn later_event_in_batch_wins() {
        let room = RoomState::from_initial_state(
            room_id(),
            vec![
                create_event("9"),
                member_event("$m1", "@a:x.org", "join"),
                member_event("$m2", "@a:x.org", "leave"),
            ],
        )
        .unwrap();
        let alice = UserId::new("@a:x.org").unwrap();
        assert_eq!(room.membership_of(&alice), Some(Membership::Leave));

        let indexed = room.state_event(&EventType::RoomMember, "@a:x.org").unwrap();
        assert_eq!(indexed.event_id.as_str(), "$m2");
    }

    #[test]
    fn name_and_topic_projection() {
        let mut room =
            RoomState::from_initial_state(room_id(), vec![create_event("10")]).unwrap();
        let changed = room.update_state(vec![
            event(json!({
                "event_id": "$n1",
                "sender": "@a:x.org",
                "type": "m.room.name",
                "origin_server_ts": 3,
                "state_key": "",
                "content": {"name": "Ops"},
            })),
            event(json!({
                "event_id": "$t1",
                "sender": "@a:x.org",
                "type": "m.room.topic",
                "origin_server_ts": 4,
                "state_key": "",
                "content": {"topic": "On fire"},
            })),
        ]);
        assert!(changed.contains(&RoomField::Name));
        assert!(changed.contains(&RoomField::Topic));
        assert_eq!(room.name(), Some("Ops"));
        assert_eq!(room.topic(), Some("On fire"));
    }

    #[test]
    fn reapplying_same_state_reports_no_change() {
        let mut room =
            RoomState::from_initial_state(room_id(), vec![create_event("10")]).unwrap();
        let name = event(json!({
            "event_id": "$n1",
            "sender": "@a:x.org",
            "type": "m.room.name",
            "origin_server_ts": 3,
            "state_key": "",
            "content": {"name": "Ops"},
        }));
        assert!(!room.update_state(vec![name.clone()]).is_empty());
        assert!(room.update_state(vec![name]).is_empty());
    }

    #[test]
    fn unknown_state_type_is_indexed_but_projects_nothing() {
        let mut room =
            RoomState::from_initial_state(room_id(), vec![create_event("10")]).unwrap();
        let changed = room.update_state(vec![event(json!({
            "event_id": "$u1",
            "sender": "@a:x.org",
            "type": "org.example.mood",
            "origin_server_ts": 5,
            "state_key": "",
            "content": {"mood": "spicy"},
        }))]);
        assert!(changed.is_empty());
        assert!(room.state_event(&EventType::from("org.example.mood"), "").is_some());
    }

    #[test]
    fn tombstone_projects_successor() {
        let mut room =
            RoomState::from_initial_state(room_id(), vec![create_event("10")]).unwrap();
        room.update_state(vec![event(json!({
            "event_id": "$tomb",
            "sender": "@a:x.org",
            "type": "m.room.tombstone",
            "origin_server_ts": 6,
            "state_key": "",
            "content": {"body": "upgraded", "replacement_room": "!next:x.org"},
        }))]);
        assert_eq!(room.successor().unwrap().as_str(), "!next:x.org");
        assert_eq!(room.tombstone().unwrap().event_id.as_str(), "$tomb");
    }

    #[test]
    fn timeline_deduplicates_by_event_id() {
        let mut room =
            RoomState::from_initial_state(room_id(), vec![create_event("10")]).unwrap();
        let message = event(json!({
            "event_id": "$msg",
            "sender": "@a:x.org",
            "type": "m.room.message",
            "origin_server_ts": 7,
            "content": {"msgtype": "m.text", "body": "hi"},
        }));
        assert!(!room.update_timeline(vec![message.clone()]).is_empty());
        assert!(room.update_timeline(vec![message]).is_empty());
        assert_eq!(room.message_count(), 1);
    }

    #[test]
    fn state_event_inside_timeline_folds_into_index() {
        let mut room =
            RoomState::from_initial_state(room_id(), vec![create_event("10")]).unwrap();
        room.update_timeline(vec![member_event("$m9", "@b:x.org", "invite")]);
        let bob = UserId::new("@b:x.org").unwrap();
        assert_eq!(room.membership_of(&bob), Some(Membership::Invite));
        assert_eq!(room.message_count(), 0);
    }

    #[test]
    fn snapshot_round_trips() {
        let registry = registry();
        let mut room = RoomState::from_initial_state(
            room_id(),
            vec![create_event("9"), member_event("$m1", "@a:x.org", "join")],
        )
        .unwrap();
        room.update_timeline(vec![event(json!({
            "event_id": "$msg",
            "sender": "@a:x.org",
            "type": "m.room.message",
            "origin_server_ts": 8,
            "content": {"msgtype": "m.text", "body": "hello"},
        }))]);

        let restored = RoomState::from_snapshot(&registry, &room.snapshot()).unwrap();
        assert_eq!(restored.version(), "9");
        assert_eq!(restored.joined_members(), room.joined_members());
        assert_eq!(restored.message_count(), 1);
    }
}
