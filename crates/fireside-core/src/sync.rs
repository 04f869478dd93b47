//! Ordered application of sync batches to room state.
//!
//! A sync response delivers, per room, a state section, a timeline section,
//! and an account-data section. [`SyncApplier`] applies them in exactly that
//! order so timeline-side decoration (reactions, relations) always observes
//! the latest state. Application is idempotent: replaying a batch neither
//! duplicates timeline entries nor regresses state.
//!
//! Batches are assumed to arrive in server order; the state merge rule is
//! last-applied-wins with no explicit ordering key. A transport that could
//! reorder batches would need to sort them before handing them here.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::{debug, trace};

use fireside_proto::{
    ContentRegistry, EventContent, EventType, RoomId, StrippedStateEvent, SyncRoomEvent,
};

use crate::error::RoomError;
use crate::room::{RoomField, RoomState, StrippedStateRoom};

/// One room's slice of a sync response, already decoded.
#[derive(Debug, Clone, Default)]
pub struct RoomUpdates {
    /// State events, in server order.
    pub state: Vec<SyncRoomEvent>,
    /// Timeline events, in server order.
    pub timeline: Vec<SyncRoomEvent>,
    /// Per-room account data entries.
    pub account_data: Vec<(EventType, EventContent)>,
}

impl RoomUpdates {
    /// Whether the batch carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.state.is_empty() && self.timeline.is_empty() && self.account_data.is_empty()
    }
}

/// Outcome of applying one batch to one room.
#[derive(Debug, Clone)]
pub struct AppliedSync {
    /// Projected fields that changed.
    pub changed: BTreeSet<RoomField>,
    /// State events folded into the index.
    pub state_events: usize,
    /// Timeline events offered (including duplicates that were dropped).
    pub timeline_events: usize,
    /// Account data entries replaced.
    pub account_data_events: usize,
}

/// Applies decoded sync batches to [`RoomState`] instances.
///
/// Owns the [`ContentRegistry`] used to materialize typed events from raw
/// sync JSON. The applier itself is stateless across calls; the caller owns
/// every room instance and must not apply batches to the same room
/// concurrently.
#[derive(Debug, Clone, Default)]
pub struct SyncApplier {
    registry: ContentRegistry,
}

impl SyncApplier {
    /// An applier decoding through the given registry.
    pub fn new(registry: ContentRegistry) -> Self {
        Self { registry }
    }

    /// The registry used for decoding.
    pub fn registry(&self) -> &ContentRegistry {
        &self.registry
    }

    /// Apply one batch: state first, then timeline, then account data.
    pub fn apply(&self, room: &mut RoomState, updates: RoomUpdates) -> AppliedSync {
        trace!(
            room = %room.room_id(),
            state = updates.state.len(),
            timeline = updates.timeline.len(),
            account_data = updates.account_data.len(),
            "applying sync batch",
        );
        let state_events = updates.state.len();
        let timeline_events = updates.timeline.len();
        let account_data_events = updates.account_data.len();

        let mut changed = room.update_state(updates.state);
        changed.append(&mut room.update_timeline(updates.timeline));
        changed.append(&mut room.apply_account_data(updates.account_data));

        AppliedSync { changed, state_events, timeline_events, account_data_events }
    }

    /// Construct a new joined room from its first batch, then apply the rest.
    pub fn build_room(&self, room_id: RoomId, updates: RoomUpdates) -> Result<RoomState, RoomError> {
        let mut room = RoomState::from_initial_state(room_id, updates.state)?;
        room.update_timeline(updates.timeline);
        room.apply_account_data(updates.account_data);
        Ok(room)
    }

    /// Parse one joined/left room section of a raw sync response.
    ///
    /// Tolerant: events that fail to decode are logged and skipped rather
    /// than failing the batch, so one malformed event cannot wedge a room.
    pub fn parse_updates(&self, section: &Value) -> RoomUpdates {
        let mut updates = RoomUpdates::default();

        for event in section_events(section, "state") {
            match SyncRoomEvent::from_value(&self.registry, event.clone()) {
                Ok(event) => updates.state.push(event),
                Err(err) => debug!(%err, "skipping undecodable state event"),
            }
        }
        for event in section_events(section, "timeline") {
            match SyncRoomEvent::from_value(&self.registry, event.clone()) {
                Ok(event) => updates.timeline.push(event),
                Err(err) => debug!(%err, "skipping undecodable timeline event"),
            }
        }
        for event in section_events(section, "account_data") {
            let Some(event_type) = event.get("type").and_then(Value::as_str).map(EventType::from)
            else {
                debug!("skipping account data entry without type");
                continue;
            };
            let content = event.get("content").unwrap_or(&Value::Null);
            match self.registry.decode(&event_type, content) {
                Ok(content) => updates.account_data.push((event_type, content)),
                Err(err) => debug!(%err, "skipping undecodable account data entry"),
            }
        }
        updates
    }

    /// Parse the stripped-state section of an invited room and build its
    /// preview.
    pub fn parse_invite(
        &self,
        room_id: RoomId,
        section: &Value,
    ) -> Result<StrippedStateRoom, RoomError> {
        let mut events = Vec::new();
        for event in section_events(section, "invite_state") {
            match StrippedStateEvent::from_value(&self.registry, event.clone()) {
                Ok(event) => events.push(event),
                Err(err) => debug!(%err, "skipping undecodable stripped event"),
            }
        }
        StrippedStateRoom::new(room_id, events)
    }
}

/// Events of `section.<name>.events`, or an empty slice.
fn section_events<'v>(section: &'v Value, name: &str) -> &'v [Value] {
    section
        .get(name)
        .and_then(|s| s.get("events"))
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fireside_proto::UserId;
    use serde_json::json;

    fn applier() -> SyncApplier {
        SyncApplier::default()
    }

    fn joined_section() -> Value {
        json!({
            "state": {"events": [
                {
                    "event_id": "$create",
                    "sender": "@a:x.org",
                    "type": "m.room.create",
                    "origin_server_ts": 1,
                    "state_key": "",
                    "content": {"room_version": "9"},
                },
                {
                    "event_id": "$m1",
                    "sender": "@a:x.org",
                    "type": "m.room.member",
                    "origin_server_ts": 2,
                    "state_key": "@a:x.org",
                    "content": {"membership": "join"},
                },
            ]},
            "timeline": {"events": [
                {
                    "event_id": "$msg1",
                    "sender": "@a:x.org",
                    "type": "m.room.message",
                    "origin_server_ts": 3,
                    "content": {"msgtype": "m.text", "body": "hello"},
                },
                {
                    "event_id": "$broken",
                    "type": "m.room.message",
                    "content": {"msgtype": "m.text", "body": "no sender"},
                },
            ]},
            "account_data": {"events": [
                {"type": "m.fully_read", "content": {"event_id": "$msg1"}},
            ]},
        })
    }

    #[test]
    fn parse_skips_undecodable_events() {
        let updates = applier().parse_updates(&joined_section());
        assert_eq!(updates.state.len(), 2);
        assert_eq!(updates.timeline.len(), 1);
        assert_eq!(updates.account_data.len(), 1);
    }

    #[test]
    fn apply_orders_state_before_timeline() {
        let applier = applier();
        let updates = applier.parse_updates(&joined_section());
        let room = applier
            .build_room(RoomId::new("!r:x.org").unwrap(), updates)
            .unwrap();

        let alice = UserId::new("@a:x.org").unwrap();
        assert!(room.joined_members().contains(&alice));
        assert_eq!(room.message_count(), 1);
        assert!(room.account_data(&EventType::FullyRead).is_some());
    }

    #[test]
    fn reapplying_a_batch_is_idempotent() {
        let applier = applier();
        let first = applier.parse_updates(&joined_section());
        let again = applier.parse_updates(&joined_section());

        let mut room = applier
            .build_room(RoomId::new("!r:x.org").unwrap(), first)
            .unwrap();
        let message_count = room.message_count();
        let state_len = room.state_len();

        let outcome = applier.apply(&mut room, again);
        assert_eq!(room.message_count(), message_count);
        assert_eq!(room.state_len(), state_len);
        assert!(!outcome.changed.contains(&RoomField::Timeline));
        assert!(!outcome.changed.contains(&RoomField::Members));
    }

    #[test]
    fn invite_section_builds_preview() {
        let section = json!({
            "invite_state": {"events": [
                {
                    "sender": "@a:x.org",
                    "type": "m.room.create",
                    "state_key": "",
                    "content": {},
                },
                {
                    "sender": "@a:x.org",
                    "type": "m.room.name",
                    "state_key": "",
                    "content": {"name": "Secret plans"},
                },
            ]},
        });
        let preview = applier()
            .parse_invite(RoomId::new("!i:x.org").unwrap(), &section)
            .unwrap();
        assert_eq!(preview.name(), Some("Secret plans"));
    }
}
