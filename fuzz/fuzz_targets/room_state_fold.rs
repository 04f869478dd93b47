//! Fuzz target for room state folding.
//!
//! Builds a room and folds arbitrary decoded events into it. The fold must
//! NEVER panic, and the five membership sets must stay pairwise disjoint no
//! matter what sequence of events arrives.

#![no_main]

use libfuzzer_sys::fuzz_target;

use fireside_core::RoomState;
use fireside_proto::{ContentRegistry, RoomId, SyncRoomEvent};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(text) else {
        return;
    };

    let registry = ContentRegistry::new();
    let Ok(room_id) = RoomId::new("!fuzz:example.org") else {
        return;
    };
    let Ok(create) = SyncRoomEvent::from_value(
        &registry,
        serde_json::json!({
            "event_id": "$create",
            "sender": "@fuzz:example.org",
            "type": "m.room.create",
            "origin_server_ts": 0,
            "state_key": "",
            "content": {},
        }),
    ) else {
        return;
    };
    let Ok(mut room) = RoomState::from_initial_state(room_id, vec![create]) else {
        return;
    };

    let events: Vec<SyncRoomEvent> = values
        .into_iter()
        .filter_map(|value| SyncRoomEvent::from_value(&registry, value).ok())
        .collect();

    room.update_state(events.clone());
    room.update_timeline(events);

    // Membership sets stay pairwise disjoint.
    for user in room.joined_members() {
        assert!(!room.invited_members().contains(user));
        assert!(!room.left_members().contains(user));
        assert!(!room.banned_members().contains(user));
        assert!(!room.knocking_members().contains(user));
    }
});
