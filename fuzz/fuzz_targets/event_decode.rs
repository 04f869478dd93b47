//! Fuzz target for envelope and content decoding.
//!
//! Feeds arbitrary bytes through JSON parsing into every envelope variant:
//! - Malformed JSON
//! - Valid JSON with wrong shapes (arrays, scalars, nested garbage)
//! - Known event types with hostile content
//!
//! The decoder should NEVER panic. All invalid inputs must return an error
//! or decode as passthrough content.

#![no_main]

use libfuzzer_sys::fuzz_target;

use fireside_proto::{
    ContentRegistry, RoomEvent, StrippedStateEvent, SyncRoomEvent, ToDeviceEvent,
};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return;
    };

    let registry = ContentRegistry::new();

    let _ = RoomEvent::from_value(&registry, value.clone());
    let _ = StrippedStateEvent::from_value(&registry, value.clone());
    let _ = ToDeviceEvent::from_value(&registry, value.clone());

    // A successful decode must re-encode without panicking, and the result
    // must decode again.
    if let Ok(event) = SyncRoomEvent::from_value(&registry, value) {
        let reencoded = event.to_value();
        let _ = SyncRoomEvent::from_value(&registry, reencoded);
    }
});
