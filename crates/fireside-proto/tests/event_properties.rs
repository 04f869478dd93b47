//! Property-based tests for event decoding.
//!
//! These tests verify properties that hold for ALL inputs, not just specific
//! examples: type tags survive parsing verbatim, and unknown events round-trip
//! through decode/encode without loss.

use fireside_proto::{ContentRegistry, EventType, SyncRoomEvent};
use proptest::prelude::*;
use serde_json::{Value, json};

/// Strategy for arbitrary dotted type tags outside the known `m.` set.
fn arbitrary_custom_tag() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9]{1,8}", "[a-z][a-z0-9]{1,8}", "[a-z][a-z0-9]{1,8}")
        .prop_map(|(a, b, c)| format!("{a}.{b}.{c}"))
        .prop_filter("must not collide with known tags", |tag| {
            !EventType::from(tag.as_str()).is_known()
        })
}

/// Strategy for arbitrary flat JSON content objects.
fn arbitrary_content() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::from),
    ];
    prop::collection::btree_map("[a-z_]{1,12}", leaf, 0..6).prop_map(|map| {
        Value::Object(map.into_iter().collect())
    })
}

#[test]
fn prop_event_type_string_roundtrip() {
    proptest!(|(tag in "[a-zA-Z][a-zA-Z0-9._-]{0,40}")| {
        let parsed = EventType::from(tag.as_str());

        // PROPERTY: parsing never alters the wire string
        prop_assert_eq!(parsed.as_str(), tag.as_str());
        prop_assert_eq!(String::from(parsed), tag);
    });
}

#[test]
fn prop_unknown_event_roundtrip() {
    let registry = ContentRegistry::new();
    proptest!(|(tag in arbitrary_custom_tag(), content in arbitrary_content())| {
        let raw = json!({
            "event_id": "$prop",
            "sender": "@prop:test.org",
            "type": tag,
            "origin_server_ts": 0,
            "content": content,
        });

        let event = SyncRoomEvent::from_value(&registry, raw.clone())
            .expect("unknown events must decode as passthrough");

        // PROPERTY: decode then encode is the identity for unknown types
        prop_assert_eq!(event.to_value(), raw);
    });
}

#[test]
fn prop_known_state_content_reencodes_decodably() {
    let registry = ContentRegistry::new();
    proptest!(|(name in "[a-zA-Z0-9 ]{1,32}")| {
        let raw = json!({
            "event_id": "$prop",
            "sender": "@prop:test.org",
            "type": "m.room.name",
            "origin_server_ts": 0,
            "state_key": "",
            "content": {"name": name},
        });

        let event = SyncRoomEvent::from_value(&registry, raw).expect("valid name event");
        let reencoded = event.to_value();
        let again = SyncRoomEvent::from_value(&registry, reencoded)
            .expect("re-encoded events must stay decodable");

        // PROPERTY: decode ∘ encode ∘ decode is stable
        prop_assert_eq!(again, event);
    });
}
