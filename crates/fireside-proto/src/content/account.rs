//! Account-data event contents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identifiers::{EventId, RoomId, UserId};

/// Content of the per-room `m.fully_read` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullyReadContent {
    /// The last event the user has fully read.
    pub event_id: EventId,
}

/// One tag's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagInfo {
    /// Relative ordering within the tag, between 0 and 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
}

/// Content of the per-room `m.tag` account-data event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagContent {
    /// Tags applied to the room, keyed by tag name (`m.favourite`, …).
    #[serde(default)]
    pub tags: BTreeMap<String, TagInfo>,
}

/// Content of the global `m.direct` account-data event.
///
/// Maps each peer user to the rooms considered direct chats with them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectContent(pub BTreeMap<UserId, Vec<RoomId>>);

impl DirectContent {
    /// Whether the given room is marked direct with anyone.
    pub fn is_direct(&self, room_id: &RoomId) -> bool {
        self.0.values().any(|rooms| rooms.contains(room_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_map_round_trips() {
        let raw = json!({"@a:x.org": ["!r1:x.org", "!r2:x.org"]});
        let content: DirectContent = serde_json::from_value(raw.clone()).unwrap();
        assert!(content.is_direct(&RoomId::new("!r1:x.org").unwrap()));
        assert!(!content.is_direct(&RoomId::new("!r9:x.org").unwrap()));
        assert_eq!(serde_json::to_value(&content).unwrap(), raw);
    }

    #[test]
    fn tags_tolerate_missing_order() {
        let content: TagContent =
            serde_json::from_value(json!({"tags": {"m.favourite": {}}})).unwrap();
        assert!(content.tags.contains_key("m.favourite"));
    }
}
