//! Space hierarchy state-event contents.

use serde::{Deserialize, Serialize};

/// Content of an `m.space.child` event; the state key names the child room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceChildContent {
    /// Servers to try when joining the child. Empty means the link is dead.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub via: Vec<String>,

    /// Lexicographic ordering hint among siblings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,

    /// Whether the child is suggested to space members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested: Option<bool>,
}

/// Content of an `m.space.parent` event; the state key names the parent room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceParentContent {
    /// Servers to try when joining the parent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub via: Vec<String>,

    /// Whether this is the canonical parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<bool>,
}
