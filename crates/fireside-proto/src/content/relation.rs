//! Event relations (`m.relates_to`) and `m.reaction` content.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::content::{as_object, opt_str, req_str};
use crate::error::DecodeError;
use crate::event_type::EventType;
use crate::identifiers::EventId;

/// How an event relates to an earlier event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// A rich reply (`m.in_reply_to` without a `rel_type`).
    Reply {
        /// The event being replied to.
        in_reply_to: EventId,
    },

    /// An edit replacing an earlier event (`rel_type: m.replace`).
    Replace {
        /// The event being replaced.
        event_id: EventId,
    },

    /// An annotation such as an emoji reaction (`rel_type: m.annotation`).
    Annotation {
        /// The annotated event.
        event_id: EventId,
        /// The annotation key, usually an emoji.
        key: String,
    },

    /// A reference relation (`rel_type: m.reference`).
    Reference {
        /// The referenced event.
        event_id: EventId,
    },

    /// A threaded reply (`rel_type: m.thread`).
    Thread {
        /// The thread root event.
        event_id: EventId,
        /// Reply target for clients without thread support.
        in_reply_to: Option<EventId>,
        /// Whether `in_reply_to` is only a fallback.
        is_falling_back: bool,
    },

    /// A relation type this client does not recognize, preserved verbatim.
    Unknown {
        /// The unrecognized `rel_type`.
        rel_type: String,
        /// The full `m.relates_to` value for round-tripping.
        raw: Value,
    },
}

impl Relation {
    /// Decode an `m.relates_to` value.
    ///
    /// Returns `Ok(None)` when the value carries neither a `rel_type` nor an
    /// `m.in_reply_to` block.
    pub fn from_value(event_type: &EventType, value: &Value) -> Result<Option<Self>, DecodeError> {
        let obj = as_object(event_type, value)?;

        if let Some(rel_type) = opt_str(obj, "rel_type") {
            return match rel_type {
                "m.replace" => Ok(Some(Self::Replace {
                    event_id: relation_event_id(event_type, obj)?,
                })),
                "m.annotation" => Ok(Some(Self::Annotation {
                    event_id: relation_event_id(event_type, obj)?,
                    key: req_str(event_type, obj, "key")?.to_owned(),
                })),
                "m.reference" => Ok(Some(Self::Reference {
                    event_id: relation_event_id(event_type, obj)?,
                })),
                "m.thread" => Ok(Some(Self::Thread {
                    event_id: relation_event_id(event_type, obj)?,
                    in_reply_to: reply_target(obj)?,
                    is_falling_back: obj
                        .get("is_falling_back")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                })),
                other => Ok(Some(Self::Unknown {
                    rel_type: other.to_owned(),
                    raw: value.clone(),
                })),
            };
        }

        match reply_target(obj)? {
            Some(in_reply_to) => Ok(Some(Self::Reply { in_reply_to })),
            None => Ok(None),
        }
    }

    /// Encode back into the `m.relates_to` wire value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Reply { in_reply_to } => json!({
                "m.in_reply_to": {"event_id": in_reply_to},
            }),
            Self::Replace { event_id } => json!({
                "rel_type": "m.replace",
                "event_id": event_id,
            }),
            Self::Annotation { event_id, key } => json!({
                "rel_type": "m.annotation",
                "event_id": event_id,
                "key": key,
            }),
            Self::Reference { event_id } => json!({
                "rel_type": "m.reference",
                "event_id": event_id,
            }),
            Self::Thread { event_id, in_reply_to, is_falling_back } => {
                let mut obj = Map::new();
                obj.insert("rel_type".to_owned(), json!("m.thread"));
                obj.insert("event_id".to_owned(), json!(event_id));
                if let Some(target) = in_reply_to {
                    obj.insert("m.in_reply_to".to_owned(), json!({"event_id": target}));
                }
                if *is_falling_back {
                    obj.insert("is_falling_back".to_owned(), json!(true));
                }
                Value::Object(obj)
            }
            Self::Unknown { raw, .. } => raw.clone(),
        }
    }

    /// The related-to event id, when the relation names one.
    pub fn target(&self) -> Option<&EventId> {
        match self {
            Self::Reply { in_reply_to } => Some(in_reply_to),
            Self::Replace { event_id }
            | Self::Annotation { event_id, .. }
            | Self::Reference { event_id }
            | Self::Thread { event_id, .. } => Some(event_id),
            Self::Unknown { .. } => None,
        }
    }
}

fn relation_event_id(
    event_type: &EventType,
    obj: &Map<String, Value>,
) -> Result<EventId, DecodeError> {
    EventId::new(req_str(event_type, obj, "event_id")?).map_err(DecodeError::from)
}

fn reply_target(obj: &Map<String, Value>) -> Result<Option<EventId>, DecodeError> {
    let Some(reply) = obj.get("m.in_reply_to").and_then(Value::as_object) else {
        return Ok(None);
    };
    match opt_str(reply, "event_id") {
        Some(raw) => Ok(Some(EventId::new(raw)?)),
        None => Ok(None),
    }
}

/// Content of an `m.reaction` event.
///
/// A reaction is an annotation relation and nothing else; content without a
/// well-formed `m.annotation` relation is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionContent {
    /// The event being reacted to.
    pub event_id: EventId,
    /// The reaction key, usually an emoji.
    pub key: String,
}

impl ReactionContent {
    /// Decode from the content of an `m.reaction` event.
    pub fn from_value(event_type: &EventType, value: &Value) -> Result<Self, DecodeError> {
        let obj = as_object(event_type, value)?;
        let relates = obj
            .get("m.relates_to")
            .ok_or_else(|| DecodeError::MissingField {
                event_type: event_type.clone(),
                field: "m.relates_to",
            })?;
        match Relation::from_value(event_type, relates)? {
            Some(Relation::Annotation { event_id, key }) => Ok(Self { event_id, key }),
            _ => Err(DecodeError::InvalidField {
                event_type: event_type.clone(),
                field: "m.relates_to",
                reason: "expected an m.annotation relation".to_owned(),
            }),
        }
    }

    /// Encode back into the wire value.
    pub fn to_value(&self) -> Value {
        json!({
            "m.relates_to": {
                "rel_type": "m.annotation",
                "event_id": self.event_id,
                "key": self.key,
            }
        })
    }
}

impl Serialize for ReactionContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
