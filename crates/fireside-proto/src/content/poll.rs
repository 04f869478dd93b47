//! Poll event contents (`m.poll.start`, `m.poll.response`, `m.poll.end`).
//!
//! Responses and ends point back at the start event via a reference
//! relation, so those two are hand-decoded.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::content::relation::Relation;
use crate::content::{as_object, opt_str};
use crate::error::DecodeError;
use crate::event_type::EventType;
use crate::identifiers::EventId;

/// One selectable poll answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollAnswer {
    /// Stable answer id referenced by responses.
    pub id: String,
    /// Answer text shown to users.
    pub text: String,
}

fn default_max_selections() -> u64 {
    1
}

/// Content of an `m.poll.start` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollStartContent {
    /// The poll question.
    pub question: String,

    /// Poll kind (`m.disclosed` or `m.undisclosed`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Maximum number of answers a user may select.
    #[serde(default = "default_max_selections")]
    pub max_selections: u64,

    /// The selectable answers.
    pub answers: Vec<PollAnswer>,
}

/// Content of an `m.poll.response` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResponseContent {
    /// The poll being answered.
    pub start_event_id: EventId,
    /// Selected answer ids; empty means the vote was retracted.
    pub selections: Vec<String>,
}

impl PollResponseContent {
    /// Decode from the content of an `m.poll.response` event.
    pub fn from_value(event_type: &EventType, value: &Value) -> Result<Self, DecodeError> {
        let obj = as_object(event_type, value)?;
        let start_event_id = reference_target(event_type, obj)?;
        let selections = obj
            .get("selections")
            .and_then(Value::as_array)
            .map(|answers| {
                answers.iter().filter_map(Value::as_str).map(str::to_owned).collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Ok(Self { start_event_id, selections })
    }

    /// Encode back into the wire value.
    pub fn to_value(&self) -> Value {
        json!({
            "m.relates_to": {"rel_type": "m.reference", "event_id": self.start_event_id},
            "selections": self.selections,
        })
    }
}

impl Serialize for PollResponseContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Content of an `m.poll.end` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollEndContent {
    /// The poll being closed.
    pub start_event_id: EventId,
    /// Optional human-readable closing text.
    pub text: Option<String>,
}

impl PollEndContent {
    /// Decode from the content of an `m.poll.end` event.
    pub fn from_value(event_type: &EventType, value: &Value) -> Result<Self, DecodeError> {
        let obj = as_object(event_type, value)?;
        Ok(Self {
            start_event_id: reference_target(event_type, obj)?,
            text: opt_str(obj, "text").map(str::to_owned),
        })
    }

    /// Encode back into the wire value.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "m.relates_to".to_owned(),
            json!({"rel_type": "m.reference", "event_id": self.start_event_id}),
        );
        if let Some(text) = &self.text {
            obj.insert("text".to_owned(), json!(text));
        }
        Value::Object(obj)
    }
}

impl Serialize for PollEndContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn reference_target(
    event_type: &EventType,
    obj: &Map<String, Value>,
) -> Result<EventId, DecodeError> {
    let relates = obj.get("m.relates_to").ok_or_else(|| DecodeError::MissingField {
        event_type: event_type.clone(),
        field: "m.relates_to",
    })?;
    match Relation::from_value(event_type, relates)? {
        Some(Relation::Reference { event_id }) => Ok(event_id),
        _ => Err(DecodeError::InvalidField {
            event_type: event_type.clone(),
            field: "m.relates_to",
            reason: "expected an m.reference relation".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn start_defaults_max_selections() {
        let content: PollStartContent = serde_json::from_value(json!({
            "question": "Lunch?",
            "answers": [{"id": "a", "text": "pizza"}, {"id": "b", "text": "soup"}],
        }))
        .unwrap();
        assert_eq!(content.max_selections, 1);
        assert_eq!(content.answers.len(), 2);
    }

    #[test]
    fn response_round_trips() {
        let content = PollResponseContent {
            start_event_id: EventId::new("$poll").unwrap(),
            selections: vec!["a".to_owned()],
        };
        let back =
            PollResponseContent::from_value(&EventType::PollResponse, &content.to_value()).unwrap();
        assert_eq!(back, content);
    }

    #[test]
    fn response_without_reference_is_rejected() {
        let err = PollResponseContent::from_value(
            &EventType::PollResponse,
            &json!({"selections": ["a"]}),
        );
        assert!(err.is_err());
    }

    #[test]
    fn end_round_trips() {
        let content = PollEndContent {
            start_event_id: EventId::new("$poll").unwrap(),
            text: Some("pizza wins".to_owned()),
        };
        let back = PollEndContent::from_value(&EventType::PollEnd, &content.to_value()).unwrap();
        assert_eq!(back, content);
    }
}
