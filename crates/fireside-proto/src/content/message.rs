//! `m.room.message` content.
//!
//! Message content is discriminated by the in-content `msgtype` string, so
//! decoding is hand-rolled rather than derived. Unknown message types are
//! preserved verbatim for round-trip encoding.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::content::relation::Relation;
use crate::content::{as_object, opt_str, req_str};
use crate::error::DecodeError;
use crate::event_type::EventType;

/// Body of a textual message (`m.text`, `m.emote`, `m.notice`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPayload {
    /// Plain-text body.
    pub body: String,
    /// Format of `formatted_body`, normally `org.matrix.custom.html`.
    pub format: Option<String>,
    /// Formatted body, present only alongside `format`.
    pub formatted_body: Option<String>,
}

impl TextPayload {
    /// A plain-text payload with no formatting.
    pub fn plain(body: impl Into<String>) -> Self {
        Self { body: body.into(), format: None, formatted_body: None }
    }
}

/// Body of an attachment message (`m.image`, `m.file`, `m.audio`, `m.video`).
#[derive(Debug, Clone, PartialEq)]
pub struct FilePayload {
    /// Human-readable body, usually the file name.
    pub body: String,
    /// Content URI for unencrypted attachments.
    pub url: Option<String>,
    /// Encrypted-file descriptor for encrypted rooms; opaque to the engine.
    pub file: Option<Value>,
    /// Attachment metadata (mimetype, size, dimensions); opaque to the engine.
    pub info: Option<Value>,
}

/// The message-type-specific part of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    /// `m.text`
    Text(TextPayload),
    /// `m.emote`
    Emote(TextPayload),
    /// `m.notice`
    Notice(TextPayload),
    /// `m.image`
    Image(FilePayload),
    /// `m.file`
    File(FilePayload),
    /// `m.audio`
    Audio(FilePayload),
    /// `m.video`
    Video(FilePayload),
    /// `m.location`
    Location {
        /// Human-readable description of the location.
        body: String,
        /// `geo:` URI of the location.
        geo_uri: String,
    },
    /// A message type outside the known set, preserved verbatim.
    Other {
        /// The unrecognized `msgtype`.
        msgtype: String,
        /// The full content object for round-tripping.
        raw: Map<String, Value>,
    },
}

impl MessageKind {
    /// The wire `msgtype` for this kind.
    pub fn msgtype(&self) -> &str {
        match self {
            Self::Text(_) => "m.text",
            Self::Emote(_) => "m.emote",
            Self::Notice(_) => "m.notice",
            Self::Image(_) => "m.image",
            Self::File(_) => "m.file",
            Self::Audio(_) => "m.audio",
            Self::Video(_) => "m.video",
            Self::Location { .. } => "m.location",
            Self::Other { msgtype, .. } => msgtype,
        }
    }

    /// The plain-text body, when this kind carries one.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Text(t) | Self::Emote(t) | Self::Notice(t) => Some(&t.body),
            Self::Image(f) | Self::File(f) | Self::Audio(f) | Self::Video(f) => Some(&f.body),
            Self::Location { body, .. } => Some(body),
            Self::Other { raw, .. } => opt_str(raw, "body"),
        }
    }
}

/// Content of an `m.room.message` event.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageContent {
    /// The message-type-specific payload.
    pub kind: MessageKind,
    /// Relation to an earlier event, if any.
    pub relates_to: Option<Relation>,
    /// Replacement content carried by edits (`m.new_content`).
    pub new_content: Option<Box<MessageContent>>,
}

impl MessageContent {
    /// A plain text message.
    pub fn text(body: impl Into<String>) -> Self {
        Self { kind: MessageKind::Text(TextPayload::plain(body)), relates_to: None, new_content: None }
    }

    /// Decode from the content of an `m.room.message` event.
    pub fn from_value(event_type: &EventType, value: &Value) -> Result<Self, DecodeError> {
        let obj = as_object(event_type, value)?;
        let msgtype = req_str(event_type, obj, "msgtype")?;

        let kind = match msgtype {
            "m.text" => MessageKind::Text(text_payload(event_type, obj)?),
            "m.emote" => MessageKind::Emote(text_payload(event_type, obj)?),
            "m.notice" => MessageKind::Notice(text_payload(event_type, obj)?),
            "m.image" => MessageKind::Image(file_payload(event_type, obj)?),
            "m.file" => MessageKind::File(file_payload(event_type, obj)?),
            "m.audio" => MessageKind::Audio(file_payload(event_type, obj)?),
            "m.video" => MessageKind::Video(file_payload(event_type, obj)?),
            "m.location" => MessageKind::Location {
                body: req_str(event_type, obj, "body")?.to_owned(),
                geo_uri: req_str(event_type, obj, "geo_uri")?.to_owned(),
            },
            other => MessageKind::Other { msgtype: other.to_owned(), raw: obj.clone() },
        };

        let relates_to = match obj.get("m.relates_to") {
            Some(value) => Relation::from_value(event_type, value)?,
            None => None,
        };

        let new_content = match obj.get("m.new_content") {
            Some(value) => Some(Box::new(Self::from_value(event_type, value)?)),
            None => None,
        };

        Ok(Self { kind, relates_to, new_content })
    }

    /// Encode back into the wire value.
    pub fn to_value(&self) -> Value {
        let mut obj = match &self.kind {
            MessageKind::Text(t) | MessageKind::Emote(t) | MessageKind::Notice(t) => {
                let mut obj = Map::new();
                obj.insert("body".to_owned(), json!(t.body));
                if let Some(format) = &t.format {
                    obj.insert("format".to_owned(), json!(format));
                }
                if let Some(formatted) = &t.formatted_body {
                    obj.insert("formatted_body".to_owned(), json!(formatted));
                }
                obj
            }
            MessageKind::Image(f)
            | MessageKind::File(f)
            | MessageKind::Audio(f)
            | MessageKind::Video(f) => {
                let mut obj = Map::new();
                obj.insert("body".to_owned(), json!(f.body));
                if let Some(url) = &f.url {
                    obj.insert("url".to_owned(), json!(url));
                }
                if let Some(file) = &f.file {
                    obj.insert("file".to_owned(), file.clone());
                }
                if let Some(info) = &f.info {
                    obj.insert("info".to_owned(), info.clone());
                }
                obj
            }
            MessageKind::Location { body, geo_uri } => {
                let mut obj = Map::new();
                obj.insert("body".to_owned(), json!(body));
                obj.insert("geo_uri".to_owned(), json!(geo_uri));
                obj
            }
            MessageKind::Other { raw, .. } => raw.clone(),
        };

        obj.insert("msgtype".to_owned(), json!(self.kind.msgtype()));
        if let Some(relation) = &self.relates_to {
            obj.insert("m.relates_to".to_owned(), relation.to_value());
        }
        if let Some(new_content) = &self.new_content {
            obj.insert("m.new_content".to_owned(), new_content.to_value());
        }
        Value::Object(obj)
    }
}

impl Serialize for MessageContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn text_payload(
    event_type: &EventType,
    obj: &Map<String, Value>,
) -> Result<TextPayload, DecodeError> {
    Ok(TextPayload {
        body: req_str(event_type, obj, "body")?.to_owned(),
        format: opt_str(obj, "format").map(str::to_owned),
        formatted_body: opt_str(obj, "formatted_body").map(str::to_owned),
    })
}

fn file_payload(
    event_type: &EventType,
    obj: &Map<String, Value>,
) -> Result<FilePayload, DecodeError> {
    Ok(FilePayload {
        body: req_str(event_type, obj, "body")?.to_owned(),
        url: opt_str(obj, "url").map(str::to_owned),
        file: obj.get("file").cloned(),
        info: obj.get("info").cloned(),
    })
}
