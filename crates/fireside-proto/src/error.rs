//! Decode errors for envelopes and event content.
//!
//! All errors here are local and non-retryable: they describe payloads the
//! server sent that this client cannot interpret. Callers that fold events
//! into room state skip undecodable events rather than aborting the batch.

use thiserror::Error;

use crate::event_type::EventType;
use crate::identifiers::IdParseError;

/// Errors produced while decoding an envelope or its content.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The content of a known event type was not a JSON object.
    #[error("content of {event_type} is not a JSON object")]
    NotAnObject {
        /// Event type whose content was malformed.
        event_type: EventType,
    },

    /// A required content field was absent.
    #[error("content of {event_type} is missing required field `{field}`")]
    MissingField {
        /// Event type whose content was malformed.
        event_type: EventType,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A content field was present but had the wrong shape.
    #[error("content of {event_type} has invalid field `{field}`: {reason}")]
    InvalidField {
        /// Event type whose content was malformed.
        event_type: EventType,
        /// Name of the invalid field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// An encrypted payload declared an algorithm this client does not know.
    ///
    /// The algorithm discriminator lives inside the content itself, so this
    /// is distinct from an unknown event type (which decodes as passthrough).
    #[error("unknown encryption algorithm `{algorithm}`")]
    UnknownAlgorithm {
        /// The declared algorithm string.
        algorithm: String,
    },

    /// A user, room, or event identifier failed validation.
    #[error(transparent)]
    InvalidIdentifier(#[from] IdParseError),

    /// The content of a known event type failed structural deserialization.
    #[error("malformed content for {event_type}")]
    Malformed {
        /// Event type whose content was malformed.
        event_type: EventType,
        /// Underlying deserialization failure.
        #[source]
        source: serde_json::Error,
    },

    /// The envelope itself (outside `content`) failed deserialization.
    #[error("malformed event envelope")]
    Envelope {
        /// Underlying deserialization failure.
        #[source]
        source: serde_json::Error,
    },
}
