//! Encrypted payload content and room-key distribution.
//!
//! `m.room.encrypted` is ambiguous from its type tag alone: the `algorithm`
//! field inside the content selects the shape. Actual decryption is delegated
//! to the external crypto provider; the engine only carries the ciphertext.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::content::relation::Relation;
use crate::content::{as_object, opt_str, req_str};
use crate::error::DecodeError;
use crate::event_type::EventType;
use crate::identifiers::RoomId;

/// Algorithm tag for olm-encrypted to-device payloads.
pub const ALGORITHM_OLM_V1: &str = "m.olm.v1.curve25519-aes-sha2";

/// Algorithm tag for megolm-encrypted room payloads.
pub const ALGORITHM_MEGOLM_V1: &str = "m.megolm.v1.aes-sha2";

/// One olm ciphertext blob, keyed by recipient device key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OlmCiphertext {
    /// The ciphertext body, base64.
    pub body: String,
    /// Olm message type: 0 for pre-key, 1 for normal.
    #[serde(rename = "type")]
    pub message_type: u64,
}

/// Content of an `m.room.encrypted` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptedContent {
    /// An olm-encrypted to-device payload.
    OlmV1 {
        /// Curve25519 key of the sending device.
        sender_key: String,
        /// Ciphertexts keyed by recipient curve25519 key.
        ciphertext: BTreeMap<String, OlmCiphertext>,
    },

    /// A megolm-encrypted room payload.
    MegolmV1 {
        /// The megolm session that encrypted this payload.
        session_id: String,
        /// The ciphertext, base64.
        ciphertext: String,
        /// Curve25519 key of the sending device (historical, optional).
        sender_key: Option<String>,
        /// Sending device id (historical, optional).
        device_id: Option<String>,
        /// Relation carried outside the encrypted body, if any.
        relates_to: Option<Relation>,
    },
}

impl EncryptedContent {
    /// The algorithm discriminator for this content.
    pub fn algorithm(&self) -> &'static str {
        match self {
            Self::OlmV1 { .. } => ALGORITHM_OLM_V1,
            Self::MegolmV1 { .. } => ALGORITHM_MEGOLM_V1,
        }
    }

    /// Decode from the content of an `m.room.encrypted` event.
    ///
    /// Fails with [`DecodeError::UnknownAlgorithm`] for algorithms outside
    /// the known set; the caller decides whether to keep the raw event.
    pub fn from_value(event_type: &EventType, value: &Value) -> Result<Self, DecodeError> {
        let obj = as_object(event_type, value)?;
        let algorithm = req_str(event_type, obj, "algorithm")?;

        match algorithm {
            ALGORITHM_OLM_V1 => {
                let ciphertext = obj.get("ciphertext").ok_or_else(|| {
                    DecodeError::MissingField { event_type: event_type.clone(), field: "ciphertext" }
                })?;
                let ciphertext: BTreeMap<String, OlmCiphertext> =
                    serde_json::from_value(ciphertext.clone()).map_err(|source| {
                        DecodeError::Malformed { event_type: event_type.clone(), source }
                    })?;
                Ok(Self::OlmV1 {
                    sender_key: req_str(event_type, obj, "sender_key")?.to_owned(),
                    ciphertext,
                })
            }
            ALGORITHM_MEGOLM_V1 => {
                let relates_to = match obj.get("m.relates_to") {
                    Some(value) => Relation::from_value(event_type, value)?,
                    None => None,
                };
                Ok(Self::MegolmV1 {
                    session_id: req_str(event_type, obj, "session_id")?.to_owned(),
                    ciphertext: req_str(event_type, obj, "ciphertext")?.to_owned(),
                    sender_key: opt_str(obj, "sender_key").map(str::to_owned),
                    device_id: opt_str(obj, "device_id").map(str::to_owned),
                    relates_to,
                })
            }
            other => Err(DecodeError::UnknownAlgorithm { algorithm: other.to_owned() }),
        }
    }

    /// Encode back into the wire value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::OlmV1 { sender_key, ciphertext } => json!({
                "algorithm": ALGORITHM_OLM_V1,
                "sender_key": sender_key,
                "ciphertext": ciphertext,
            }),
            Self::MegolmV1 { session_id, ciphertext, sender_key, device_id, relates_to } => {
                let mut obj = Map::new();
                obj.insert("algorithm".to_owned(), json!(ALGORITHM_MEGOLM_V1));
                obj.insert("session_id".to_owned(), json!(session_id));
                obj.insert("ciphertext".to_owned(), json!(ciphertext));
                if let Some(sender_key) = sender_key {
                    obj.insert("sender_key".to_owned(), json!(sender_key));
                }
                if let Some(device_id) = device_id {
                    obj.insert("device_id".to_owned(), json!(device_id));
                }
                if let Some(relation) = relates_to {
                    obj.insert("m.relates_to".to_owned(), relation.to_value());
                }
                Value::Object(obj)
            }
        }
    }
}

impl Serialize for EncryptedContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Content of an `m.room_key` to-device event.
///
/// Delivered inside an olm-encrypted envelope; carried here after the crypto
/// provider has decrypted the outer layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomKeyContent {
    /// Algorithm the key is for.
    pub algorithm: String,

    /// Room the session belongs to.
    pub room_id: RoomId,

    /// The megolm session id.
    pub session_id: String,

    /// The exported session key, base64.
    pub session_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn et() -> EventType {
        EventType::RoomEncrypted
    }

    #[test]
    fn megolm_decode_and_round_trip() {
        let raw = json!({
            "algorithm": "m.megolm.v1.aes-sha2",
            "session_id": "sess",
            "ciphertext": "AwgA…",
            "device_id": "DEV",
        });
        let content = EncryptedContent::from_value(&et(), &raw).unwrap();
        assert_eq!(content.algorithm(), ALGORITHM_MEGOLM_V1);
        assert_eq!(content.to_value(), raw);
    }

    #[test]
    fn olm_requires_sender_key() {
        let err = EncryptedContent::from_value(
            &et(),
            &json!({"algorithm": "m.olm.v1.curve25519-aes-sha2", "ciphertext": {}}),
        );
        assert!(err.is_err());
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let err = EncryptedContent::from_value(
            &et(),
            &json!({"algorithm": "org.example.rot13", "ciphertext": "x"}),
        );
        assert!(matches!(err, Err(DecodeError::UnknownAlgorithm { .. })));
    }
}
