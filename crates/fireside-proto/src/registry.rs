//! Content registry: the tag → decoder dispatch table.
//!
//! A registry is a pure function table. Decoding takes a type tag and a raw
//! JSON value and produces a typed [`EventContent`]; encoding is the inverse.
//! Unknown tags decode into a passthrough variant so they survive a round
//! trip. Callers may install their own decoders for custom tags; installed
//! decoders shadow the built-in table.

use std::collections::HashMap;

use serde_json::Value;

use crate::content::{
    AvatarContent, CanonicalAliasContent, CreateContent, DirectContent, EncryptedContent,
    EncryptionContent, EventContent, FullyReadContent, GuestAccessContent,
    HistoryVisibilityContent, JoinRulesContent, MemberContent, MessageContent, NameContent,
    PollEndContent,
    PollResponseContent, PollStartContent, PowerLevelsContent, ReactionContent, RedactionContent,
    RoomKeyContent, SpaceChildContent, SpaceParentContent, TagContent, TombstoneContent,
    TopicContent, UnknownContent, from_value,
};
use crate::error::DecodeError;
use crate::event_type::EventType;

/// Signature of a content decoder.
pub type DecodeFn = fn(&EventType, &Value) -> Result<EventContent, DecodeError>;

/// Maps event-type tags to decode/encode strategies for their payloads.
///
/// Decoding is a pure function of its input; the registry carries no state
/// beyond the decoder table itself, so one instance can be shared freely for
/// concurrent reads.
#[derive(Debug, Clone, Default)]
pub struct ContentRegistry {
    /// Caller-installed decoders, keyed by wire tag. Checked first.
    overrides: HashMap<String, DecodeFn>,
}

impl ContentRegistry {
    /// A registry with only the built-in decoder table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a decoder for a custom tag, shadowing the built-in table.
    pub fn register(&mut self, tag: impl Into<String>, decoder: DecodeFn) {
        self.overrides.insert(tag.into(), decoder);
    }

    /// Decode a raw content payload under the given type tag.
    ///
    /// Unknown tags succeed with [`EventContent::Unknown`], preserving the
    /// raw value. Known tags with missing required fields fail; extra fields
    /// are always tolerated.
    pub fn decode(
        &self,
        event_type: &EventType,
        content: &Value,
    ) -> Result<EventContent, DecodeError> {
        if let Some(decoder) = self.overrides.get(event_type.as_str()) {
            return decoder(event_type, content);
        }

        Ok(match event_type {
            EventType::RoomCreate => {
                EventContent::RoomCreate(from_value::<CreateContent>(event_type, content)?)
            }
            EventType::RoomMember => {
                EventContent::RoomMember(from_value::<MemberContent>(event_type, content)?)
            }
            EventType::RoomName => {
                EventContent::RoomName(from_value::<NameContent>(event_type, content)?)
            }
            EventType::RoomTopic => {
                EventContent::RoomTopic(from_value::<TopicContent>(event_type, content)?)
            }
            EventType::RoomAvatar => {
                EventContent::RoomAvatar(from_value::<AvatarContent>(event_type, content)?)
            }
            EventType::RoomCanonicalAlias => EventContent::RoomCanonicalAlias(from_value::<
                CanonicalAliasContent,
            >(event_type, content)?),
            EventType::RoomJoinRules => {
                EventContent::RoomJoinRules(from_value::<JoinRulesContent>(event_type, content)?)
            }
            EventType::RoomHistoryVisibility => EventContent::RoomHistoryVisibility(from_value::<
                HistoryVisibilityContent,
            >(
                event_type, content
            )?),
            EventType::RoomGuestAccess => EventContent::RoomGuestAccess(
                from_value::<GuestAccessContent>(event_type, content)?,
            ),
            EventType::RoomPowerLevels => EventContent::RoomPowerLevels(
                from_value::<PowerLevelsContent>(event_type, content)?,
            ),
            EventType::RoomEncryption => {
                EventContent::RoomEncryption(from_value::<EncryptionContent>(event_type, content)?)
            }
            EventType::RoomTombstone => {
                EventContent::RoomTombstone(from_value::<TombstoneContent>(event_type, content)?)
            }
            EventType::RoomMessage => {
                EventContent::RoomMessage(MessageContent::from_value(event_type, content)?)
            }
            EventType::RoomEncrypted => {
                EventContent::RoomEncrypted(EncryptedContent::from_value(event_type, content)?)
            }
            EventType::RoomRedaction => {
                EventContent::RoomRedaction(from_value::<RedactionContent>(event_type, content)?)
            }
            EventType::Reaction => {
                EventContent::Reaction(ReactionContent::from_value(event_type, content)?)
            }
            EventType::PollStart => {
                EventContent::PollStart(from_value::<PollStartContent>(event_type, content)?)
            }
            EventType::PollResponse => {
                EventContent::PollResponse(PollResponseContent::from_value(event_type, content)?)
            }
            EventType::PollEnd => {
                EventContent::PollEnd(PollEndContent::from_value(event_type, content)?)
            }
            EventType::FullyRead => {
                EventContent::FullyRead(from_value::<FullyReadContent>(event_type, content)?)
            }
            EventType::Tag => EventContent::Tag(from_value::<TagContent>(event_type, content)?),
            EventType::Direct => {
                EventContent::Direct(from_value::<DirectContent>(event_type, content)?)
            }
            EventType::RoomKey => {
                EventContent::RoomKey(from_value::<RoomKeyContent>(event_type, content)?)
            }
            EventType::SpaceChild => {
                EventContent::SpaceChild(from_value::<SpaceChildContent>(event_type, content)?)
            }
            EventType::SpaceParent => {
                EventContent::SpaceParent(from_value::<SpaceParentContent>(event_type, content)?)
            }
            EventType::Other(tag) => EventContent::Unknown(UnknownContent {
                event_type: tag.clone(),
                raw: content.clone(),
            }),
        })
    }

    /// Encode typed content back into its JSON wire form.
    ///
    /// The inverse of [`decode`](Self::decode); unknown content encodes to
    /// the exact value it was decoded from.
    pub fn encode(&self, content: &EventContent) -> Value {
        content.to_value()
    }
}
