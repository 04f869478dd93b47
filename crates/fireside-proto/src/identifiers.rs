//! Validated identifier newtypes.
//!
//! User, room, and event identifiers are opaque strings with a leading sigil
//! (`@`, `!`, `$`). Validation only checks the grammar the engine relies on;
//! it never interprets the server part.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An identifier string failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} identifier {raw:?}: {reason}")]
pub struct IdParseError {
    /// Which identifier kind was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub raw: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

fn check_sigil_and_server(
    kind: &'static str,
    raw: &str,
    sigil: char,
    needs_server: bool,
) -> Result<(), IdParseError> {
    let reject = |reason| IdParseError { kind, raw: raw.to_owned(), reason };

    let Some(rest) = raw.strip_prefix(sigil) else {
        return Err(reject("missing sigil"));
    };
    if rest.is_empty() {
        return Err(reject("empty after sigil"));
    }
    if needs_server {
        match rest.split_once(':') {
            Some((local, server)) if !local.is_empty() && !server.is_empty() => {}
            _ => return Err(reject("missing server part")),
        }
    }
    Ok(())
}

/// A user identifier of the form `@localpart:server`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Parse and validate a user identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdParseError> {
        let raw = raw.into();
        check_sigil_and_server("user", &raw, '@', true)?;
        Ok(Self(raw))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The server part after the first `:`.
    pub fn server_name(&self) -> &str {
        self.0.split_once(':').map_or("", |(_, server)| server)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdParseError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A room identifier of the form `!opaque:server`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Parse and validate a room identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdParseError> {
        let raw = raw.into();
        check_sigil_and_server("room", &raw, '!', true)?;
        Ok(Self(raw))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = IdParseError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An event identifier of the form `$opaque`.
///
/// Room-version-3+ event ids carry no server part, so only the sigil is
/// required.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

impl EventId {
    /// Parse and validate an event identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdParseError> {
        let raw = raw.into();
        check_sigil_and_server("event", &raw, '$', false)?;
        Ok(Self(raw))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EventId {
    type Error = IdParseError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
