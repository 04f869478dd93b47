//! Event envelopes and typed content
//!
//! Wire types for the Fireside client engine. Servers deliver opaque JSON
//! events; this crate turns a type tag plus a generic payload into a
//! strongly-typed content value and back.
//!
//! # Components
//!
//! - [`ContentRegistry`]: tag → decoder dispatch table
//! - [`EventContent`]: closed tagged union of known content shapes plus an
//!   unknown-type passthrough
//! - Envelope variants: [`RoomEvent`], [`SyncRoomEvent`],
//!   [`StrippedStateEvent`], [`ToDeviceEvent`]
//! - Identifier newtypes: [`UserId`], [`RoomId`], [`EventId`]
//!
//! Decoding is tolerant by construction: unknown event types and unknown
//! extra fields pass through untouched, so the engine keeps working as the
//! server side evolves.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod content;
mod envelope;
mod error;
mod event_type;
mod identifiers;
mod registry;

pub use content::EventContent;
pub use envelope::{RoomEvent, StrippedStateEvent, SyncRoomEvent, ToDeviceEvent, UnsignedData};
pub use error::DecodeError;
pub use event_type::EventType;
pub use identifiers::{EventId, IdParseError, RoomId, UserId};
pub use registry::{ContentRegistry, DecodeFn};
