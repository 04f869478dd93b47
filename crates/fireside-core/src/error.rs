//! Error types for room construction and state folding.

use thiserror::Error;

use fireside_proto::{DecodeError, RoomId};

/// Errors produced while constructing or updating a room.
#[derive(Debug, Error)]
pub enum RoomError {
    /// The initial state batch carried no `m.room.create` event.
    ///
    /// Fatal to the room object: a room cannot exist without its creation
    /// event, which pins the version and predecessor.
    #[error("initial state for {room_id} is missing the m.room.create event")]
    MissingCreateEvent {
        /// The room that could not be constructed.
        room_id: RoomId,
    },

    /// A stored snapshot could not be decoded back into a room.
    #[error("room snapshot is malformed: {reason}")]
    MalformedSnapshot {
        /// What was wrong with the snapshot.
        reason: String,
    },

    /// An event inside a snapshot failed to decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
