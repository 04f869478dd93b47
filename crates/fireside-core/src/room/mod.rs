//! Room projections.
//!
//! Two forms share the `(type, state_key)` indexing rule but differ in
//! lifecycle: [`RoomState`] is mutable and fed incrementally by sync batches,
//! while [`StrippedStateRoom`] is a one-shot read-only invitation preview.

mod state;
mod stripped;

pub use state::{RoomField, RoomState, Tombstone};
pub use stripped::StrippedStateRoom;
