//! Room state machines
//!
//! Pure, sans-IO projections of server-delivered events into queryable room
//! state. The caller (transport/session owner) feeds decoded events in; this
//! crate folds them and reports which fields changed. No network, no clocks,
//! no global mutable state: every instance is owned by its caller and must
//! have a single logical mutator at a time. Concurrent reads of a snapshot
//! are always safe.
//!
//! # Components
//!
//! - [`RoomState`]: mutable joined-room projection with a
//!   last-applied-wins `(type, state_key)` index and five disjoint
//!   membership sets
//! - [`StrippedStateRoom`]: one-shot read-only invitation preview
//! - [`SyncApplier`]: applies a sync batch in state → timeline →
//!   account-data order, idempotently

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod room;
mod sync;

pub use error::RoomError;
pub use room::{RoomField, RoomState, StrippedStateRoom, Tombstone};
pub use sync::{AppliedSync, RoomUpdates, SyncApplier};
