//! Client engine
//!
//! The outward-facing crate of the Fireside engine: the interactive-
//! authentication (UIA) state machine with its BS-SPEKE, email, and
//! App-Store sub-flows, the transport and persistence collaborator traits,
//! and the [`ClientSession`] that drives sync and owns room state.
//!
//! # Architecture
//!
//! Protocol logic is pure state-machine code; I/O happens only through the
//! [`Transport`] and [`StateStore`] traits the caller implements. The
//! engine issues one request per logical operation and never retries —
//! retry and backoff policy belong to the transport.
//!
//! # Components
//!
//! - [`UiaSession`]: multi-stage authentication negotiation
//! - [`uia::stages`]: stage ids and auth-payload builders
//! - [`ClientSession`]: sync loop over [`fireside_core`] room state
//! - [`Transport`] / [`StateStore`]: collaborator seams
//! - [`MemoryStore`]: in-memory store for tests and ephemeral sessions

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod session;
mod store;
mod transport;
pub mod uia;

pub use error::ClientError;
pub use session::{ClientSession, SyncOutcome};
pub use store::{MemoryStore, StateStore, StoreError, StoreKey};
pub use transport::{HttpResponse, Transport, TransportError};
pub use uia::{AuthFailure, UiaServerState, UiaSession, UiaState};
