//! Client error taxonomy.
//!
//! Local ordering mistakes (`WrongStageOrder`, `FlowNotOffered`) are caller
//! bugs detected before any network call. `AuthRejected` is the server
//! declining a stage; it may rewind the stage list but never silently
//! retries. Transport and store failures pass through uninterpreted.

use thiserror::Error;

use fireside_core::RoomError;
use fireside_crypto::CryptoError;
use fireside_proto::DecodeError;

use crate::store::StoreError;
use crate::transport::TransportError;

/// Errors surfaced by the UIA engine and client session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A stage was attempted that is not the head of the remaining list.
    ///
    /// Detected locally; no request is sent.
    #[error("stage `{attempted}` attempted out of order (expected {expected:?})")]
    WrongStageOrder {
        /// The stage the caller tried to run.
        attempted: String,
        /// The stage the flow requires next, if any remain.
        expected: Option<String>,
    },

    /// The selected flow is not among those the server advertised.
    #[error("selected flow is not offered by the server")]
    FlowNotOffered,

    /// An operation was invoked in a state that does not permit it.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The state that rejected it.
        state: &'static str,
    },

    /// The server rejected a stage attempt (401 without completion, or 403).
    ///
    /// Surface to users as "wrong password / wrong key" without server
    /// detail; the session stays in progress unless the server said
    /// otherwise.
    #[error("server rejected stage `{stage}`")]
    AuthRejected {
        /// The rejected stage.
        stage: String,
        /// Server error code, when given.
        errcode: Option<String>,
        /// Server error message, when given.
        error: Option<String>,
    },

    /// The server answered with a status the protocol does not allow here.
    ///
    /// Fatal to the session.
    #[error("unexpected HTTP status {status}")]
    UnexpectedStatus {
        /// The offending status code.
        status: u16,
    },

    /// A stage's advertised parameters are missing or unusable.
    #[error("stage `{stage}` has missing or invalid param `{param}`")]
    InvalidStageParam {
        /// The stage whose params were consulted.
        stage: String,
        /// The offending parameter.
        param: &'static str,
    },

    /// A request is already in flight on this session or room.
    #[error("operation already in progress")]
    Busy,

    /// The session was canceled; no further state advancement happens.
    #[error("session canceled")]
    Canceled,

    /// Transport failure, passed through uninterpreted.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Store failure, passed through uninterpreted.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An event or response body failed to decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A room could not be constructed or updated.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A cryptographic operation failed or failed validation.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
