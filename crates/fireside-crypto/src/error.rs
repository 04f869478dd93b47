//! Crypto error types.
//!
//! Everything here fails closed: a malformed description, a bad checksum, or
//! an invalid curve point is an error or a `false`, never a partial success.

use thiserror::Error;

/// Errors from key validation, recovery-key decoding, and the PAKE client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// A key description declared an algorithm this client does not support.
    #[error("unsupported secret-storage algorithm `{algorithm}`")]
    UnsupportedAlgorithm {
        /// The declared algorithm string.
        algorithm: String,
    },

    /// A key description is missing a required field or has the wrong shape.
    #[error("malformed key description: bad `{field}`")]
    MalformedKeyDescription {
        /// The offending field.
        field: &'static str,
    },

    /// A base64 field failed to decode.
    #[error("invalid base64 in `{field}`")]
    InvalidBase64 {
        /// The offending field.
        field: &'static str,
    },

    /// Recovery-key text failed base58 decoding.
    #[error("recovery key is not valid base58")]
    InvalidBase58,

    /// Recovery-key bytes are too short to hold header, key, and parity.
    #[error("recovery key has wrong length ({actual} bytes)")]
    WrongLength {
        /// Decoded byte count.
        actual: usize,
    },

    /// Recovery-key bytes do not start with the expected header.
    #[error("recovery key has wrong header bytes")]
    WrongHeader,

    /// Recovery-key parity byte did not cancel out.
    #[error("recovery key parity check failed")]
    ParityMismatch,

    /// A compressed curve point failed to decompress.
    #[error("invalid curve point")]
    InvalidPoint,
}
