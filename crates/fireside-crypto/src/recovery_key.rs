//! Human-presentable recovery-key codec.
//!
//! A recovery key is `header (2 bytes) || key bytes || parity (1 byte)`
//! encoded as base58. The parity byte is the running XOR of every preceding
//! byte, so the XOR over the whole decoded buffer must be zero.

use crate::error::CryptoError;

/// Fixed two-byte header identifying recovery-key material.
const HEADER: [u8; 2] = [0x8b, 0x01];

/// Encode raw key bytes as base58 recovery-key text.
pub fn encode(key: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(HEADER.len() + key.len() + 1);
    bytes.extend_from_slice(&HEADER);
    bytes.extend_from_slice(key);
    let parity = bytes.iter().fold(0u8, |acc, byte| acc ^ byte);
    bytes.push(parity);
    bs58::encode(bytes).into_string()
}

/// Decode recovery-key text back into raw key bytes.
///
/// Whitespace anywhere in the input is tolerated and stripped. The header
/// and parity are validated before anything is returned; on any mismatch
/// the whole input is rejected.
///
/// # Errors
///
/// - [`CryptoError::InvalidBase58`] for text outside the base58 alphabet
/// - [`CryptoError::WrongLength`] when too short to hold any key bytes
/// - [`CryptoError::WrongHeader`] when the header bytes differ
/// - [`CryptoError::ParityMismatch`] when the cumulative XOR is non-zero
pub fn decode(text: &str) -> Result<Vec<u8>, CryptoError> {
    let stripped: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = bs58::decode(&stripped).into_vec().map_err(|_| CryptoError::InvalidBase58)?;

    if bytes.len() < HEADER.len() + 2 {
        return Err(CryptoError::WrongLength { actual: bytes.len() });
    }
    if bytes[..HEADER.len()] != HEADER {
        return Err(CryptoError::WrongHeader);
    }
    if bytes.iter().fold(0u8, |acc, byte| acc ^ byte) != 0 {
        return Err(CryptoError::ParityMismatch);
    }

    Ok(bytes[HEADER.len()..bytes.len() - 1].to_vec())
}
