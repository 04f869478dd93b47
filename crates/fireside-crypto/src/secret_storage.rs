//! Secret-storage key descriptions and validation.
//!
//! A key description advertises an algorithm, an IV, and a MAC. A candidate
//! raw key is valid for the description when encrypting 32 zero bytes with
//! keys derived from it reproduces the stored MAC. The MAC comparison is
//! length-first, then constant-time over the compared bytes.

use aes::Aes256;
use aes::cipher::{KeyIvInit, StreamCipher};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::CryptoError;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// The only secret-storage algorithm this client supports.
pub const ALGORITHM_AES_HMAC_SHA2: &str = "m.secret_storage.v1.aes-hmac-sha2";

/// A secret-storage key description, as stored in account data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDescription {
    /// Algorithm identifier; only `m.secret_storage.v1.aes-hmac-sha2` is
    /// supported.
    pub algorithm: String,

    /// Human-readable key name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// AES-CTR IV, base64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,

    /// MAC over the zero-block ciphertext, base64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,

    /// Passphrase derivation metadata; key stretching from passphrases is
    /// the caller's concern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<PassphraseInfo>,
}

/// Passphrase derivation metadata carried alongside a key description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassphraseInfo {
    /// Derivation algorithm, normally `m.pbkdf2`.
    pub algorithm: String,

    /// Derivation salt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,

    /// Iteration count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,

    /// Output size in bits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits: Option<u64>,
}

impl KeyDescription {
    /// Build a description for a raw key with a caller-provided IV.
    ///
    /// The caller must supply cryptographically secure random IV bytes in
    /// production; taking them as a parameter keeps this function pure.
    pub fn for_key(key: &[u8], iv: [u8; 16], name: Option<String>) -> Self {
        let mac = compute_check_mac(key, iv);
        Self {
            algorithm: ALGORITHM_AES_HMAC_SHA2.to_owned(),
            name,
            iv: Some(STANDARD.encode(iv)),
            mac: Some(STANDARD.encode(mac)),
            passphrase: None,
        }
    }
}

/// Check a candidate raw key against a key description.
///
/// Returns `Ok(true)` only when the derived MAC matches the stored one.
/// A missing or malformed IV/MAC fails closed with an error rather than
/// validating.
///
/// # Errors
///
/// - [`CryptoError::UnsupportedAlgorithm`] for any other algorithm
/// - [`CryptoError::MalformedKeyDescription`] for a missing/short IV or MAC
/// - [`CryptoError::InvalidBase64`] for undecodable IV or MAC text
pub fn validate_key(description: &KeyDescription, key: &[u8]) -> Result<bool, CryptoError> {
    if description.algorithm != ALGORITHM_AES_HMAC_SHA2 {
        return Err(CryptoError::UnsupportedAlgorithm {
            algorithm: description.algorithm.clone(),
        });
    }

    let iv_text = description
        .iv
        .as_deref()
        .ok_or(CryptoError::MalformedKeyDescription { field: "iv" })?;
    let iv_bytes = b64_decode(iv_text, "iv")?;
    let iv: [u8; 16] = iv_bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::MalformedKeyDescription { field: "iv" })?;

    let mac_text = description
        .mac
        .as_deref()
        .ok_or(CryptoError::MalformedKeyDescription { field: "mac" })?;
    let stored_mac = b64_decode(mac_text, "mac")?;

    let computed = compute_check_mac(key, iv);

    // Length first, then constant-time over the compared bytes.
    if stored_mac.len() != computed.len() {
        return Ok(false);
    }
    Ok(computed.ct_eq(&stored_mac).into())
}

/// Derive the check MAC for a raw key and IV.
///
/// HKDF-SHA256 over a zero salt and empty info expands the key to 64 bytes:
/// the first half keys AES-256-CTR, the second half keys HMAC-SHA256. The
/// MAC is taken over the encryption of 32 zero bytes.
fn compute_check_mac(key: &[u8], iv: [u8; 16]) -> [u8; 32] {
    let hkdf = Hkdf::<Sha256>::new(Some(&[0u8; 32]), key);
    let mut okm = Zeroizing::new([0u8; 64]);
    let Ok(()) = hkdf.expand(&[], &mut okm[..]) else {
        unreachable!("64 bytes is a valid HKDF-SHA256 output length");
    };

    let mut enc_key = Zeroizing::new([0u8; 32]);
    enc_key.copy_from_slice(&okm[..32]);
    let mut mac_key = Zeroizing::new([0u8; 32]);
    mac_key.copy_from_slice(&okm[32..]);

    let mut block = [0u8; 32];
    let mut cipher = Aes256Ctr::new((&*enc_key).into(), (&iv).into());
    cipher.apply_keystream(&mut block);

    let Ok(mut mac) = HmacSha256::new_from_slice(&*mac_key) else {
        unreachable!("HMAC-SHA256 accepts keys of any length");
    };
    mac.update(&block);
    mac.finalize().into_bytes().into()
}

fn b64_decode(text: &str, field: &'static str) -> Result<Vec<u8>, CryptoError> {
    // Servers are split on padding; accept both forms.
    STANDARD
        .decode(text)
        .or_else(|_| STANDARD_NO_PAD.decode(text))
        .map_err(|_| CryptoError::InvalidBase64 { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    const IV: [u8; 16] = [0x24; 16];

    fn key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn generated_description_validates_its_key() {
        let description = KeyDescription::for_key(&key(), IV, Some("default".to_owned()));
        assert!(validate_key(&description, &key()).unwrap());
    }

    #[test]
    fn single_bit_flip_in_key_fails() {
        let description = KeyDescription::for_key(&key(), IV, None);
        for bit in 0..8 {
            let mut flipped = key();
            flipped[0] ^= 1 << bit;
            assert!(!validate_key(&description, &flipped).unwrap());
        }
    }

    #[test]
    fn tampered_mac_fails() {
        let mut description = KeyDescription::for_key(&key(), IV, None);
        let mut mac = b64_decode(description.mac.as_deref().unwrap(), "mac").unwrap();
        mac[0] ^= 0x80;
        description.mac = Some(STANDARD.encode(mac));
        assert!(!validate_key(&description, &key()).unwrap());
    }

    #[test]
    fn short_mac_fails_closed_as_false() {
        let mut description = KeyDescription::for_key(&key(), IV, None);
        description.mac = Some(STANDARD.encode([0u8; 16]));
        assert!(!validate_key(&description, &key()).unwrap());
    }

    #[test]
    fn missing_iv_is_an_error() {
        let mut description = KeyDescription::for_key(&key(), IV, None);
        description.iv = None;
        assert_eq!(
            validate_key(&description, &key()),
            Err(CryptoError::MalformedKeyDescription { field: "iv" }),
        );
    }

    #[test]
    fn wrong_algorithm_is_an_error() {
        let mut description = KeyDescription::for_key(&key(), IV, None);
        description.algorithm = "m.secret_storage.v2.better".to_owned();
        assert!(matches!(
            validate_key(&description, &key()),
            Err(CryptoError::UnsupportedAlgorithm { .. }),
        ));
    }

    #[test]
    fn unpadded_base64_is_accepted() {
        let description = KeyDescription::for_key(&key(), IV, None);
        let unpadded = KeyDescription {
            iv: description.iv.as_deref().map(|s| s.trim_end_matches('=').to_owned()),
            mac: description.mac.as_deref().map(|s| s.trim_end_matches('=').to_owned()),
            ..description
        };
        assert!(validate_key(&unpadded, &key()).unwrap());
    }

    #[test]
    fn description_survives_json_round_trip() {
        let description = KeyDescription::for_key(&key(), IV, Some("backup".to_owned()));
        let json = serde_json::to_value(&description).unwrap();
        let back: KeyDescription = serde_json::from_value(json).unwrap();
        assert!(validate_key(&back, &key()).unwrap());
    }
}
