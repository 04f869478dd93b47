//! BS-SPEKE client over ristretto255.
//!
//! The client proves knowledge of a password without transmitting it. Both
//! the enrollment and login variants start the same way: hash the password
//! to a group element, blind it with a random scalar, and send the blinded
//! point. The server evaluates its OPRF key over the blind and returns the
//! result; the client unblinds and stretches it into the secrets the second
//! stage needs.
//!
//! A [`BlindingState`] is ephemeral and single-use: finishing either variant
//! consumes it, and everything password-derived is zeroed on drop. A failed
//! verify therefore always forces a fresh blind.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use serde::Deserialize;
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

const OPRF_LABEL: &[u8] = b"fireside-bsspeke-oprf-v1";
const GENERATOR_LABEL: &[u8] = b"fireside-bsspeke-generator-v1";
const PRIVATE_KEY_LABEL: &[u8] = b"fireside-bsspeke-private-key-v1";
const SESSION_LABEL: &[u8] = b"fireside-bsspeke-session-v1";
const CLIENT_VERIFIER_LABEL: &[u8] = b"client";
const SERVER_VERIFIER_LABEL: &[u8] = b"server";

/// Upper bound on stretch rounds, so hostile stage params cannot stall the
/// client indefinitely.
const MAX_STRETCH_ROUNDS: u64 = 10_000_000;

/// Password-hashing parameters advertised in the OPRF stage params.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PhfParams {
    /// Outer iteration count.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Work blocks per iteration.
    #[serde(default = "default_blocks")]
    pub blocks: u32,
}

fn default_iterations() -> u32 {
    3
}

fn default_blocks() -> u32 {
    100_000
}

impl Default for PhfParams {
    fn default() -> Self {
        Self { iterations: default_iterations(), blocks: default_blocks() }
    }
}

impl PhfParams {
    /// Minimal-work parameters for tests only.
    pub fn insecure_fast() -> Self {
        Self { iterations: 1, blocks: 1 }
    }

    fn rounds(self) -> u64 {
        let rounds = u64::from(self.iterations.max(1)) * u64::from(self.blocks.max(1));
        rounds.min(MAX_STRETCH_ROUNDS)
    }
}

/// Ephemeral client state between blinding and unblinding.
///
/// Single-use: both finish methods take `self` by value. Dropped state is
/// zeroed.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct BlindingState {
    user_id: String,
    server_id: String,
    password: String,
    blind_scalar: Scalar,
}

/// Output of the enrollment variant: the material to store server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentOutput {
    /// The password-derived generator point `P`, compressed.
    pub generator: [u8; 32],
    /// The long-term public key `V = P * v`, compressed.
    pub public_key: [u8; 32],
}

/// Output of the login variant.
pub struct LoginOutput {
    /// The client's ephemeral public point `A`, compressed.
    pub client_ephemeral: [u8; 32],
    /// MAC proving the client derived the shared session key.
    pub verifier: [u8; 32],
    session_key: Zeroizing<[u8; 32]>,
}

impl LoginOutput {
    /// The derived shared session key.
    pub fn session_key(&self) -> &[u8; 32] {
        &self.session_key
    }

    /// The MAC the server must present to prove it derived the same key.
    pub fn expected_server_verifier(&self) -> [u8; 32] {
        keyed_mac(&self.session_key[..], SERVER_VERIFIER_LABEL)
    }
}

/// Blind the password, producing the state and the point to send.
///
/// The caller must provide a cryptographically secure RNG; randomness is an
/// input so the function itself stays deterministic under test RNGs.
pub fn blind<R: RngCore + CryptoRng>(
    user_id: &str,
    server_id: &str,
    password: &str,
    rng: &mut R,
) -> (BlindingState, [u8; 32]) {
    let blind_scalar = nonzero_scalar(rng);
    let base = hash_to_group(OPRF_LABEL, &[user_id.as_bytes(), server_id.as_bytes(), password.as_bytes()]);
    let blinded = (base * blind_scalar).compress().to_bytes();
    let state = BlindingState {
        user_id: user_id.to_owned(),
        server_id: server_id.to_owned(),
        password: password.to_owned(),
        blind_scalar,
    };
    (state, blinded)
}

impl BlindingState {
    /// Finish enrollment: unblind the server's OPRF evaluation and derive
    /// the generator and long-term public key to upload.
    pub fn finish_enrollment(
        self,
        blind_salt: &[u8; 32],
        phf: &PhfParams,
    ) -> Result<EnrollmentOutput, CryptoError> {
        let seed = self.stretched_secret(blind_salt, phf)?;
        let generator = derive_generator(&seed);
        let private_key = derive_private_key(&seed);
        let public_key = generator * private_key;
        Ok(EnrollmentOutput {
            generator: generator.compress().to_bytes(),
            public_key: public_key.compress().to_bytes(),
        })
    }

    /// Finish login: derive the shared session key against the server's
    /// ephemeral point and produce the client verifier.
    pub fn finish_login<R: RngCore + CryptoRng>(
        self,
        blind_salt: &[u8; 32],
        server_ephemeral: &[u8; 32],
        phf: &PhfParams,
        rng: &mut R,
    ) -> Result<LoginOutput, CryptoError> {
        let user_id = self.user_id.clone();
        let server_id = self.server_id.clone();
        let seed = self.stretched_secret(blind_salt, phf)?;
        let generator = derive_generator(&seed);
        let private_key = derive_private_key(&seed);

        let server_point = decompress(server_ephemeral)?;
        let ephemeral_scalar = nonzero_scalar(rng);
        let client_point = generator * ephemeral_scalar;

        // Two shared secrets: one from the ephemeral pair, one binding the
        // long-term key so the server must know V's discrete log relation.
        let shared_ephemeral = server_point * ephemeral_scalar;
        let shared_static = server_point * private_key;

        let session_key = derive_session_key(
            &user_id,
            &server_id,
            &client_point.compress().to_bytes(),
            server_ephemeral,
            &shared_ephemeral.compress().to_bytes(),
            &shared_static.compress().to_bytes(),
        );
        let verifier = keyed_mac(&session_key[..], CLIENT_VERIFIER_LABEL);

        Ok(LoginOutput {
            client_ephemeral: client_point.compress().to_bytes(),
            verifier,
            session_key,
        })
    }

    /// Unblind the OPRF evaluation and stretch it with the password.
    fn stretched_secret(
        self,
        blind_salt: &[u8; 32],
        phf: &PhfParams,
    ) -> Result<Zeroizing<[u8; 64]>, CryptoError> {
        let salt_point = decompress(blind_salt)?;
        let unblinded = salt_point * self.blind_scalar.invert();
        let oprf_output = Zeroizing::new(unblinded.compress().to_bytes());

        let mut state = Zeroizing::new(hmac_sha512(
            &oprf_output[..],
            &[
                self.password.as_bytes(),
                self.user_id.as_bytes(),
                self.server_id.as_bytes(),
            ],
        ));
        for round in 0..phf.rounds() {
            let next = hmac_sha512(&oprf_output[..], &[&state[..], &round.to_be_bytes()]);
            *state = next;
        }
        Ok(state)
    }
}

/// Derive the shared session key from the full transcript.
///
/// The server derives the same value from `(A, B, A*b, V*b)`.
fn derive_session_key(
    user_id: &str,
    server_id: &str,
    client_ephemeral: &[u8; 32],
    server_ephemeral: &[u8; 32],
    shared_ephemeral: &[u8; 32],
    shared_static: &[u8; 32],
) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(SESSION_LABEL);
    for part in [
        user_id.as_bytes(),
        server_id.as_bytes(),
        client_ephemeral,
        server_ephemeral,
        shared_ephemeral,
        shared_static,
    ] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    Zeroizing::new(hasher.finalize().into())
}

fn derive_generator(seed: &[u8; 64]) -> RistrettoPoint {
    hash_to_group(GENERATOR_LABEL, &[&seed[..32]])
}

fn derive_private_key(seed: &[u8; 64]) -> Scalar {
    hash_to_scalar(PRIVATE_KEY_LABEL, &[&seed[32..]])
}

fn hash_to_group(label: &[u8], parts: &[&[u8]]) -> RistrettoPoint {
    RistrettoPoint::from_uniform_bytes(&wide_hash(label, parts))
}

fn hash_to_scalar(label: &[u8], parts: &[&[u8]]) -> Scalar {
    Scalar::from_bytes_mod_order_wide(&wide_hash(label, parts))
}

fn wide_hash(label: &[u8], parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    hasher.update(label);
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> [u8; 64] {
    let Ok(mut mac) = HmacSha512::new_from_slice(key) else {
        unreachable!("HMAC-SHA512 accepts keys of any length");
    };
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

fn keyed_mac(key: &[u8], label: &[u8]) -> [u8; 32] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts keys of any length");
    };
    mac.update(label);
    mac.finalize().into_bytes().into()
}

fn decompress(bytes: &[u8; 32]) -> Result<RistrettoPoint, CryptoError> {
    CompressedRistretto(*bytes).decompress().ok_or(CryptoError::InvalidPoint)
}

fn nonzero_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    loop {
        let scalar = Scalar::random(rng);
        if scalar != Scalar::ZERO {
            return scalar;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = "@alice:x.org";
    const SERVER: &str = "x.org";
    const PASSWORD: &str = "correct horse battery staple";

    fn phf() -> PhfParams {
        PhfParams::insecure_fast()
    }

    /// Server-side OPRF evaluation: `blind * k`.
    fn evaluate_oprf(blind: &[u8; 32], oprf_key: &Scalar) -> [u8; 32] {
        let point = decompress(blind).unwrap();
        (point * oprf_key).compress().to_bytes()
    }

    #[test]
    fn enrollment_is_deterministic_for_fixed_oprf_key() {
        let mut rng = rand::thread_rng();
        let oprf_key = nonzero_scalar(&mut rng);

        let (state_a, blind_a) = blind(USER, SERVER, PASSWORD, &mut rng);
        let enroll_a = state_a
            .finish_enrollment(&evaluate_oprf(&blind_a, &oprf_key), &phf())
            .unwrap();

        let (state_b, blind_b) = blind(USER, SERVER, PASSWORD, &mut rng);
        let enroll_b = state_b
            .finish_enrollment(&evaluate_oprf(&blind_b, &oprf_key), &phf())
            .unwrap();

        // Different blinds, same unblinded OPRF output, same stored material.
        assert_ne!(blind_a, blind_b);
        assert_eq!(enroll_a, enroll_b);
    }

    #[test]
    fn login_verifier_matches_server_derivation() {
        let mut rng = rand::thread_rng();
        let oprf_key = nonzero_scalar(&mut rng);

        // Enrollment.
        let (state, blind_point) = blind(USER, SERVER, PASSWORD, &mut rng);
        let enrolled = state
            .finish_enrollment(&evaluate_oprf(&blind_point, &oprf_key), &phf())
            .unwrap();

        // Login: server picks an ephemeral b over the stored generator P.
        let generator = decompress(&enrolled.generator).unwrap();
        let public_key = decompress(&enrolled.public_key).unwrap();
        let server_scalar = nonzero_scalar(&mut rng);
        let server_ephemeral = (generator * server_scalar).compress().to_bytes();

        let (state, blind_point) = blind(USER, SERVER, PASSWORD, &mut rng);
        let login = state
            .finish_login(
                &evaluate_oprf(&blind_point, &oprf_key),
                &server_ephemeral,
                &phf(),
                &mut rng,
            )
            .unwrap();

        // Server side: A*b and V*b.
        let client_point = decompress(&login.client_ephemeral).unwrap();
        let shared_ephemeral = (client_point * server_scalar).compress().to_bytes();
        let shared_static = (public_key * server_scalar).compress().to_bytes();
        let server_session_key = derive_session_key(
            USER,
            SERVER,
            &login.client_ephemeral,
            &server_ephemeral,
            &shared_ephemeral,
            &shared_static,
        );

        assert_eq!(login.session_key(), &*server_session_key);
        assert_eq!(login.verifier, keyed_mac(&server_session_key[..], CLIENT_VERIFIER_LABEL));
        assert_eq!(
            login.expected_server_verifier(),
            keyed_mac(&server_session_key[..], SERVER_VERIFIER_LABEL),
        );
    }

    #[test]
    fn wrong_password_produces_wrong_verifier() {
        let mut rng = rand::thread_rng();
        let oprf_key = nonzero_scalar(&mut rng);

        let (state, blind_point) = blind(USER, SERVER, PASSWORD, &mut rng);
        let enrolled = state
            .finish_enrollment(&evaluate_oprf(&blind_point, &oprf_key), &phf())
            .unwrap();

        let generator = decompress(&enrolled.generator).unwrap();
        let public_key = decompress(&enrolled.public_key).unwrap();
        let server_scalar = nonzero_scalar(&mut rng);
        let server_ephemeral = (generator * server_scalar).compress().to_bytes();

        let (state, blind_point) = blind(USER, SERVER, "wrong password", &mut rng);
        let login = state
            .finish_login(
                &evaluate_oprf(&blind_point, &oprf_key),
                &server_ephemeral,
                &phf(),
                &mut rng,
            )
            .unwrap();

        let client_point = decompress(&login.client_ephemeral).unwrap();
        let shared_ephemeral = (client_point * server_scalar).compress().to_bytes();
        let shared_static = (public_key * server_scalar).compress().to_bytes();
        let server_session_key = derive_session_key(
            USER,
            SERVER,
            &login.client_ephemeral,
            &server_ephemeral,
            &shared_ephemeral,
            &shared_static,
        );

        assert_ne!(login.verifier, keyed_mac(&server_session_key[..], CLIENT_VERIFIER_LABEL));
    }

    #[test]
    fn invalid_blind_salt_is_rejected() {
        let mut rng = rand::thread_rng();
        let (state, _) = blind(USER, SERVER, PASSWORD, &mut rng);
        // Not a valid ristretto encoding.
        let bogus = [0xFF; 32];
        assert_eq!(
            state.finish_enrollment(&bogus, &phf()).unwrap_err(),
            CryptoError::InvalidPoint,
        );
    }

    #[test]
    fn phf_params_decode_tolerantly() {
        let params: PhfParams = serde_json::from_value(serde_json::json!({
            "iterations": 2,
            "blocks": 16,
            "name": "hmac-sha512",
        }))
        .unwrap();
        assert_eq!(params, PhfParams { iterations: 2, blocks: 16 });

        let defaults: PhfParams = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(defaults, PhfParams::default());
    }
}
