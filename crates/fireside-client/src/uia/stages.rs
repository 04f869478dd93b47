//! Stage identifiers and auth-payload builders.
//!
//! Each builder returns only the stage-specific fields; the engine adds
//! `type` and `session` when it assembles the `auth` object.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};

use fireside_crypto::EnrollmentOutput;

/// Classic password login stage.
pub const LOGIN_PASSWORD: &str = "m.login.password";

/// No-op stage used to terminate registration flows.
pub const LOGIN_DUMMY: &str = "m.login.dummy";

/// Terms-of-service acceptance stage.
pub const LOGIN_TERMS: &str = "m.login.terms";

/// Pre-shared registration token stage.
pub const LOGIN_REGISTRATION_TOKEN: &str = "m.login.registration_token";

/// Email sub-flow: ask the server to send a token (login variant).
pub const LOGIN_EMAIL_REQUEST_TOKEN: &str = "m.login.email.request_token";

/// Email sub-flow: submit the received token (login variant).
pub const LOGIN_EMAIL_SUBMIT_TOKEN: &str = "m.login.email.submit_token";

/// Email sub-flow: ask the server to send a token (enrollment variant).
pub const ENROLL_EMAIL_REQUEST_TOKEN: &str = "m.enroll.email.request_token";

/// Email sub-flow: submit the received token (enrollment variant).
pub const ENROLL_EMAIL_SUBMIT_TOKEN: &str = "m.enroll.email.submit_token";

/// App-Store sub-flow: prove an active subscription (login variant).
pub const LOGIN_APP_STORE_SUBSCRIPTION: &str = "m.login.app_store.subscription";

/// App-Store sub-flow: prove an active subscription (enrollment variant).
pub const ENROLL_APP_STORE_SUBSCRIPTION: &str = "m.enroll.app_store.subscription";

/// BS-SPEKE login: send the blinded password point.
pub const LOGIN_BSSPEKE_OPRF: &str = "m.login.bsspeke-ecc.oprf";

/// BS-SPEKE login: prove the derived session key.
pub const LOGIN_BSSPEKE_VERIFY: &str = "m.login.bsspeke-ecc.verify";

/// BS-SPEKE enrollment: send the blinded password point.
pub const ENROLL_BSSPEKE_OPRF: &str = "m.enroll.bsspeke-ecc.oprf";

/// BS-SPEKE enrollment: upload the derived generator and public key.
pub const ENROLL_BSSPEKE_SAVE: &str = "m.enroll.bsspeke-ecc.save";

/// The OPRF stage a rejected second PAKE stage rewinds to.
///
/// A failed verify/save invalidates the blinded ephemeral state, so the
/// exchange must restart from blinding.
pub fn pake_oprf_counterpart(stage: &str) -> Option<&'static str> {
    match stage {
        LOGIN_BSSPEKE_VERIFY => Some(LOGIN_BSSPEKE_OPRF),
        ENROLL_BSSPEKE_SAVE => Some(ENROLL_BSSPEKE_OPRF),
        _ => None,
    }
}

/// `m.login.password` payload.
pub fn password_payload(user_id: &str, password: &str) -> Map<String, Value> {
    object([
        ("identifier", json!({"type": "m.id.user", "user": user_id})),
        ("password", json!(password)),
    ])
}

/// `m.login.registration_token` payload.
pub fn registration_token_payload(token: &str) -> Map<String, Value> {
    object([("token", json!(token))])
}

/// Email request-token payload (both variants).
pub fn email_request_token_payload(email: &str, client_secret: &str) -> Map<String, Value> {
    object([("email", json!(email)), ("client_secret", json!(client_secret))])
}

/// Email submit-token payload (both variants).
pub fn email_submit_token_payload(token: &str, client_secret: &str) -> Map<String, Value> {
    object([("token", json!(token)), ("client_secret", json!(client_secret))])
}

/// App-Store subscription payload; the receipt is opaque to the engine.
pub fn app_store_payload(receipt: &str) -> Map<String, Value> {
    object([("receipt", json!(receipt))])
}

/// BS-SPEKE OPRF payload carrying the blinded point.
pub fn bsspeke_oprf_payload(blind: &[u8; 32]) -> Map<String, Value> {
    object([("curve", json!("ristretto255")), ("blind", json!(STANDARD.encode(blind)))])
}

/// BS-SPEKE login-verify payload.
pub fn bsspeke_verify_payload(client_ephemeral: &[u8; 32], verifier: &[u8; 32]) -> Map<String, Value> {
    object([
        ("A", json!(STANDARD.encode(client_ephemeral))),
        ("verifier", json!(STANDARD.encode(verifier))),
    ])
}

/// BS-SPEKE enrollment-save payload.
pub fn bsspeke_save_payload(enrollment: &EnrollmentOutput) -> Map<String, Value> {
    object([
        ("P", json!(STANDARD.encode(enrollment.generator))),
        ("V", json!(STANDARD.encode(enrollment.public_key))),
    ])
}

fn object<const N: usize>(fields: [(&str, Value); N]) -> Map<String, Value> {
    fields.into_iter().map(|(key, value)| (key.to_owned(), value)).collect()
}
