//! Fuzz target for the recovery-key codec.
//!
//! Recovery keys are typed by hand, so the decoder sees arbitrary hostile
//! text. It should NEVER panic, and anything it accepts must re-encode to a
//! string that decodes to the same bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;

use fireside_crypto::recovery_key;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(key) = recovery_key::decode(text) {
        let reencoded = recovery_key::encode(&key);
        assert_eq!(recovery_key::decode(&reencoded).ok().as_deref(), Some(key.as_slice()));
    }
});
