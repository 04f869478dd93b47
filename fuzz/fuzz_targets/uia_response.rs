//! Fuzz target for UIA server-state parsing.
//!
//! The 401 body is attacker-influenced; parsing is tolerant by design and
//! must NEVER panic regardless of shape.

#![no_main]

use libfuzzer_sys::fuzz_target;

use fireside_client::UiaServerState;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return;
    };

    let state = UiaServerState::from_response(&value);

    // Every advertised flow must be a plain list of stage strings.
    for flow in &state.flows {
        for stage in flow {
            let _ = state.stage_params(stage);
        }
    }
});
