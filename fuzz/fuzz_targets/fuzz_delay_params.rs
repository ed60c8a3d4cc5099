//! Fuzz target: `DelayParams::parse` and `PersistentState::parse`
//!
//! Both documents come back from flash, where any previous firmware
//! revision (or corruption) may have left anything. Asserts:
//! - No panics under any input
//! - Accepted values round-trip through encode/parse
//! - The legacy seven-field layout always yields security enabled
//!
//! cargo fuzz run fuzz_delay_params

#![no_main]

use homectrl::config::{DelayParams, PersistentState};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(params) = DelayParams::parse(s) {
        let reparsed = DelayParams::parse(&params.encode())
            .expect("encoded params must always parse");
        assert_eq!(reparsed, params);

        if s.trim().trim_end_matches(':').split(':').count() == 7 {
            assert!(params.pressurizer_security, "legacy layout defaults security on");
        }
    }

    if let Ok(state) = PersistentState::parse(s) {
        assert!(state.ventilation_cmd <= 3);
        let reparsed = PersistentState::parse(&state.encode())
            .expect("encoded state must always parse");
        assert_eq!(reparsed, state);
    }
});
