//! Fuzz target: `Command::parse`
//!
//! Splits the fuzz input into a (topic, payload) pair and drives the
//! command-bus parser. Asserts that it never panics and that every
//! accepted command came from one of the known topics.
//!
//! cargo fuzz run fuzz_command

#![no_main]

use homectrl::app::Command;
use libfuzzer_sys::fuzz_target;

const TOPICS: &[&str] = &[
    "watering",
    "tank",
    "cooking",
    "vmc",
    "pac",
    "east-valve",
    "rearm",
    "schedule",
    "schedule/enable",
    "delays",
    "status",
];

fuzz_target!(|data: &[u8]| {
    let Ok(s) = core::str::from_utf8(data) else {
        return;
    };

    // First line is the topic, the rest is the payload.
    let (topic, payload) = match s.split_once('\n') {
        Some(pair) => pair,
        None => (s, ""),
    };

    if Command::parse(topic, payload).is_ok() {
        assert!(
            TOPICS.contains(&topic),
            "accepted command from unknown topic {topic:?}"
        );
    }
});
