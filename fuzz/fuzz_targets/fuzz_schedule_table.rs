//! Fuzz target: `ScheduleTable::parse`
//!
//! Drives arbitrary byte sequences through the persisted-table parser
//! and asserts:
//! - No panics under any input
//! - Accepted tables always re-encode to a string that parses back to
//!   the same table (the persistence path is lossless)
//! - Accepted tables never carry out-of-range hours or minutes
//!
//! cargo fuzz run fuzz_schedule_table

#![no_main]

use homectrl::schedule::{Device, ScheduleTable, WINDOWS_PER_DEVICE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(table) = ScheduleTable::parse(s) {
        for device in Device::ALL {
            for idx in 0..WINDOWS_PER_DEVICE {
                let w = table.window(device, idx);
                assert!(w.start_hour <= 23 && w.end_hour <= 23);
                assert!(w.start_min <= 59 && w.end_min <= 59);
            }
        }

        let reparsed = ScheduleTable::parse(&table.encode())
            .expect("encoded table must always parse");
        assert_eq!(reparsed, table, "encode/parse must be lossless");
    }
});
