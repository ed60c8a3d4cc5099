//! Mock adapters for integration tests.
//!
//! Records every relay write and published message so tests can assert
//! on the full history without touching real GPIO or flash.

use std::cell::Cell;
use std::collections::HashMap;

use homectrl::app::ports::{
    Channel, ClockPort, IoPort, MessagePort, StorageError, StorageKey, StoragePort, WallTime,
};
use homectrl::lines::{InputLine, OutputLine};

// ── MockIo ────────────────────────────────────────────────────

pub struct MockIo {
    outputs: [bool; 8],
    contacts: [bool; 3],
    pub writes: Vec<(OutputLine, bool)>,
}

#[allow(dead_code)]
impl MockIo {
    pub fn new() -> Self {
        Self {
            outputs: [false; 8],
            contacts: [false; 3],
            writes: Vec::new(),
        }
    }

    pub fn on(&self, line: OutputLine) -> bool {
        self.outputs[line as usize]
    }

    pub fn set_contact(&mut self, line: InputLine, closed: bool) {
        self.contacts[line as usize] = closed;
    }
}

impl Default for MockIo {
    fn default() -> Self {
        Self::new()
    }
}

impl IoPort for MockIo {
    fn write(&mut self, line: OutputLine, on: bool) {
        self.outputs[line as usize] = on;
        self.writes.push((line, on));
    }

    fn read_output(&self, line: OutputLine) -> bool {
        self.outputs[line as usize]
    }

    fn read_contact(&self, line: InputLine) -> bool {
        self.contacts[line as usize]
    }
}

// ── RecordingBus ──────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingBus {
    pub messages: Vec<(Channel, String)>,
}

#[allow(dead_code)]
impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent payload published on `channel`.
    pub fn last_on(&self, channel: Channel) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|(c, _)| *c == channel)
            .map(|(_, p)| p.as_str())
    }

    pub fn count_on(&self, channel: Channel) -> usize {
        self.messages.iter().filter(|(c, _)| *c == channel).count()
    }
}

impl MessagePort for RecordingBus {
    fn publish(&mut self, channel: Channel, payload: &str) {
        self.messages.push((channel, payload.to_string()));
    }
}

// ── MemoryNvs ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryNvs {
    store: HashMap<&'static str, String>,
    /// When set, every save fails; the controller must retry later.
    pub fail_saves: bool,
}

#[allow(dead_code)]
impl MemoryNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: StorageKey) -> Option<&str> {
        self.store.get(key.name()).map(String::as_str)
    }
}

impl StoragePort for MemoryNvs {
    fn load(&self, key: StorageKey) -> Result<String, StorageError> {
        self.store
            .get(key.name())
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    fn save(&mut self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        if self.fail_saves {
            return Err(StorageError::IoError);
        }
        self.store.insert(key.name(), value.to_string());
        Ok(())
    }
}

// ── TestClock ─────────────────────────────────────────────────

/// Wall clock the test script sets by hand. `None` simulates an
/// unsynced clock (the scheduler must idle).
pub struct TestClock {
    time: Cell<Option<WallTime>>,
}

#[allow(dead_code)]
impl TestClock {
    pub fn unsynced() -> Self {
        Self {
            time: Cell::new(None),
        }
    }

    pub fn at(hour: u8, minute: u8) -> Self {
        let clock = Self::unsynced();
        clock.set(hour, minute);
        clock
    }

    pub fn set(&self, hour: u8, minute: u8) {
        self.time.set(Some(WallTime { hour, minute }));
    }
}

impl ClockPort for TestClock {
    fn wall_time(&self) -> Option<WallTime> {
        self.time.get()
    }
}
