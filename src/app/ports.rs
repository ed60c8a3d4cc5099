//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! Driven adapters (I/O lines, storage, message bus, wall clock)
//! implement these traits. The
//! [`Controller`](super::service::Controller) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! ## Context discipline
//!
//! [`StoragePort`] is only ever reachable from main-loop code. Timer
//! expiry handlers receive a [`Restricted`] handle instead, which
//! carries the I/O port, the timer engine, and a [`MessageBudget`]
//! that delivers at most one publish per invocation. The missing
//! storage access is the point: the type makes the forbidden
//! operations unreachable rather than merely documented.

use core::fmt;

use crate::lines::{InputLine, OutputLine};
use crate::timers::TimerEngine;

// ───────────────────────────────────────────────────────────────
// I/O port (driven adapter: domain → relays / contacts)
// ───────────────────────────────────────────────────────────────

/// Relay outputs and normalized input contacts.
///
/// `write(line, true)` always means "device on" in the logical sense;
/// electrical inversion (the heat-pump contactor is normally closed)
/// is the adapter's business.
pub trait IoPort {
    fn write(&mut self, line: OutputLine, on: bool);

    /// Read back the commanded state of an output (for the status snapshot).
    fn read_output(&self, line: OutputLine) -> bool;

    /// Read an input contact, active state already normalized.
    fn read_contact(&self, line: InputLine) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Keys for the persisted colon-string documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey {
    Schedule,
    ScheduleEnable,
    DelayParams,
    DeviceState,
}

impl StorageKey {
    /// NVS key name. Stable across firmware versions.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::ScheduleEnable => "sched_enable",
            Self::DelayParams => "delays",
            Self::DeviceState => "devices",
        }
    }
}

/// Persistent string storage. Main-loop context only — no handle to an
/// implementation is ever passed into a timer or interrupt path.
pub trait StoragePort {
    fn load(&self, key: StorageKey) -> Result<String, StorageError>;

    /// Write atomically: a power cut mid-save must leave the old value.
    fn save(&mut self, key: StorageKey, value: &str) -> Result<(), StorageError>;
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist (first boot).
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Message port (driven adapter: domain → status bus)
// ───────────────────────────────────────────────────────────────

/// Logical status/command channels. The transport (MQTT topics, serial,
/// whatever) is the adapter's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Ventilation mode as its numeric value ("0".."5").
    VmcStatus,
    /// Oven relay status ("on"/"off").
    CookingStatus,
    /// Pressurizer fault: "on" recoverable, "on2" non-recoverable, "off" clear.
    PressurizerFault,
    /// Security monitor trip ("tripped").
    PressurizerSecurity,
    /// Heat-pump infrared command ("on"/"off").
    PacIr,
    /// Ventilation fast-speed auxiliary board pulse ("on"/"off").
    FastBoard,
    /// Remote garden valve pulse ("on"/"off").
    RemoteValve,
    /// Composite output-line snapshot.
    Status,
}

impl Channel {
    pub const fn name(self) -> &'static str {
        match self {
            Self::VmcStatus => "vmc/status",
            Self::CookingStatus => "cooking/status",
            Self::PressurizerFault => "pressurizer/fault",
            Self::PressurizerSecurity => "pressurizer/security",
            Self::PacIr => "pac/ir",
            Self::FastBoard => "vmc/fastboard",
            Self::RemoteValve => "valve/remote",
            Self::Status => "status",
        }
    }
}

/// Outbound status publication.
pub trait MessagePort {
    fn publish(&mut self, channel: Channel, payload: &str);
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: wall time for the scheduler)
// ───────────────────────────────────────────────────────────────

/// Local wall-clock time, daylight offset already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallTime {
    pub hour: u8,
    pub minute: u8,
}

pub trait ClockPort {
    /// Current local time, or `None` before the clock is synced.
    fn wall_time(&self) -> Option<WallTime>;
}

// ───────────────────────────────────────────────────────────────
// Restricted execution context
// ───────────────────────────────────────────────────────────────

/// Publication handle rationed to one message per restricted invocation.
///
/// Rapid duplicate sends from a timer callback overflowed the callback
/// task's stack on the previous controller; the budget makes that class
/// of bug unrepresentable. Excess publishes are dropped and logged.
pub struct MessageBudget<'a, M: MessagePort> {
    bus: &'a mut M,
    spent: bool,
}

impl<'a, M: MessagePort> MessageBudget<'a, M> {
    pub fn new(bus: &'a mut M) -> Self {
        Self { bus, spent: false }
    }

    pub fn publish(&mut self, channel: Channel, payload: &str) {
        if self.spent {
            log::debug!(
                "message budget exhausted, dropping {}='{}'",
                channel.name(),
                payload
            );
            return;
        }
        self.spent = true;
        self.bus.publish(channel, payload);
    }
}

/// The handle passed to timer-expiry handlers.
///
/// Flag flips, relay writes, timer rearms and one publish — nothing
/// else. Storage and the display are only reachable from the main loop.
pub struct Restricted<'a, IO: IoPort, M: MessagePort> {
    pub io: &'a mut IO,
    pub bus: MessageBudget<'a, M>,
    pub timers: &'a mut TimerEngine,
    pub now_ms: u64,
}

impl<'a, IO: IoPort, M: MessagePort> Restricted<'a, IO, M> {
    pub fn new(io: &'a mut IO, bus: &'a mut M, timers: &'a mut TimerEngine, now_ms: u64) -> Self {
        Self {
            io,
            bus: MessageBudget::new(bus),
            timers,
            now_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingBus(Vec<(Channel, String)>);

    impl MessagePort for RecordingBus {
        fn publish(&mut self, channel: Channel, payload: &str) {
            self.0.push((channel, payload.to_string()));
        }
    }

    #[test]
    fn budget_allows_exactly_one_publish() {
        let mut bus = RecordingBus(Vec::new());
        let mut budget = MessageBudget::new(&mut bus);
        budget.publish(Channel::PacIr, "on");
        budget.publish(Channel::PacIr, "on");
        budget.publish(Channel::FastBoard, "off");
        assert_eq!(bus.0.len(), 1);
        assert_eq!(bus.0[0], (Channel::PacIr, "on".to_string()));
    }
}
