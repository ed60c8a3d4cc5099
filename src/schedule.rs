//! Time-table data model: per-device scheduled windows.
//!
//! Five devices, four windows each, serialized as the fixed-width colon
//! string `enable:startH:startM:endH:endM` repeated device-major — the
//! layout the previous controller persisted, kept for compatibility.
//!
//! Two fields are overloaded, as they were in the original table:
//! the east-valve duty value rides in the last east-valve window's
//! start-hour field, and the irrigation day interval / day counter ride
//! in the first irrigation window's end-hour / end-minute fields.

use core::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::config::split_ints;
use crate::error::ParseError;

pub const DEVICE_COUNT: usize = 5;
pub const WINDOWS_PER_DEVICE: usize = 4;
const TOTAL_WINDOWS: usize = DEVICE_COUNT * WINDOWS_PER_DEVICE;
const FIELDS_PER_WINDOW: usize = 5;

// ───────────────────────────────────────────────────────────────
// Devices
// ───────────────────────────────────────────────────────────────

/// Scheduled devices, in persisted table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Device {
    CookingPower = 0,
    Irrigation = 1,
    EastValve = 2,
    HeatPump = 3,
    Ventilation = 4,
}

impl Device {
    pub const ALL: [Device; DEVICE_COUNT] = [
        Device::CookingPower,
        Device::Irrigation,
        Device::EastValve,
        Device::HeatPump,
        Device::Ventilation,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::CookingPower => "cooking",
            Self::Irrigation => "irrigation",
            Self::EastValve => "east-valve",
            Self::HeatPump => "heat-pump",
            Self::Ventilation => "ventilation",
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Windows
// ───────────────────────────────────────────────────────────────

/// Window enable state. `FastOn` is only meaningful for ventilation,
/// where it requests the fast-board speed during the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WindowEnable {
    Off = 0,
    On = 1,
    FastOn = 2,
}

impl WindowEnable {
    fn from_wire(v: u32) -> Result<Self, ParseError> {
        match v {
            0 => Ok(Self::Off),
            1 => Ok(Self::On),
            2 => Ok(Self::FastOn),
            _ => Err(ParseError::OutOfRange("window enable 0-2")),
        }
    }
}

/// One scheduled interval. Matching is exact-minute on the start and
/// end instants, never range containment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub enable: WindowEnable,
    pub start_hour: u8,
    pub start_min: u8,
    pub end_hour: u8,
    pub end_min: u8,
}

impl TimeWindow {
    pub const OFF: TimeWindow = TimeWindow {
        enable: WindowEnable::Off,
        start_hour: 0,
        start_min: 0,
        end_hour: 0,
        end_min: 0,
    };

    pub fn starts_at(&self, hour: u8, minute: u8) -> bool {
        self.start_hour == hour && self.start_min == minute
    }

    pub fn ends_at(&self, hour: u8, minute: u8) -> bool {
        self.end_hour == hour && self.end_min == minute
    }
}

// ───────────────────────────────────────────────────────────────
// Schedule table
// ───────────────────────────────────────────────────────────────

/// The full five-device time table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTable {
    windows: [[TimeWindow; WINDOWS_PER_DEVICE]; DEVICE_COUNT],
}

impl Default for ScheduleTable {
    fn default() -> Self {
        Self {
            windows: [[TimeWindow::OFF; WINDOWS_PER_DEVICE]; DEVICE_COUNT],
        }
    }
}

impl ScheduleTable {
    pub fn window(&self, device: Device, idx: usize) -> &TimeWindow {
        &self.windows[device.index()][idx]
    }

    pub fn window_mut(&mut self, device: Device, idx: usize) -> &mut TimeWindow {
        &mut self.windows[device.index()][idx]
    }

    pub fn device_windows(&self, device: Device) -> &[TimeWindow; WINDOWS_PER_DEVICE] {
        &self.windows[device.index()]
    }

    /// East-valve duty in steps (0..=20), stored in the last east-valve
    /// window's start-hour field.
    pub fn east_valve_duty(&self) -> u8 {
        self.windows[Device::EastValve.index()][WINDOWS_PER_DEVICE - 1]
            .start_hour
            .min(crate::devices::east_valve::STEPS_PER_PERIOD)
    }

    /// Remote-valve pulse interval in days (irrigation window 0 end-hour).
    pub fn irrigation_day_interval(&self) -> u8 {
        self.windows[Device::Irrigation.index()][0].end_hour
    }

    /// Days elapsed since the last remote-valve pulse (irrigation
    /// window 0 end-minute, persisted with the table).
    pub fn irrigation_day_counter(&self) -> u8 {
        self.windows[Device::Irrigation.index()][0].end_min
    }

    /// Update the persisted day counter. Clamped to the minute-field
    /// range the wire format can carry.
    pub fn set_irrigation_day_counter(&mut self, days: u8) {
        self.windows[Device::Irrigation.index()][0].end_min = days.min(59);
    }

    /// Parse the persisted table string: 20 windows, 5 fields each.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let f = split_ints::<{ TOTAL_WINDOWS * FIELDS_PER_WINDOW }>(
            s,
            TOTAL_WINDOWS * FIELDS_PER_WINDOW,
        )?;
        let mut table = Self::default();
        for (slot, chunk) in f.chunks_exact(FIELDS_PER_WINDOW).enumerate() {
            let (dev, idx) = (slot / WINDOWS_PER_DEVICE, slot % WINDOWS_PER_DEVICE);
            if chunk[1] > 23 || chunk[3] > 23 {
                return Err(ParseError::OutOfRange("hour 0-23"));
            }
            if chunk[2] > 59 || chunk[4] > 59 {
                return Err(ParseError::OutOfRange("minute 0-59"));
            }
            table.windows[dev][idx] = TimeWindow {
                enable: WindowEnable::from_wire(chunk[0])?,
                start_hour: chunk[1] as u8,
                start_min: chunk[2] as u8,
                end_hour: chunk[3] as u8,
                end_min: chunk[4] as u8,
            };
        }
        Ok(table)
    }

    /// Encode to the persisted colon string.
    pub fn encode(&self) -> heapless::String<512> {
        let mut out = heapless::String::new();
        for (dev, windows) in self.windows.iter().enumerate() {
            for (idx, w) in windows.iter().enumerate() {
                let last = dev == DEVICE_COUNT - 1 && idx == WINDOWS_PER_DEVICE - 1;
                let _ = write!(
                    out,
                    "{}:{}:{}:{}:{}{}",
                    w.enable as u8,
                    w.start_hour,
                    w.start_min,
                    w.end_hour,
                    w.end_min,
                    if last { "" } else { ":" },
                );
            }
        }
        out
    }
}

// ───────────────────────────────────────────────────────────────
// Global per-device scheduler gate
// ───────────────────────────────────────────────────────────────

/// One boolean per device gating whether the scheduler may act on that
/// device's windows at all, independent of the windows themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEnable {
    flags: [bool; DEVICE_COUNT],
}

impl Default for ScheduleEnable {
    fn default() -> Self {
        Self {
            flags: [false; DEVICE_COUNT],
        }
    }
}

impl ScheduleEnable {
    pub const fn all_on() -> Self {
        Self {
            flags: [true; DEVICE_COUNT],
        }
    }

    pub fn is_enabled(&self, device: Device) -> bool {
        self.flags[device.index()]
    }

    pub fn set(&mut self, device: Device, enabled: bool) {
        self.flags[device.index()] = enabled;
    }

    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let f = split_ints::<DEVICE_COUNT>(s, DEVICE_COUNT)?;
        let mut e = Self::default();
        for (flag, v) in e.flags.iter_mut().zip(f.iter()) {
            *flag = *v != 0;
        }
        Ok(e)
    }

    pub fn encode(&self) -> heapless::String<16> {
        let mut out = heapless::String::new();
        for (i, flag) in self.flags.iter().enumerate() {
            let _ = write!(
                out,
                "{}{}",
                u8::from(*flag),
                if i == DEVICE_COUNT - 1 { "" } else { ":" },
            );
        }
        out
    }
}
