//! Time-table scheduler.
//!
//! Polled once a minute with the current wall-clock time, it compares
//! the hour and minute against every window edge in the schedule table
//! and reports the edges that match *this exact minute*. Matching is
//! equality, not range containment: a device switched on manually
//! mid-window is not fought by the scheduler, and a missed minute
//! (clock outage) simply loses that edge, which is the accepted
//! failure mode here.
//!
//! The scheduler never touches hardware itself; the control loop maps
//! the returned fires onto the device state machines, which keeps this
//! module a pure function of (time, table) and trivially testable.

use heapless::Vec;
use log::debug;

use crate::app::ports::WallTime;
use crate::schedule::{Device, ScheduleEnable, ScheduleTable, WindowEnable};

/// One matched edge. `Midnight` fires once per day for date-keeping
/// (the irrigation day counter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFire {
    WindowStart { device: Device, enable: WindowEnable },
    WindowEnd { device: Device },
    Midnight,
}

/// Worst case: both edges of all twenty windows plus the midnight tick.
pub type ScheduleFires = Vec<ScheduleFire, 41>;

pub struct TimeTableScheduler {
    /// Minute already processed; ticks are idempotent within it.
    last_minute: Option<(u8, u8)>,
    midnight_done: bool,
}

impl Default for TimeTableScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeTableScheduler {
    pub fn new() -> Self {
        Self {
            last_minute: None,
            midnight_done: false,
        }
    }

    /// Evaluate one wall-clock minute. Safe to call more often than
    /// once a minute; repeats within the same minute return nothing.
    pub fn tick(
        &mut self,
        now: WallTime,
        table: &ScheduleTable,
        enables: &ScheduleEnable,
    ) -> ScheduleFires {
        let mut fires = ScheduleFires::new();
        if self.last_minute == Some((now.hour, now.minute)) {
            return fires;
        }
        self.last_minute = Some((now.hour, now.minute));

        if now.hour == 0 && !self.midnight_done {
            self.midnight_done = true;
            let _ = fires.push(ScheduleFire::Midnight);
        } else if now.hour == 1 {
            self.midnight_done = false;
        }

        for device in Device::ALL {
            if !enables.is_enabled(device) {
                continue;
            }
            for window in table.device_windows(device) {
                if window.enable == WindowEnable::Off {
                    continue;
                }
                if window.starts_at(now.hour, now.minute) {
                    debug!("schedule: {} window start", device.label());
                    let _ = fires.push(ScheduleFire::WindowStart {
                        device,
                        enable: window.enable,
                    });
                }
                if window.ends_at(now.hour, now.minute) {
                    debug!("schedule: {} window end", device.label());
                    let _ = fires.push(ScheduleFire::WindowEnd { device });
                }
            }
        }
        fires
    }
}
