//! Time adapter: monotonic milliseconds and the scheduler's wall clock.
//!
//! - **`target_os = "espidf"`** — monotonic time wraps
//!   `esp_timer_get_time()`; wall time comes from the SNTP-synced system
//!   clock via `gettimeofday`/`localtime_r`.
//! - **`not(target_os = "espidf")`** — `std::time::Instant` for uptime,
//!   no wall clock (the scheduler simply idles in simulation).
//!
//! The daylight-saving flag from the delay parameters is applied here
//! as a plain +1 h offset, the way the site has always run it.

use crate::app::ports::{ClockPort, WallTime};

pub struct ClockAdapter {
    /// Daylight-saving offset, +1 h when set.
    summer_time: bool,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl ClockAdapter {
    pub fn new(summer_time: bool) -> Self {
        Self {
            summer_time,
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    pub fn set_summer_time(&mut self, summer_time: bool) {
        self.summer_time = summer_time;
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    #[cfg(target_os = "espidf")]
    fn raw_wall_time(&self) -> Option<WallTime> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        // Reject obviously unsynced time (before 2020-01-01).
        const EPOCH_2020: i64 = 1_577_836_800;
        if tv.tv_sec < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        if !(0..=23).contains(&tm.tm_hour) || !(0..=59).contains(&tm.tm_min) {
            return None;
        }
        Some(WallTime {
            hour: tm.tm_hour as u8,
            minute: tm.tm_min as u8,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn raw_wall_time(&self) -> Option<WallTime> {
        None
    }
}

impl ClockPort for ClockAdapter {
    fn wall_time(&self) -> Option<WallTime> {
        let raw = self.raw_wall_time()?;
        let hour = if self.summer_time {
            (raw.hour + 1) % 24
        } else {
            raw.hour
        };
        Some(WallTime {
            hour,
            minute: raw.minute,
        })
    }
}
