//! Software timer engine.
//!
//! A fixed set of named timers, one per logical delay in the system,
//! created once and never destroyed. Monostable timers fire once per
//! start; astable timers auto-reload until stopped. The engine is
//! tick-driven: the main loop calls [`TimerEngine::poll`] with the
//! monotonic time and dispatches each expired [`TimerId`] through an
//! exhaustive `match` — expiry handlers run under the restricted
//! context (no storage, at most one outbound message).
//!
//! Operations are fire-and-forget: stopping is idempotent, starting a
//! stopped timer rearms its full period, restarting a running timer
//! does the same.

use crate::config::DelayParams;

// ───────────────────────────────────────────────────────────────
// Timer identifiers
// ───────────────────────────────────────────────────────────────

/// Every logical delay in the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TimerId {
    /// Timed manual watering session limit (monostable).
    Watering = 0,
    /// Reservoir tank-fill session limit (monostable).
    TankFill = 1,
    /// Pressurizer fill timeout (monostable).
    PressurizerFill = 2,
    /// Pressurizer activation-frequency rolling window (monostable).
    PressurizerSecurity = 3,
    /// Manual east-valve run limit (monostable).
    EastValveRun = 4,
    /// East-valve duty-cycle step (astable, 5 s).
    EastValveStep = 5,
    /// Heat-pump delayed power-off grace period (monostable).
    PacPowerOff = 6,
    /// Heat-pump delayed IR-on resend (astable, stopped after a few sends).
    PacIrResend = 7,
    /// Ventilation fast-board pulse after its power-up grace (monostable).
    FastBoardPulse = 8,
    /// Remote-valve "off" publication after the day-counter pulse (monostable).
    RemoteValveOff = 9,
}

pub const TIMER_COUNT: usize = 10;

impl TimerId {
    pub const fn from_index(idx: usize) -> Option<TimerId> {
        match idx {
            0 => Some(TimerId::Watering),
            1 => Some(TimerId::TankFill),
            2 => Some(TimerId::PressurizerFill),
            3 => Some(TimerId::PressurizerSecurity),
            4 => Some(TimerId::EastValveRun),
            5 => Some(TimerId::EastValveStep),
            6 => Some(TimerId::PacPowerOff),
            7 => Some(TimerId::PacIrResend),
            8 => Some(TimerId::FastBoardPulse),
            9 => Some(TimerId::RemoteValveOff),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Watering => "watering",
            Self::TankFill => "tank-fill",
            Self::PressurizerFill => "pressurizer-fill",
            Self::PressurizerSecurity => "pressurizer-security",
            Self::EastValveRun => "east-valve-run",
            Self::EastValveStep => "east-valve-step",
            Self::PacPowerOff => "pac-power-off",
            Self::PacIrResend => "pac-ir-resend",
            Self::FastBoardPulse => "fast-board-pulse",
            Self::RemoteValveOff => "remote-valve-off",
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Fixed periods (runtime-tunable ones come from DelayParams)
// ───────────────────────────────────────────────────────────────

/// Heat-pump compressor protection: relay opens this long after power-off.
pub const PAC_POWER_OFF_MS: u64 = 300_000;
/// Delay before (and between) IR-on resends to the heat pump.
pub const PAC_IR_RESEND_MS: u64 = 20_000;
/// Fast-board power-up grace before it accepts the speed pulse.
pub const FAST_BOARD_PULSE_MS: u64 = 10_000;
/// East-valve duty-cycle step.
pub const EAST_VALVE_STEP_MS: u64 = 5_000;
/// Remote valve switches itself off; this is the matching status update.
pub const REMOTE_VALVE_OFF_MS: u64 = 3_600_000;
/// Pressurizer security rolling window.
pub const SECURITY_WINDOW_MS: u64 = 3_600_000;

// ───────────────────────────────────────────────────────────────
// Engine
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Timer {
    period_ms: u64,
    auto_reload: bool,
    /// `Some(t)` while running; expiry at `t`.
    deadline: Option<u64>,
}

impl Timer {
    const fn new(period_ms: u64, auto_reload: bool) -> Self {
        Self {
            period_ms,
            auto_reload,
            deadline: None,
        }
    }
}

/// Identifiers of timers that expired during one poll sweep.
pub type Expired = heapless::Vec<TimerId, TIMER_COUNT>;

pub struct TimerEngine {
    timers: [Timer; TIMER_COUNT],
}

impl TimerEngine {
    /// Create the full timer set. Runtime-tunable periods are seeded
    /// from `params` and retimed via [`set_period`](Self::set_period)
    /// whenever the parameters change.
    pub fn new(params: &DelayParams) -> Self {
        let mut timers = [Timer::new(0, false); TIMER_COUNT];
        timers[TimerId::Watering as usize] = Timer::new(u64::from(params.watering_secs) * 1000, false);
        timers[TimerId::TankFill as usize] =
            Timer::new(u64::from(params.tank_fill_secs) * 1000, false);
        timers[TimerId::PressurizerFill as usize] =
            Timer::new(u64::from(params.pressurizer_timeout_secs) * 1000, false);
        timers[TimerId::PressurizerSecurity as usize] = Timer::new(SECURITY_WINDOW_MS, false);
        timers[TimerId::EastValveRun as usize] =
            Timer::new(u64::from(params.east_valve_secs) * 1000, false);
        timers[TimerId::EastValveStep as usize] = Timer::new(EAST_VALVE_STEP_MS, true);
        timers[TimerId::PacPowerOff as usize] = Timer::new(PAC_POWER_OFF_MS, false);
        timers[TimerId::PacIrResend as usize] = Timer::new(PAC_IR_RESEND_MS, true);
        timers[TimerId::FastBoardPulse as usize] = Timer::new(FAST_BOARD_PULSE_MS, false);
        timers[TimerId::RemoteValveOff as usize] = Timer::new(REMOTE_VALVE_OFF_MS, false);
        Self { timers }
    }

    /// Arm the timer for its full period from `now_ms`. A running timer
    /// is rearmed (same as [`restart`](Self::restart)).
    pub fn start(&mut self, id: TimerId, now_ms: u64) {
        let t = &mut self.timers[id as usize];
        t.deadline = Some(now_ms + t.period_ms);
    }

    /// Disarm the timer. Idempotent.
    pub fn stop(&mut self, id: TimerId) {
        self.timers[id as usize].deadline = None;
    }

    /// Stop then start.
    pub fn restart(&mut self, id: TimerId, now_ms: u64) {
        self.stop(id);
        self.start(id, now_ms);
    }

    /// Change the period. Takes effect on the next start; a running
    /// timer keeps its current deadline.
    pub fn set_period(&mut self, id: TimerId, period_ms: u64) {
        self.timers[id as usize].period_ms = period_ms;
    }

    pub fn period(&self, id: TimerId) -> u64 {
        self.timers[id as usize].period_ms
    }

    pub fn is_running(&self, id: TimerId) -> bool {
        self.timers[id as usize].deadline.is_some()
    }

    /// Milliseconds until expiry, `None` if stopped. Saturates at zero
    /// for a timer that is due but not yet polled.
    pub fn time_remaining(&self, id: TimerId, now_ms: u64) -> Option<u64> {
        self.timers[id as usize]
            .deadline
            .map(|d| d.saturating_sub(now_ms))
    }

    /// Sweep all timers against `now_ms` and collect the expired ones,
    /// in `TimerId` order. Astable timers reload relative to their own
    /// deadline so the cadence does not drift with poll jitter; a poll
    /// gap longer than one period yields a single catch-up fire.
    pub fn poll(&mut self, now_ms: u64) -> Expired {
        let mut expired = Expired::new();
        for (idx, t) in self.timers.iter_mut().enumerate() {
            let Some(deadline) = t.deadline else { continue };
            if now_ms < deadline {
                continue;
            }
            if t.auto_reload {
                let mut next = deadline + t.period_ms;
                if next <= now_ms {
                    // Catch up after a long stall instead of burst-firing.
                    next = now_ms + t.period_ms;
                }
                t.deadline = Some(next);
            } else {
                t.deadline = None;
            }
            if let Some(id) = TimerId::from_index(idx) {
                // Capacity equals the timer count, push cannot fail.
                let _ = expired.push(id);
            }
        }
        expired
    }
}
