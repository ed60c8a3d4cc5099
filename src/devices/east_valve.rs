//! East-garden valve duty-cycle modulation.
//!
//! The east garden's drip line needs less than full mains flow, and
//! there is no proportional valve — so flow is approximated by pulsing
//! the solenoid: a repeating 5 s step timer advances a counter modulo
//! 20, and the valve is energized while the counter is below the duty
//! value (0..=20) read live from the schedule table. 100 s period, 5%
//! resolution.
//!
//! Manual and scheduled activation share the step timer and duty
//! source; a manual run is additionally bounded by the one-shot run
//! timer armed from the configured east-valve duration.

use log::info;

use crate::app::ports::{IoPort, MessagePort, Restricted};
use crate::lines::OutputLine;
use crate::timers::{TimerEngine, TimerId};

/// Steps per modulation period (100 s / 5 s).
pub const STEPS_PER_PERIOD: u8 = 20;

pub struct EastValve {
    running: bool,
    step: u8,
}

impl Default for EastValve {
    fn default() -> Self {
        Self::new()
    }
}

impl EastValve {
    pub fn new() -> Self {
        Self {
            running: false,
            step: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Manual activation, bounded by `run_secs`.
    pub fn start_manual(
        &mut self,
        io: &mut impl IoPort,
        timers: &mut TimerEngine,
        run_secs: u32,
        now_ms: u64,
    ) {
        info!("east valve: manual run for {}s", run_secs);
        timers.set_period(TimerId::EastValveRun, u64::from(run_secs) * 1000);
        timers.restart(TimerId::EastValveRun, now_ms);
        self.energize(io, timers, now_ms);
    }

    /// Scheduled activation. The window end edge stops it; no run timer.
    pub fn start_scheduled(
        &mut self,
        io: &mut impl IoPort,
        timers: &mut TimerEngine,
        now_ms: u64,
    ) {
        info!("east valve: scheduled start");
        self.energize(io, timers, now_ms);
    }

    fn energize(&mut self, io: &mut impl IoPort, timers: &mut TimerEngine, now_ms: u64) {
        io.write(OutputLine::Transformer, true);
        timers.restart(TimerId::EastValveStep, now_ms);
        self.running = true;
    }

    /// Stop modulation and de-energize everything downstream.
    pub fn stop(&mut self, io: &mut impl IoPort, timers: &mut TimerEngine) {
        timers.stop(TimerId::EastValveStep);
        timers.stop(TimerId::EastValveRun);
        io.write(OutputLine::EastValve, false);
        io.write(OutputLine::Transformer, false);
        self.running = false;
    }

    /// Step-timer expiry: energized while `step < duty`, wrap modulo the
    /// period. Duty is re-read by the caller on every step so a table
    /// edit takes effect within one period.
    pub fn on_step<IO: IoPort, M: MessagePort>(
        &mut self,
        duty: u8,
        r: &mut Restricted<'_, IO, M>,
    ) {
        r.io.write(OutputLine::EastValve, self.step < duty);
        self.step = (self.step + 1) % STEPS_PER_PERIOD;
    }

    /// Run-timer expiry: manual session limit reached.
    pub fn on_run_timeout<IO: IoPort, M: MessagePort>(&mut self, r: &mut Restricted<'_, IO, M>) {
        r.timers.stop(TimerId::EastValveStep);
        r.io.write(OutputLine::EastValve, false);
        r.io.write(OutputLine::Transformer, false);
        self.running = false;
    }
}
