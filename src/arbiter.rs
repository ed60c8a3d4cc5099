//! Shared-actuator arbiter: one pump, several consumers.
//!
//! The pump feeds three hydraulic paths — manual garden watering, the
//! reservoir tank fill, and the pressurizer tank. Priority, highest
//! first: pressurizer > tank-filling > manual watering. The pressurizer
//! contact preempts the others by closing their valves while leaving
//! the pump running; the plumbing then diverts the full output into the
//! pressurizer tank. That diversion is a property of the pipework, not
//! of this code — the arbiter assumes it.
//!
//! Fill faults follow a two-strike protocol: the first timeout raises a
//! recoverable fault and a single re-arm buys one retry; a second
//! timeout locks the pump out until someone walks to the machine. An
//! activation-frequency monitor guards against a leaking pressurizer
//! tank cycling the pump all day.

use log::{debug, error, info, warn};

use crate::app::ports::{Channel, IoPort, MessagePort, Restricted};
use crate::config::DelayParams;
use crate::lines::OutputLine;
use crate::timers::{TimerEngine, TimerId};

/// Fills tolerated inside one security window before the trip.
pub const SECURITY_MAX_FILLS: u8 = 3;

/// Manual watering flavour, selected by the remote command value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WateringMode {
    /// Bounded by the configured watering duration.
    Timed,
    /// Runs until explicitly stopped.
    NoTimeout,
}

/// Fault taxonomy surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// First fill timeout; one re-arm retry permitted.
    RecoverableFill,
    /// Second consecutive fill timeout; physical intervention required.
    NonRecoverableFill,
    /// Activation-frequency threshold exceeded; auto-fill disabled.
    SecurityTrip,
}

/// Process-wide activity flags, mutated here, read by the loop and the
/// scheduler. At most one of `is_watering`/`is_tank_filling` is true;
/// both drop the instant the pressurizer contact closes.
#[derive(Debug, Default, Clone, Copy)]
pub struct OperationFlags {
    pub is_watering: bool,
    pub is_tank_filling: bool,
    /// Latched for the whole fill attempt, including a timed-out one —
    /// only success or a consumed re-arm clears it, which is what
    /// prevents an automatic third attempt.
    pub pressurizer_filling: bool,
    /// Set when the single re-arm retry has been spent.
    pub retry_locked: bool,
    pub pressurizer_fault: bool,
    pub pump_fault: bool,
    pub rearm_requested: bool,
    pub security_tripped: bool,
    pub fill_count_in_window: u8,
}

pub struct Arbiter {
    flags: OperationFlags,
    security_armed: bool,
    contact_was_closed: bool,
    /// Latest fault, picked up once by the main loop for display/log.
    fault_event: Option<FaultKind>,
    /// The security window expired in restricted context with the
    /// counter over threshold; the main loop must persist the disable.
    security_persist_pending: bool,
}

impl Arbiter {
    pub fn new() -> Self {
        Self {
            flags: OperationFlags::default(),
            security_armed: false,
            contact_was_closed: false,
            fault_event: None,
            security_persist_pending: false,
        }
    }

    pub fn flags(&self) -> &OperationFlags {
        &self.flags
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Arbiter {
    // ── Manual watering ───────────────────────────────────────

    /// Energize the watering path. Refused while a higher-priority
    /// consumer owns the pump.
    pub fn start_watering(
        &mut self,
        mode: WateringMode,
        io: &mut impl IoPort,
        timers: &mut TimerEngine,
        params: &DelayParams,
        now_ms: u64,
    ) {
        if self.flags.pump_fault {
            warn!("watering refused: pump locked out");
            return;
        }
        if self.flags.pressurizer_filling || self.flags.is_tank_filling {
            info!("watering refused: pump busy with a higher-priority task");
            return;
        }
        io.write(OutputLine::Transformer, true);
        io.write(OutputLine::WateringValve, true);
        io.write(OutputLine::Pump, true);
        match mode {
            WateringMode::Timed => {
                timers.set_period(TimerId::Watering, u64::from(params.watering_secs) * 1000);
                timers.restart(TimerId::Watering, now_ms);
                info!("watering started ({}s limit)", params.watering_secs);
            }
            WateringMode::NoTimeout => {
                timers.stop(TimerId::Watering);
                info!("watering started (no time limit)");
            }
        }
        self.flags.is_watering = true;
    }

    pub fn stop_watering(&mut self, io: &mut impl IoPort, timers: &mut TimerEngine) {
        timers.stop(TimerId::Watering);
        io.write(OutputLine::Pump, false);
        io.write(OutputLine::WateringValve, false);
        io.write(OutputLine::Transformer, false);
        self.flags.is_watering = false;
        info!("watering stopped");
    }

    // ── Tank filling ──────────────────────────────────────────

    /// Energize the tank-fill path. Redirects a running watering
    /// session instead of stopping the pump: valves swap, the pump
    /// keeps turning.
    pub fn start_tank_filling(
        &mut self,
        io: &mut impl IoPort,
        timers: &mut TimerEngine,
        params: &DelayParams,
        now_ms: u64,
    ) {
        if self.flags.pump_fault {
            warn!("tank fill refused: pump locked out");
            return;
        }
        if self.flags.pressurizer_filling {
            info!("tank fill refused: pressurizer owns the pump");
            return;
        }
        if self.flags.is_watering {
            io.write(OutputLine::WateringValve, false);
            io.write(OutputLine::TankValve, true);
            timers.stop(TimerId::Watering);
            self.flags.is_watering = false;
            info!("tank fill: redirected from watering, pump kept running");
        } else {
            io.write(OutputLine::Transformer, true);
            io.write(OutputLine::TankValve, true);
            io.write(OutputLine::Pump, true);
            info!("tank fill started ({}s)", params.tank_fill_secs);
        }
        timers.set_period(TimerId::TankFill, u64::from(params.tank_fill_secs) * 1000);
        timers.restart(TimerId::TankFill, now_ms);
        self.flags.is_tank_filling = true;
    }

    pub fn stop_tank_filling(&mut self, io: &mut impl IoPort, timers: &mut TimerEngine) {
        timers.stop(TimerId::TankFill);
        io.write(OutputLine::Pump, false);
        io.write(OutputLine::TankValve, false);
        io.write(OutputLine::Transformer, false);
        self.flags.is_tank_filling = false;
        info!("tank fill stopped");
    }

    // ── Pressurizer ───────────────────────────────────────────

    /// Poll the pressure-switch contact. Main-loop context (the only
    /// caller is the I/O scrutation), so publishing and parameter
    /// mutation are allowed here.
    ///
    /// Returns `true` when `params` changed and must be persisted
    /// (security trip disabling auto-fill).
    pub fn poll_pressurizer(
        &mut self,
        contact_closed: bool,
        io: &mut impl IoPort,
        bus: &mut impl MessagePort,
        timers: &mut TimerEngine,
        params: &mut DelayParams,
        now_ms: u64,
    ) -> bool {
        let mut params_dirty = false;

        if contact_closed {
            if !self.contact_was_closed {
                debug!("pressurizer contact closed");
            }

            if params.pressurizer_auto_fill
                && !self.flags.pressurizer_filling
                && !self.flags.pump_fault
            {
                if self.flags.is_watering || self.flags.is_tank_filling {
                    self.preempt_lower_priority(io, timers);
                }
                if params.pressurizer_security && !self.security_register(timers, now_ms) {
                    // Threshold exceeded on this very attempt: refuse it,
                    // disable auto-fill and tell the operator, exactly once.
                    params.pressurizer_auto_fill = false;
                    self.flags.security_tripped = true;
                    self.fault_event = Some(FaultKind::SecurityTrip);
                    bus.publish(Channel::PressurizerSecurity, "tripped");
                    error!(
                        "pressurizer security trip: {} fills inside the window, auto-fill disabled",
                        self.flags.fill_count_in_window
                    );
                    params_dirty = true;
                } else {
                    self.flags.pressurizer_filling = true;
                    timers.set_period(
                        TimerId::PressurizerFill,
                        u64::from(params.pressurizer_timeout_secs) * 1000,
                    );
                    timers.restart(TimerId::PressurizerFill, now_ms);
                    io.write(OutputLine::Pump, true);
                    info!(
                        "pressurizer fill started ({}s timeout)",
                        params.pressurizer_timeout_secs
                    );
                }
            }

            // A pending re-arm converts the first failed attempt into a
            // fresh one; the lock forbids a third.
            if self.flags.rearm_requested {
                self.flags.rearm_requested = false;
                if self.flags.pressurizer_fault && !self.flags.retry_locked {
                    self.flags.pressurizer_fault = false;
                    self.flags.pressurizer_filling = false;
                    self.flags.retry_locked = true;
                    bus.publish(Channel::PressurizerFault, "off");
                    info!("re-arm consumed: one retry granted");
                } else {
                    debug!("re-arm ignored: no retryable fault pending");
                }
            }
        } else if self.flags.pressurizer_filling && !self.flags.pump_fault {
            // Contact opened: target pressure reached.
            timers.stop(TimerId::PressurizerFill);
            io.write(OutputLine::Pump, false);
            self.flags.pressurizer_filling = false;
            self.flags.retry_locked = false;
            if self.flags.pressurizer_fault {
                self.flags.pressurizer_fault = false;
                bus.publish(Channel::PressurizerFault, "off");
            }
            info!("pressurizer fill complete");
        }

        self.contact_was_closed = contact_closed;
        params_dirty
    }

    /// Contact-closed preemption: valves shut, session timers cancelled,
    /// pump deliberately left running for the pressurizer.
    fn preempt_lower_priority(&mut self, io: &mut impl IoPort, timers: &mut TimerEngine) {
        warn!(
            "pressurizer preempts {}",
            if self.flags.is_watering { "watering" } else { "tank fill" }
        );
        io.write(OutputLine::WateringValve, false);
        io.write(OutputLine::TankValve, false);
        io.write(OutputLine::Transformer, false);
        timers.stop(TimerId::Watering);
        timers.stop(TimerId::TankFill);
        self.flags.is_watering = false;
        self.flags.is_tank_filling = false;
    }

    /// Count this fill against the rolling window. Returns `false` when
    /// the attempt exceeds the threshold and must be refused.
    fn security_register(&mut self, timers: &mut TimerEngine, now_ms: u64) -> bool {
        if !self.security_armed {
            self.security_armed = true;
            self.flags.fill_count_in_window = 0;
            timers.restart(TimerId::PressurizerSecurity, now_ms);
        }
        self.flags.fill_count_in_window += 1;
        self.flags.fill_count_in_window <= SECURITY_MAX_FILLS || self.flags.security_tripped
    }

    /// Request a re-arm (local button or remote command). Consumed
    /// exactly once by the next contact poll.
    pub fn rearm(&mut self) {
        self.flags.rearm_requested = true;
        info!("re-arm requested");
    }

    // ── Timer expiry handlers (restricted context) ────────────

    pub fn on_watering_timeout<IO: IoPort, M: MessagePort>(
        &mut self,
        r: &mut Restricted<'_, IO, M>,
    ) {
        self.stop_watering(r.io, r.timers);
    }

    pub fn on_tank_fill_timeout<IO: IoPort, M: MessagePort>(
        &mut self,
        r: &mut Restricted<'_, IO, M>,
    ) {
        self.stop_tank_filling(r.io, r.timers);
    }

    /// Fill timeout: the two-strike escalation. The filling latch stays
    /// up on purpose — it is what blocks an automatic restart while the
    /// contact is still closed.
    pub fn on_fill_timeout<IO: IoPort, M: MessagePort>(&mut self, r: &mut Restricted<'_, IO, M>) {
        r.io.write(OutputLine::Pump, false);
        if self.flags.retry_locked {
            self.flags.pump_fault = true;
            self.fault_event = Some(FaultKind::NonRecoverableFill);
            r.bus.publish(Channel::PressurizerFault, "on2");
        } else {
            self.flags.pressurizer_fault = true;
            self.fault_event = Some(FaultKind::RecoverableFill);
            r.bus.publish(Channel::PressurizerFault, "on");
        }
    }

    /// Security window expiry. The fill-attempt path trips eagerly, so
    /// normally the counter is at or under threshold here and resets
    /// silently; the over-threshold branch covers a trip that could not
    /// persist from restricted context.
    pub fn on_security_window_elapsed<IO: IoPort, M: MessagePort>(
        &mut self,
        r: &mut Restricted<'_, IO, M>,
    ) {
        if self.flags.fill_count_in_window > SECURITY_MAX_FILLS && !self.flags.security_tripped {
            self.flags.security_tripped = true;
            self.security_persist_pending = true;
            self.fault_event = Some(FaultKind::SecurityTrip);
            r.bus.publish(Channel::PressurizerSecurity, "tripped");
        }
        self.flags.fill_count_in_window = 0;
        self.security_armed = false;
    }

    // ── Main-loop pickups ─────────────────────────────────────

    /// Latest fault for operator surfacing; drained once per event.
    pub fn take_fault_event(&mut self) -> Option<FaultKind> {
        self.fault_event.take()
    }

    /// Whether a restricted-context security trip still needs its
    /// auto-fill disable persisted.
    pub fn take_security_persist(&mut self) -> bool {
        core::mem::take(&mut self.security_persist_pending)
    }
}
