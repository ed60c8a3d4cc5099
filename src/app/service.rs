//! Controller service — the hexagonal core.
//!
//! [`Controller`] owns the device state machines, the shared-pump
//! arbiter, the timer engine and the persisted documents. It exposes a
//! clean, hardware-agnostic API. All I/O flows through port traits
//! injected at call sites, making the entire service testable with mock
//! adapters.
//!
//! ```text
//!    IoPort ──▶ ┌──────────────────────────────┐ ──▶ MessagePort
//!               │          Controller           │
//! ClockPort ──▶ │ arbiter · devices · schedule  │ ◀─▶ StoragePort
//!               └──────────────────────────────┘
//! ```
//!
//! The loop drives [`tick`](Controller::tick) every scrutation period;
//! timer-expiry work runs under the [`Restricted`] handle, everything
//! else with full main-loop rights.

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::arbiter::{Arbiter, FaultKind, OperationFlags, WateringMode};
use crate::config::{DelayParams, PersistentState};
use crate::devices::{EastValve, HeatPump, Vmc, VmcCommand, VmcMode};
use crate::error::ParseError;
use crate::handoff::{ClickSlot, DeferredAction, Handoff};
use crate::lines::{InputLine, OutputLine};
use crate::schedule::{Device, ScheduleEnable, ScheduleTable, WindowEnable};
use crate::scheduler::{ScheduleFire, TimeTableScheduler};
use crate::timers::{TimerEngine, TimerId};

use super::commands::{Command, Reply, WateringRequest};
use super::ports::{
    Channel, ClockPort, IoPort, MessagePort, Restricted, StorageError, StorageKey, StoragePort,
};

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

/// Documents with unsaved changes. A flag stays set until the save
/// succeeds, so a transient storage error retries next tick.
#[derive(Debug, Default)]
struct Dirty {
    table: bool,
    enables: bool,
    params: bool,
    devices: bool,
}

/// The controller orchestrates all domain logic.
pub struct Controller {
    params: DelayParams,
    table: ScheduleTable,
    enables: ScheduleEnable,
    persistent: PersistentState,
    timers: TimerEngine,
    handoff: Handoff,
    arbiter: Arbiter,
    vmc: Vmc,
    pac: HeatPump,
    east_valve: EastValve,
    sched: TimeTableScheduler,
    dirty: Dirty,
    restart_pending: bool,
    watering_remote_was: bool,
    tank_remote_was: bool,
}

impl Controller {
    pub fn new() -> Self {
        let params = DelayParams::default();
        let timers = TimerEngine::new(&params);
        Self {
            params,
            table: ScheduleTable::default(),
            enables: ScheduleEnable::default(),
            persistent: PersistentState::default(),
            timers,
            handoff: Handoff::new(),
            arbiter: Arbiter::new(),
            vmc: Vmc::new(),
            pac: HeatPump::new(),
            east_valve: EastValve::new(),
            sched: TimeTableScheduler::new(),
            dirty: Dirty::default(),
            restart_pending: false,
            watering_remote_was: false,
            tank_remote_was: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load the persisted documents. Unreadable or missing documents
    /// fall back to defaults; the controller always comes up.
    pub fn load(&mut self, storage: &impl StoragePort) {
        if let Some(p) = load_doc(storage, StorageKey::DelayParams, DelayParams::parse) {
            self.params = p;
        }
        if let Some(t) = load_doc(storage, StorageKey::Schedule, ScheduleTable::parse) {
            self.table = t;
        }
        if let Some(e) = load_doc(storage, StorageKey::ScheduleEnable, ScheduleEnable::parse) {
            self.enables = e;
        }
        if let Some(d) = load_doc(storage, StorageKey::DeviceState, PersistentState::parse) {
            self.persistent = d;
        }
        self.retime_from_params();
    }

    /// Replay the persisted commanded state onto the actuators. Called
    /// once after [`load`](Self::load), before the first tick.
    pub fn restore_outputs(
        &mut self,
        io: &mut impl IoPort,
        bus: &mut impl MessagePort,
        now_ms: u64,
    ) {
        info!("restoring persisted device state");
        io.write(OutputLine::Oven, self.persistent.cooking);
        if self.persistent.cooking {
            bus.publish(Channel::CookingStatus, "on");
        }
        if self.persistent.heat_pump {
            self.pac.power_on(io, &mut self.timers, now_ms);
        }
        if self.persistent.east_valve {
            self.east_valve
                .start_manual(io, &mut self.timers, self.params.east_valve_secs, now_ms);
        }
        if self.persistent.irrigation {
            self.arbiter.start_watering(
                WateringMode::Timed,
                io,
                &mut self.timers,
                &self.params,
                now_ms,
            );
        }
        if let Some(cmd) = VmcCommand::from_wire(self.persistent.ventilation_cmd) {
            self.vmc.apply_command(cmd, io, bus, &mut self.timers, now_ms);
        }
    }

    // ── Main loop ─────────────────────────────────────────────

    /// One scrutation pass: inputs, timers, schedule, housekeeping,
    /// persistence. Full main-loop rights.
    pub fn tick(
        &mut self,
        now_ms: u64,
        clock: &impl ClockPort,
        io: &mut impl IoPort,
        bus: &mut impl MessagePort,
        storage: &mut impl StoragePort,
    ) {
        self.poll_remote_contacts(io, now_ms);

        let contact = io.read_contact(InputLine::PressurizerContact);
        if self.arbiter.poll_pressurizer(
            contact,
            io,
            bus,
            &mut self.timers,
            &mut self.params,
            now_ms,
        ) {
            self.dirty.params = true;
        }

        let expired = self.timers.poll(now_ms);
        for id in expired {
            self.dispatch_timer(id, io, bus, now_ms);
        }

        if let Some(now) = clock.wall_time() {
            let fires = self.sched.tick(now, &self.table, &self.enables);
            for fire in fires {
                self.apply_schedule_fire(fire, io, bus, now_ms);
            }
        }

        self.pac.tick(bus, now_ms);
        self.run_deferred();

        if let Some(kind) = self.arbiter.take_fault_event() {
            match kind {
                FaultKind::RecoverableFill => {
                    error!("pressurizer fill timed out, waiting for re-arm");
                }
                FaultKind::NonRecoverableFill => {
                    error!("pressurizer fill failed twice, pump locked out");
                }
                FaultKind::SecurityTrip => {
                    error!("pressurizer cycling too often, auto-fill disabled");
                }
            }
        }
        if self.arbiter.take_security_persist() {
            self.params.pressurizer_auto_fill = false;
            self.dirty.params = true;
        }

        self.persist_dirty(storage);
    }

    /// Radio remote contacts act as flip-flops: each rising edge toggles
    /// its device.
    fn poll_remote_contacts(&mut self, io: &mut impl IoPort, now_ms: u64) {
        let watering = io.read_contact(InputLine::WateringRemote);
        if watering && !self.watering_remote_was {
            if self.arbiter.flags().is_watering {
                self.arbiter.stop_watering(io, &mut self.timers);
            } else {
                self.arbiter.start_watering(
                    WateringMode::Timed,
                    io,
                    &mut self.timers,
                    &self.params,
                    now_ms,
                );
            }
            self.persistent.irrigation = self.arbiter.flags().is_watering;
            self.dirty.devices = true;
        }
        self.watering_remote_was = watering;

        let tank = io.read_contact(InputLine::TankRemote);
        if tank && !self.tank_remote_was {
            if self.arbiter.flags().is_tank_filling {
                self.arbiter.stop_tank_filling(io, &mut self.timers);
            } else {
                self.arbiter
                    .start_tank_filling(io, &mut self.timers, &self.params, now_ms);
            }
        }
        self.tank_remote_was = tank;
    }

    /// Dispatch one expired timer under the restricted context.
    fn dispatch_timer(
        &mut self,
        id: TimerId,
        io: &mut impl IoPort,
        bus: &mut impl MessagePort,
        now_ms: u64,
    ) {
        if self.params.verbose_log {
            info!("timer expired: {}", id.label());
        } else {
            debug!("timer expired: {}", id.label());
        }
        // Duty is re-read on every step so a table edit takes effect
        // within one modulation period.
        let duty = self.table.east_valve_duty();
        let mut r = Restricted::new(io, bus, &mut self.timers, now_ms);
        match id {
            TimerId::Watering => self.arbiter.on_watering_timeout(&mut r),
            TimerId::TankFill => self.arbiter.on_tank_fill_timeout(&mut r),
            TimerId::PressurizerFill => self.arbiter.on_fill_timeout(&mut r),
            TimerId::PressurizerSecurity => self.arbiter.on_security_window_elapsed(&mut r),
            TimerId::EastValveRun => self.east_valve.on_run_timeout(&mut r),
            TimerId::EastValveStep => self.east_valve.on_step(duty, &mut r),
            TimerId::PacPowerOff => self.pac.on_power_off_elapsed(&mut r),
            TimerId::PacIrResend => self.pac.on_ir_resend(&mut r),
            TimerId::FastBoardPulse => self.vmc.on_fast_board_pulse(&mut r),
            TimerId::RemoteValveOff => r.bus.publish(Channel::RemoteValve, "off"),
        }
    }

    /// Map one schedule edge onto its device. Main-loop context.
    fn apply_schedule_fire(
        &mut self,
        fire: ScheduleFire,
        io: &mut impl IoPort,
        bus: &mut impl MessagePort,
        now_ms: u64,
    ) {
        match fire {
            ScheduleFire::Midnight => self.on_midnight(),
            ScheduleFire::WindowStart { device, enable } => match device {
                // The oven is switched on by hand; only the cut-off
                // is scheduled.
                Device::CookingPower => {}
                Device::Irrigation => {
                    self.arbiter
                        .start_tank_filling(io, &mut self.timers, &self.params, now_ms);
                    self.pulse_remote_valve_if_due(bus, now_ms);
                }
                Device::EastValve => {
                    self.east_valve.start_scheduled(io, &mut self.timers, now_ms);
                }
                Device::HeatPump => {
                    self.pac.power_on(io, &mut self.timers, now_ms);
                    self.persistent.heat_pump = true;
                    self.dirty.devices = true;
                }
                Device::Ventilation => self.vmc.schedule_on(
                    enable == WindowEnable::FastOn,
                    io,
                    bus,
                    &mut self.timers,
                    now_ms,
                ),
            },
            ScheduleFire::WindowEnd { device } => match device {
                Device::CookingPower => {
                    io.write(OutputLine::Oven, false);
                    bus.publish(Channel::CookingStatus, "off");
                    self.persistent.cooking = false;
                    self.dirty.devices = true;
                }
                // The tank fill ends on its own monostable, not on the
                // window edge.
                Device::Irrigation => {}
                Device::EastValve => self.east_valve.stop(io, &mut self.timers),
                Device::HeatPump => {
                    self.pac.power_off(bus, &mut self.timers, now_ms);
                    self.persistent.heat_pump = false;
                    self.dirty.devices = true;
                }
                Device::Ventilation => self.vmc.schedule_off(io, bus),
            },
        }
    }

    /// Midnight bookkeeping: advance and persist the irrigation day
    /// counter. Whether the remote valve pulses is decided at the next
    /// irrigation window start.
    fn on_midnight(&mut self) {
        let counter = self.table.irrigation_day_counter().saturating_add(1);
        self.table.set_irrigation_day_counter(counter);
        self.dirty.table = true;
    }

    /// Day-gated autonomous remote valve, evaluated at the irrigation
    /// window start: pulse once the persisted day counter has reached
    /// the configured interval, then restart the count. The valve
    /// closes by itself; the delayed timer only mirrors that on the
    /// status bus.
    fn pulse_remote_valve_if_due(&mut self, bus: &mut impl MessagePort, now_ms: u64) {
        let interval = self.table.irrigation_day_interval();
        let counter = self.table.irrigation_day_counter();
        if interval > 0 && counter >= interval {
            info!("remote valve pulse after {counter} day(s)");
            bus.publish(Channel::RemoteValve, "on");
            self.timers.restart(TimerId::RemoteValveOff, now_ms);
            self.table.set_irrigation_day_counter(0);
            self.dirty.table = true;
        }
    }

    /// Execute parked click actions under full rights, at most one per
    /// slot. A click action only applies while its fault is live.
    fn run_deferred(&mut self) {
        for slot in [ClickSlot::Single, ClickSlot::Double] {
            let Some(action) = self.handoff.take(slot) else {
                continue;
            };
            match action {
                DeferredAction::Rearm => {
                    if self.arbiter.flags().pressurizer_fault {
                        self.arbiter.rearm();
                    } else {
                        debug!("click re-arm ignored: no fault pending");
                    }
                }
                DeferredAction::Restart => {
                    if self.arbiter.flags().pump_fault {
                        warn!("restart requested after pump lockout");
                        self.restart_pending = true;
                    } else {
                        debug!("restart click ignored: no lockout");
                    }
                }
            }
        }
    }

    // ── Click entry points (interrupt-adjacent, no I/O) ───────

    pub fn on_single_click(&mut self) {
        self.handoff.defer(ClickSlot::Single, DeferredAction::Rearm);
    }

    pub fn on_double_click(&mut self) {
        self.handoff.defer(ClickSlot::Double, DeferredAction::Restart);
    }

    // ── Commands ──────────────────────────────────────────────

    /// Execute one inbound command. Main-loop context. Read commands
    /// return the encoded reply for the carrying adapter to route.
    pub fn handle_command(
        &mut self,
        cmd: Command,
        io: &mut impl IoPort,
        bus: &mut impl MessagePort,
        now_ms: u64,
    ) -> Option<Reply> {
        match cmd {
            Command::SetWatering(req) => {
                match req {
                    WateringRequest::Off => self.arbiter.stop_watering(io, &mut self.timers),
                    WateringRequest::On => self.arbiter.start_watering(
                        WateringMode::Timed,
                        io,
                        &mut self.timers,
                        &self.params,
                        now_ms,
                    ),
                    WateringRequest::OnNoTimeout => self.arbiter.start_watering(
                        WateringMode::NoTimeout,
                        io,
                        &mut self.timers,
                        &self.params,
                        now_ms,
                    ),
                }
                self.persistent.irrigation = self.arbiter.flags().is_watering;
                self.dirty.devices = true;
                None
            }
            Command::SetTankFilling(on) => {
                if on {
                    self.arbiter
                        .start_tank_filling(io, &mut self.timers, &self.params, now_ms);
                } else {
                    self.arbiter.stop_tank_filling(io, &mut self.timers);
                }
                None
            }
            Command::SetCooking(on) => {
                io.write(OutputLine::Oven, on);
                bus.publish(Channel::CookingStatus, if on { "on" } else { "off" });
                self.persistent.cooking = on;
                self.dirty.devices = true;
                None
            }
            Command::SetVentilation(vmc_cmd) => {
                self.vmc
                    .apply_command(vmc_cmd, io, bus, &mut self.timers, now_ms);
                self.persistent.ventilation_cmd = vmc_cmd as u8;
                self.dirty.devices = true;
                None
            }
            Command::SetHeatPump(on) => {
                if on {
                    self.pac.power_on(io, &mut self.timers, now_ms);
                } else {
                    self.pac.power_off(bus, &mut self.timers, now_ms);
                }
                self.persistent.heat_pump = on;
                self.dirty.devices = true;
                None
            }
            Command::SetEastValve(on) => {
                if on {
                    self.east_valve.start_manual(
                        io,
                        &mut self.timers,
                        self.params.east_valve_secs,
                        now_ms,
                    );
                } else {
                    self.east_valve.stop(io, &mut self.timers);
                }
                self.persistent.east_valve = on;
                self.dirty.devices = true;
                None
            }
            Command::Rearm => {
                self.arbiter.rearm();
                None
            }
            Command::WriteSchedule(table) => {
                self.table = table;
                self.dirty.table = true;
                None
            }
            Command::ReadSchedule => Some(Reply::Schedule(self.table.encode())),
            Command::WriteScheduleEnable(enables) => {
                self.enables = enables;
                self.dirty.enables = true;
                None
            }
            Command::ReadScheduleEnable => Some(Reply::ScheduleEnable(self.enables.encode())),
            Command::WriteDelayParams(params) => {
                self.params = params;
                self.retime_from_params();
                self.dirty.params = true;
                None
            }
            Command::ReadDelayParams => Some(Reply::DelayParams(self.params.encode())),
            Command::ReadStatus => self.status_snapshot(io),
        }
    }

    // ── Introspection ─────────────────────────────────────────

    pub fn flags(&self) -> &OperationFlags {
        self.arbiter.flags()
    }

    pub fn vmc_mode(&self) -> VmcMode {
        self.vmc.mode()
    }

    pub fn params(&self) -> &DelayParams {
        &self.params
    }

    pub fn schedule(&self) -> &ScheduleTable {
        &self.table
    }

    /// Set by a confirmed double-click after a pump lockout; the binary
    /// reboots the board when it sees this.
    pub fn restart_pending(&self) -> bool {
        self.restart_pending
    }

    // ── Internals ─────────────────────────────────────────────

    /// Re-seed the tunable timer periods after a parameter change. A
    /// running timer keeps its current deadline; the next start uses the
    /// new period.
    fn retime_from_params(&mut self) {
        self.timers
            .set_period(TimerId::Watering, u64::from(self.params.watering_secs) * 1000);
        self.timers
            .set_period(TimerId::TankFill, u64::from(self.params.tank_fill_secs) * 1000);
        self.timers.set_period(
            TimerId::PressurizerFill,
            u64::from(self.params.pressurizer_timeout_secs) * 1000,
        );
        self.timers.set_period(
            TimerId::EastValveRun,
            u64::from(self.params.east_valve_secs) * 1000,
        );
    }

    fn status_snapshot(&self, io: &impl IoPort) -> Option<Reply> {
        let flags = self.arbiter.flags();
        let snapshot = StatusSnapshot {
            vmc: self.vmc.mode().as_wire(),
            oven: io.read_output(OutputLine::Oven),
            heat_pump: io.read_output(OutputLine::HeatPump),
            pump: io.read_output(OutputLine::Pump),
            east_valve: self.east_valve.is_running(),
            watering: flags.is_watering,
            tank_filling: flags.is_tank_filling,
            pressurizer_filling: flags.pressurizer_filling,
            pressurizer_fault: flags.pressurizer_fault,
            pump_fault: flags.pump_fault,
            security_tripped: flags.security_tripped,
            day_counter: self.table.irrigation_day_counter(),
        };
        match serde_json::to_string(&snapshot) {
            Ok(json) => Some(Reply::Status(json)),
            Err(e) => {
                warn!("status snapshot serialization failed: {e}");
                None
            }
        }
    }

    /// Save every dirty document, clearing each flag only on success.
    fn persist_dirty(&mut self, storage: &mut impl StoragePort) {
        if self.dirty.table && save_doc(storage, StorageKey::Schedule, &self.table.encode()) {
            self.dirty.table = false;
        }
        if self.dirty.enables
            && save_doc(storage, StorageKey::ScheduleEnable, &self.enables.encode())
        {
            self.dirty.enables = false;
        }
        if self.dirty.params && save_doc(storage, StorageKey::DelayParams, &self.params.encode()) {
            self.dirty.params = false;
        }
        if self.dirty.devices
            && save_doc(storage, StorageKey::DeviceState, &self.persistent.encode())
        {
            self.dirty.devices = false;
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

/// Output and activity snapshot answering a status read.
#[derive(Debug, Serialize)]
struct StatusSnapshot {
    vmc: &'static str,
    oven: bool,
    heat_pump: bool,
    pump: bool,
    east_valve: bool,
    watering: bool,
    tank_filling: bool,
    pressurizer_filling: bool,
    pressurizer_fault: bool,
    pump_fault: bool,
    security_tripped: bool,
    day_counter: u8,
}

fn load_doc<T>(
    storage: &impl StoragePort,
    key: StorageKey,
    parse: impl FnOnce(&str) -> Result<T, ParseError>,
) -> Option<T> {
    match storage.load(key) {
        Ok(raw) => match parse(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("stored {} unreadable ({e}), keeping defaults", key.name());
                None
            }
        },
        Err(StorageError::NotFound) => {
            info!("no stored {}, first boot defaults", key.name());
            None
        }
        Err(e) => {
            warn!("loading {} failed: {e}", key.name());
            None
        }
    }
}

fn save_doc(storage: &mut impl StoragePort, key: StorageKey, value: &str) -> bool {
    match storage.save(key, value) {
        Ok(()) => true,
        Err(e) => {
            warn!("saving {} failed: {e}, will retry", key.name());
            false
        }
    }
}
