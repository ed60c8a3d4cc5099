//! Ventilation (VMC) mode state machine.
//!
//! Two inputs drive it: a *command* from the operator or the bus, and a
//! *schedule signal* set exclusively by the time-table scheduler. The
//! signal only matters while the commanded mode is `Prog` — a forced
//! `On`/`OnFast`/`Off` ignores the schedule entirely.
//!
//! Fast speed lives on an auxiliary remote board that needs a power-up
//! grace period before it accepts commands, so entering an "on" mode
//! arms a one-shot pulse timer; at expiry the board is told "on" or
//! "off" depending on the mode that ended up current.

use log::info;

use crate::app::ports::{Channel, IoPort, MessagePort, Restricted};
use crate::lines::OutputLine;
use crate::timers::{TimerEngine, TimerId};

/// Observable ventilation state, published on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VmcMode {
    Stop = 0,
    ProgOff = 1,
    ProgOn = 2,
    ProgOnFast = 3,
    OnFast = 4,
    On = 5,
}

impl VmcMode {
    /// Wire value for the status channel.
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Stop => "0",
            Self::ProgOff => "1",
            Self::ProgOn => "2",
            Self::ProgOnFast => "3",
            Self::OnFast => "4",
            Self::On => "5",
        }
    }

    const fn is_prog(self) -> bool {
        matches!(self, Self::ProgOff | Self::ProgOn | Self::ProgOnFast)
    }

    const fn relay_on(self) -> bool {
        matches!(self, Self::ProgOn | Self::ProgOnFast | Self::OnFast | Self::On)
    }
}

/// Commanded mode — an input, not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VmcCommand {
    Off = 0,
    Prog = 1,
    OnFast = 2,
    On = 3,
}

impl VmcCommand {
    pub const fn from_wire(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Off),
            1 => Some(Self::Prog),
            2 => Some(Self::OnFast),
            3 => Some(Self::On),
            _ => None,
        }
    }
}

pub struct Vmc {
    mode: VmcMode,
    /// Fast-board speed requested; read by the pulse-timer expiry.
    fast: bool,
    /// 0 = off, 1 = on slow, 2 = on fast. Scheduler-owned.
    schedule_signal: u8,
}

impl Default for Vmc {
    fn default() -> Self {
        Self::new()
    }
}

impl Vmc {
    pub fn new() -> Self {
        Self {
            mode: VmcMode::Stop,
            fast: false,
            schedule_signal: 0,
        }
    }

    pub fn mode(&self) -> VmcMode {
        self.mode
    }

    /// Apply an operator/bus command. Main-loop context.
    pub fn apply_command(
        &mut self,
        cmd: VmcCommand,
        io: &mut impl IoPort,
        bus: &mut impl MessagePort,
        timers: &mut TimerEngine,
        now_ms: u64,
    ) {
        let target = match cmd {
            VmcCommand::Off => {
                self.fast = false;
                VmcMode::Stop
            }
            VmcCommand::Prog => match self.schedule_signal {
                1 => {
                    self.fast = false;
                    VmcMode::ProgOn
                }
                2 => {
                    self.fast = true;
                    timers.restart(TimerId::FastBoardPulse, now_ms);
                    VmcMode::ProgOnFast
                }
                _ => {
                    self.fast = false;
                    VmcMode::ProgOff
                }
            },
            VmcCommand::OnFast => {
                self.fast = true;
                timers.restart(TimerId::FastBoardPulse, now_ms);
                VmcMode::OnFast
            }
            VmcCommand::On => {
                // The board still gets a pulse so a previous fast
                // selection is walked back after its grace period.
                self.fast = false;
                timers.restart(TimerId::FastBoardPulse, now_ms);
                VmcMode::On
            }
        };
        self.transition(target, io, bus);
    }

    /// Scheduler window-start edge. Only acts while in a `Prog*` mode;
    /// a forced `Stop`/`On`/`OnFast` is left alone.
    pub fn schedule_on(
        &mut self,
        fast: bool,
        io: &mut impl IoPort,
        bus: &mut impl MessagePort,
        timers: &mut TimerEngine,
        now_ms: u64,
    ) {
        self.schedule_signal = if fast { 2 } else { 1 };
        if !self.mode.is_prog() {
            return;
        }
        let target = if fast {
            self.fast = true;
            timers.restart(TimerId::FastBoardPulse, now_ms);
            VmcMode::ProgOnFast
        } else {
            self.fast = false;
            VmcMode::ProgOn
        };
        self.transition(target, io, bus);
    }

    /// Scheduler window-end edge.
    pub fn schedule_off(&mut self, io: &mut impl IoPort, bus: &mut impl MessagePort) {
        self.schedule_signal = 0;
        if !self.mode.is_prog() {
            return;
        }
        self.fast = false;
        self.transition(VmcMode::ProgOff, io, bus);
    }

    /// Pulse-timer expiry: the fast board finished its power-up grace.
    pub fn on_fast_board_pulse<IO: IoPort, M: MessagePort>(
        &mut self,
        r: &mut Restricted<'_, IO, M>,
    ) {
        r.bus
            .publish(Channel::FastBoard, if self.fast { "on" } else { "off" });
    }

    /// Move to `target`, touching the relay only on an actual on/off
    /// edge (re-entering an already-on mode must not re-trigger it),
    /// and publish the new mode.
    fn transition(&mut self, target: VmcMode, io: &mut impl IoPort, bus: &mut impl MessagePort) {
        if target.relay_on() != self.mode.relay_on() {
            io.write(OutputLine::Vmc, target.relay_on());
        }
        if target != self.mode {
            info!("vmc: {:?} -> {:?}", self.mode, target);
        }
        self.mode = target;
        bus.publish(Channel::VmcStatus, target.as_wire());
    }
}
