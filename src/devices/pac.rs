//! Heat-pump (PAC) power sequencing.
//!
//! The unit is switched two ways at once: a contactor cutting mains
//! power, and an infrared command the indoor unit listens for. The
//! contactor coil is wired normally closed (de-energized = unit
//! powered); the [`IoPort`](crate::app::ports::IoPort) adapter hides
//! the inversion, so `write(HeatPump, true)` means "mains present".
//!
//! Power-off is graceful: the IR "off" goes out immediately and is
//! re-published every 15 s from the main loop (IR is line-of-sight and
//! misses happen), while the contactor only opens after a grace period
//! protecting the compressor. Power-on drives mains at once and then
//! resends the IR "on" a few times from a delayed timer for the same
//! line-of-sight reason.

use log::info;

use crate::app::ports::{Channel, IoPort, MessagePort, Restricted};
use crate::lines::OutputLine;
use crate::timers::{TimerEngine, TimerId};

/// IR "on" resend attempts after power-on.
pub const IR_MAX_RESENDS: u8 = 4;
/// IR "off" re-publication interval while powering down (main loop).
pub const IR_OFF_REPEAT_MS: u64 = 15_000;

pub struct HeatPump {
    powered: bool,
    powering_off: bool,
    ir_resends: u8,
    last_ir_off_ms: u64,
}

impl Default for HeatPump {
    fn default() -> Self {
        Self::new()
    }
}

impl HeatPump {
    pub fn new() -> Self {
        Self {
            powered: false,
            powering_off: false,
            ir_resends: 0,
            last_ir_off_ms: 0,
        }
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn is_powering_off(&self) -> bool {
        self.powering_off
    }

    /// Power the unit on. Cancels a pending delayed power-off.
    pub fn power_on(&mut self, io: &mut impl IoPort, timers: &mut TimerEngine, now_ms: u64) {
        info!("pac: power on");
        self.powering_off = false;
        self.powered = true;
        io.write(OutputLine::HeatPump, true);
        self.ir_resends = 0;
        timers.restart(TimerId::PacIrResend, now_ms);
        timers.stop(TimerId::PacPowerOff);
    }

    /// Begin the graceful power-off sequence.
    pub fn power_off(
        &mut self,
        bus: &mut impl MessagePort,
        timers: &mut TimerEngine,
        now_ms: u64,
    ) {
        if self.powering_off {
            return;
        }
        info!("pac: power off (contactor opens after grace period)");
        self.powering_off = true;
        timers.stop(TimerId::PacIrResend);
        timers.restart(TimerId::PacPowerOff, now_ms);
        bus.publish(Channel::PacIr, "off");
        self.last_ir_off_ms = now_ms;
    }

    /// Grace-period expiry: the actual contactor transition. Restricted
    /// context, so no persistence here — the commanded state was saved
    /// when the command arrived.
    pub fn on_power_off_elapsed<IO: IoPort, M: MessagePort>(
        &mut self,
        r: &mut Restricted<'_, IO, M>,
    ) {
        r.io.write(OutputLine::HeatPump, false);
        self.powered = false;
        self.powering_off = false;
    }

    /// Delayed IR-resend expiry: one "on" per expiry, a bounded number
    /// of times.
    pub fn on_ir_resend<IO: IoPort, M: MessagePort>(&mut self, r: &mut Restricted<'_, IO, M>) {
        r.bus.publish(Channel::PacIr, "on");
        self.ir_resends += 1;
        if self.ir_resends >= IR_MAX_RESENDS {
            r.timers.stop(TimerId::PacIrResend);
            self.ir_resends = 0;
        }
    }

    /// Main-loop tick: keep repeating the IR "off" while winding down.
    pub fn tick(&mut self, bus: &mut impl MessagePort, now_ms: u64) {
        if self.powering_off && now_ms.saturating_sub(self.last_ir_off_ms) >= IR_OFF_REPEAT_MS {
            bus.publish(Channel::PacIr, "off");
            self.last_ir_off_ms = now_ms;
        }
    }
}
