//! Controller-level flows: commands, pump arbitration, fault protocol,
//! persistence.

use homectrl::app::ports::{Channel, StorageKey};
use homectrl::app::{Command, Controller, WateringRequest};
use homectrl::config::DelayParams;
use homectrl::lines::{InputLine, OutputLine};

use crate::mock_hw::{MemoryNvs, MockIo, RecordingBus, TestClock};

/// Everything one scripted scenario needs, advancing simulated time in
/// one-second scrutation steps.
struct Rig {
    ctl: Controller,
    io: MockIo,
    bus: RecordingBus,
    nvs: MemoryNvs,
    clock: TestClock,
    now_ms: u64,
}

impl Rig {
    fn new() -> Self {
        Self {
            ctl: Controller::new(),
            io: MockIo::new(),
            bus: RecordingBus::new(),
            nvs: MemoryNvs::new(),
            clock: TestClock::unsynced(),
            now_ms: 0,
        }
    }

    fn tick(&mut self) {
        self.ctl.tick(
            self.now_ms,
            &self.clock,
            &mut self.io,
            &mut self.bus,
            &mut self.nvs,
        );
    }

    fn advance(&mut self, ms: u64) {
        let target = self.now_ms + ms;
        while self.now_ms < target {
            self.now_ms = (self.now_ms + 1000).min(target);
            self.tick();
        }
    }

    fn cmd(&mut self, cmd: Command) {
        self.ctl
            .handle_command(cmd, &mut self.io, &mut self.bus, self.now_ms);
    }
}

#[test]
fn timed_watering_session_expires() {
    let mut rig = Rig::new();
    rig.cmd(Command::SetWatering(WateringRequest::On));
    assert!(rig.io.on(OutputLine::Pump));
    assert!(rig.io.on(OutputLine::WateringValve));
    assert!(rig.io.on(OutputLine::Transformer));

    rig.advance(1_799_000);
    assert!(rig.ctl.flags().is_watering, "still inside the session");
    rig.advance(2_000);
    assert!(!rig.ctl.flags().is_watering);
    assert!(!rig.io.on(OutputLine::Pump));
    assert!(!rig.io.on(OutputLine::WateringValve));
}

#[test]
fn no_timeout_watering_runs_until_commanded_off() {
    let mut rig = Rig::new();
    rig.cmd(Command::SetWatering(WateringRequest::OnNoTimeout));
    rig.advance(2 * 3_600_000);
    assert!(rig.ctl.flags().is_watering, "no session timer armed");

    rig.cmd(Command::SetWatering(WateringRequest::Off));
    assert!(!rig.ctl.flags().is_watering);
    assert!(!rig.io.on(OutputLine::Pump));
}

#[test]
fn tank_fill_redirects_running_watering() {
    let mut rig = Rig::new();
    rig.cmd(Command::SetWatering(WateringRequest::On));
    let watermark = rig.io.writes.len();
    rig.cmd(Command::SetTankFilling(true));

    assert!(rig.io.on(OutputLine::Pump));
    assert!(rig.io.on(OutputLine::TankValve));
    assert!(!rig.io.on(OutputLine::WateringValve));
    assert!(
        !rig.io.writes[watermark..].contains(&(OutputLine::Pump, false)),
        "redirect must not cycle the pump"
    );
}

#[test]
fn pressurizer_contact_preempts_and_fill_completes() {
    let mut rig = Rig::new();
    rig.cmd(Command::SetWatering(WateringRequest::On));
    rig.io.set_contact(InputLine::PressurizerContact, true);
    rig.advance(1_000);

    assert!(!rig.ctl.flags().is_watering);
    assert!(rig.ctl.flags().pressurizer_filling);
    assert!(rig.io.on(OutputLine::Pump), "pump handed over, never stopped");
    assert!(!rig.io.on(OutputLine::WateringValve));

    // Pressure reached within the timeout: clean completion.
    rig.io.set_contact(InputLine::PressurizerContact, false);
    rig.advance(1_000);
    assert!(!rig.ctl.flags().pressurizer_filling);
    assert!(!rig.io.on(OutputLine::Pump));
}

#[test]
fn two_strike_fault_protocol_with_button_clicks() {
    let mut rig = Rig::new();
    rig.io.set_contact(InputLine::PressurizerContact, true);
    rig.advance(1_000);
    assert!(rig.ctl.flags().pressurizer_filling);

    // Strike one: 65 s timeout, recoverable fault, pump off.
    rig.advance(66_000);
    assert!(rig.ctl.flags().pressurizer_fault);
    assert!(!rig.io.on(OutputLine::Pump));
    assert_eq!(rig.bus.last_on(Channel::PressurizerFault), Some("on"));

    // No retry without a re-arm.
    rig.advance(30_000);
    assert!(!rig.io.on(OutputLine::Pump));

    // Single click re-arms; the retry starts on a following scrutation.
    rig.ctl.on_single_click();
    rig.advance(3_000);
    assert!(rig.io.on(OutputLine::Pump), "re-armed retry runs");
    assert_eq!(rig.bus.last_on(Channel::PressurizerFault), Some("off"));

    // Strike two: lockout.
    rig.advance(66_000);
    assert!(rig.ctl.flags().pump_fault);
    assert!(!rig.io.on(OutputLine::Pump));
    assert_eq!(rig.bus.last_on(Channel::PressurizerFault), Some("on2"));

    // A further single click cannot re-arm a lockout.
    rig.ctl.on_single_click();
    rig.advance(5_000);
    assert!(!rig.io.on(OutputLine::Pump));

    // Watering is refused too.
    rig.cmd(Command::SetWatering(WateringRequest::On));
    assert!(!rig.io.on(OutputLine::Pump));

    // Double click requests the restart escape hatch.
    assert!(!rig.ctl.restart_pending());
    rig.ctl.on_double_click();
    rig.advance(1_000);
    assert!(rig.ctl.restart_pending());
}

#[test]
fn security_trips_once_and_persists_the_disable() {
    let mut rig = Rig::new();
    // Three quick fill cycles inside the rolling window.
    for _ in 0..3 {
        rig.io.set_contact(InputLine::PressurizerContact, true);
        rig.advance(1_000);
        rig.io.set_contact(InputLine::PressurizerContact, false);
        rig.advance(1_000);
    }
    assert_eq!(rig.bus.count_on(Channel::PressurizerSecurity), 0);

    // Fourth closure trips the monitor instead of starting the pump.
    rig.io.set_contact(InputLine::PressurizerContact, true);
    rig.advance(1_000);
    assert!(!rig.io.on(OutputLine::Pump));
    assert_eq!(rig.bus.count_on(Channel::PressurizerSecurity), 1);

    let stored = rig.nvs.get(StorageKey::DelayParams).expect("params persisted");
    let params = DelayParams::parse(stored).unwrap();
    assert!(!params.pressurizer_auto_fill);

    // Holding the contact closed stays silent: the trip fired once.
    rig.advance(60_000);
    assert_eq!(rig.bus.count_on(Channel::PressurizerSecurity), 1);
    assert!(!rig.io.on(OutputLine::Pump));
}

#[test]
fn fills_spread_across_windows_do_not_trip() {
    let mut rig = Rig::new();
    // Two fills, then the window expires, then two more.
    for _ in 0..2 {
        rig.io.set_contact(InputLine::PressurizerContact, true);
        rig.advance(1_000);
        rig.io.set_contact(InputLine::PressurizerContact, false);
        rig.advance(1_000);
    }
    rig.advance(3_601_000);
    for _ in 0..2 {
        rig.io.set_contact(InputLine::PressurizerContact, true);
        rig.advance(1_000);
        rig.io.set_contact(InputLine::PressurizerContact, false);
        rig.advance(1_000);
    }
    assert_eq!(rig.bus.count_on(Channel::PressurizerSecurity), 0);
    assert!(rig.ctl.params().pressurizer_auto_fill);
}

#[test]
fn remote_contact_flip_flop_controls_watering() {
    let mut rig = Rig::new();
    rig.io.set_contact(InputLine::WateringRemote, true);
    rig.advance(1_000);
    assert!(rig.ctl.flags().is_watering);

    // Held: one toggle per press.
    rig.advance(5_000);
    assert!(rig.ctl.flags().is_watering);

    rig.io.set_contact(InputLine::WateringRemote, false);
    rig.advance(1_000);
    rig.io.set_contact(InputLine::WateringRemote, true);
    rig.advance(1_000);
    assert!(!rig.ctl.flags().is_watering);
}

#[test]
fn failed_saves_retry_until_storage_recovers() {
    let mut rig = Rig::new();
    rig.nvs.fail_saves = true;
    rig.cmd(Command::SetCooking(true));
    rig.advance(1_000);
    assert!(rig.nvs.get(StorageKey::DeviceState).is_none());

    rig.nvs.fail_saves = false;
    rig.advance(1_000);
    assert_eq!(rig.nvs.get(StorageKey::DeviceState), Some("1:0:0:0:0"));
}

#[test]
fn commanded_state_survives_a_reboot() {
    let mut rig = Rig::new();
    rig.cmd(Command::SetCooking(true));
    rig.cmd(Command::SetHeatPump(true));
    rig.cmd(Command::SetVentilation(homectrl::devices::VmcCommand::On));
    rig.advance(1_000);

    // "Reboot": fresh controller over the same storage.
    let mut ctl2 = Controller::new();
    let mut io2 = MockIo::new();
    let mut bus2 = RecordingBus::new();
    ctl2.load(&rig.nvs);
    ctl2.restore_outputs(&mut io2, &mut bus2, 0);

    assert!(io2.on(OutputLine::Oven));
    assert!(io2.on(OutputLine::HeatPump));
    assert!(io2.on(OutputLine::Vmc));
    assert_eq!(ctl2.vmc_mode(), homectrl::devices::VmcMode::On);
    assert_eq!(bus2.last_on(Channel::VmcStatus), Some("5"));
}
