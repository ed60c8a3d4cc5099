//! Time-table scheduler driving real devices through the controller.

use homectrl::app::ports::Channel;
use homectrl::app::{Command, Controller};
use homectrl::devices::{VmcCommand, VmcMode};
use homectrl::lines::OutputLine;
use homectrl::schedule::{
    Device, ScheduleEnable, ScheduleTable, TimeWindow, WindowEnable,
};

use crate::mock_hw::{MemoryNvs, MockIo, RecordingBus, TestClock};

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

    fn advance(&mut self, ms: u64) {
        let target = self.now_ms + ms;
        while self.now_ms < target {
            self.now_ms = (self.now_ms + 1000).min(target);
            self.ctl.tick(
                self.now_ms,
                &self.clock,
                &mut self.io,
                &mut self.bus,
                &mut self.nvs,
            );
        }
    }

    fn cmd(&mut self, cmd: Command) {
        self.ctl
            .handle_command(cmd, &mut self.io, &mut self.bus, self.now_ms);
    }

    fn install(&mut self, table: ScheduleTable, enables: ScheduleEnable) {
        self.cmd(Command::WriteSchedule(table));
        self.cmd(Command::WriteScheduleEnable(enables));
    }
}

fn window(enable: WindowEnable, sh: u8, sm: u8, eh: u8, em: u8) -> TimeWindow {
    TimeWindow {
        enable,
        start_hour: sh,
        start_min: sm,
        end_hour: eh,
        end_min: em,
    }
}

#[test]
fn vmc_fast_morning_window() {
    let mut rig = Rig::new();
    let mut table = ScheduleTable::default();
    *table.window_mut(Device::Ventilation, 0) = window(WindowEnable::FastOn, 6, 30, 8, 0);
    let mut enables = ScheduleEnable::default();
    enables.set(Device::Ventilation, true);
    rig.install(table, enables);
    rig.cmd(Command::SetVentilation(VmcCommand::Prog));
    assert_eq!(rig.ctl.vmc_mode(), VmcMode::ProgOff);

    rig.clock.set(6, 29);
    rig.advance(1_000);
    assert_eq!(rig.ctl.vmc_mode(), VmcMode::ProgOff, "one minute early");

    rig.clock.set(6, 30);
    rig.advance(1_000);
    assert_eq!(rig.ctl.vmc_mode(), VmcMode::ProgOnFast);
    assert!(rig.io.on(OutputLine::Vmc));

    // Remote fast board gets its speed after the power-up grace.
    rig.advance(11_000);
    assert_eq!(rig.bus.last_on(Channel::FastBoard), Some("on"));

    rig.clock.set(8, 0);
    rig.advance(1_000);
    assert_eq!(rig.ctl.vmc_mode(), VmcMode::ProgOff);
    assert!(!rig.io.on(OutputLine::Vmc));
}

#[test]
fn forced_vmc_mode_ignores_windows() {
    let mut rig = Rig::new();
    let mut table = ScheduleTable::default();
    *table.window_mut(Device::Ventilation, 0) = window(WindowEnable::On, 6, 30, 8, 0);
    let mut enables = ScheduleEnable::default();
    enables.set(Device::Ventilation, true);
    rig.install(table, enables);
    rig.cmd(Command::SetVentilation(VmcCommand::On));

    rig.clock.set(8, 0);
    rig.advance(1_000);
    assert_eq!(rig.ctl.vmc_mode(), VmcMode::On, "window end must not stop a forced mode");
    assert!(rig.io.on(OutputLine::Vmc));
}

#[test]
fn cooking_window_start_is_inert_and_end_cuts_power() {
    let mut rig = Rig::new();
    let mut table = ScheduleTable::default();
    *table.window_mut(Device::CookingPower, 0) = window(WindowEnable::On, 12, 0, 13, 0);
    let mut enables = ScheduleEnable::default();
    enables.set(Device::CookingPower, true);
    rig.install(table, enables);

    // No scheduled power-on: the oven is switched on by hand.
    rig.clock.set(12, 0);
    rig.advance(1_000);
    assert!(!rig.io.on(OutputLine::Oven));

    rig.cmd(Command::SetCooking(true));
    assert!(rig.io.on(OutputLine::Oven));

    rig.clock.set(13, 0);
    rig.advance(1_000);
    assert!(!rig.io.on(OutputLine::Oven));
    assert_eq!(rig.bus.last_on(Channel::CookingStatus), Some("off"));

    // The cut-off also clears the persisted oven state.
    rig.advance(1_000);
    let devices = rig
        .nvs
        .get(homectrl::app::ports::StorageKey::DeviceState)
        .unwrap();
    assert!(devices.starts_with("0:"), "persisted: {devices}");
}

#[test]
fn disabled_device_windows_are_inert() {
    let mut rig = Rig::new();
    let mut table = ScheduleTable::default();
    *table.window_mut(Device::CookingPower, 0) = window(WindowEnable::On, 12, 0, 13, 0);
    rig.install(table, ScheduleEnable::default());
    rig.cmd(Command::SetCooking(true));

    rig.clock.set(13, 0);
    rig.advance(1_000);
    assert!(
        rig.io.on(OutputLine::Oven),
        "cut-off must not fire while the device is unscheduled"
    );
}

#[test]
fn east_valve_window_modulates_at_table_duty() {
    let mut rig = Rig::new();
    let mut table = ScheduleTable::default();
    *table.window_mut(Device::EastValve, 0) = window(WindowEnable::On, 8, 0, 9, 0);
    // Duty rides in the last east-valve window's start-hour field.
    table.window_mut(Device::EastValve, 3).start_hour = 5;
    let mut enables = ScheduleEnable::default();
    enables.set(Device::EastValve, true);
    rig.install(table, enables);

    rig.clock.set(8, 0);
    rig.advance(1_000);
    assert!(rig.io.on(OutputLine::Transformer));

    // One full 100 s modulation period: 20 steps, 5 energized.
    let watermark = rig.io.writes.len();
    rig.advance(100_000);
    let steps: Vec<bool> = rig.io.writes[watermark..]
        .iter()
        .filter(|(line, _)| *line == OutputLine::EastValve)
        .map(|(_, on)| *on)
        .collect();
    assert_eq!(steps.len(), 20);
    assert_eq!(steps.iter().filter(|on| **on).count(), 5);

    rig.clock.set(9, 0);
    rig.advance(1_000);
    assert!(!rig.io.on(OutputLine::EastValve));
    assert!(!rig.io.on(OutputLine::Transformer));
}

#[test]
fn scheduled_irrigation_fills_the_tank() {
    let mut rig = Rig::new();
    let mut table = ScheduleTable::default();
    // Window 0's end fields carry the day counter, so real windows
    // start at index 1.
    *table.window_mut(Device::Irrigation, 1) = window(WindowEnable::On, 7, 0, 7, 45);
    let mut enables = ScheduleEnable::default();
    enables.set(Device::Irrigation, true);
    rig.install(table, enables);

    rig.clock.set(7, 0);
    rig.advance(1_000);
    assert!(rig.ctl.flags().is_tank_filling);
    assert!(!rig.ctl.flags().is_watering);
    assert!(rig.io.on(OutputLine::TankValve));
    assert!(rig.io.on(OutputLine::Pump));

    // The window end is not what stops a running fill.
    rig.clock.set(7, 45);
    rig.advance(1_000);
    assert!(rig.ctl.flags().is_tank_filling);
    assert!(rig.io.on(OutputLine::Pump));

    // The fill's own monostable ends it.
    rig.advance(600_000);
    assert!(!rig.ctl.flags().is_tank_filling);
    assert!(!rig.io.on(OutputLine::Pump));
    assert!(!rig.io.on(OutputLine::TankValve));
}

#[test]
fn remote_valve_pulses_at_window_start_once_the_interval_elapses() {
    let mut rig = Rig::new();
    let mut table = ScheduleTable::default();
    // Pulse the autonomous valve every 2 days.
    table.window_mut(Device::Irrigation, 0).end_hour = 2;
    *table.window_mut(Device::Irrigation, 1) = window(WindowEnable::On, 21, 0, 21, 30);
    let mut enables = ScheduleEnable::default();
    enables.set(Device::Irrigation, true);
    rig.install(table, enables);

    // First midnight: one day on the counter, below the interval.
    rig.clock.set(0, 0);
    rig.advance(1_000);
    assert_eq!(rig.ctl.schedule().irrigation_day_counter(), 1);

    // A window start below the interval fills the tank but stays quiet.
    rig.clock.set(21, 0);
    rig.advance(1_000);
    assert_eq!(rig.bus.count_on(Channel::RemoteValve), 0);

    // Second midnight reaches the interval. Midnight itself only
    // counts; the pulse waits for the window start.
    rig.clock.set(1, 0);
    rig.advance(1_000);
    rig.clock.set(0, 0);
    rig.advance(1_000);
    assert_eq!(rig.ctl.schedule().irrigation_day_counter(), 2);
    assert_eq!(rig.bus.count_on(Channel::RemoteValve), 0);

    // The next window start pulses and restarts the count.
    rig.clock.set(21, 0);
    rig.advance(1_000);
    assert_eq!(rig.bus.last_on(Channel::RemoteValve), Some("on"));
    assert_eq!(rig.ctl.schedule().irrigation_day_counter(), 0);

    // The reset round-trips through the persisted table.
    let stored = ScheduleTable::parse(rig.nvs.get(
        homectrl::app::ports::StorageKey::Schedule,
    ).unwrap())
    .unwrap();
    assert_eq!(stored.irrigation_day_counter(), 0);

    // The valve closes on its own; an hour later the bus mirrors it.
    rig.advance(3_601_000);
    assert_eq!(rig.bus.last_on(Channel::RemoteValve), Some("off"));
}

#[test]
fn midnight_only_counts_even_past_the_interval() {
    let mut rig = Rig::new();
    let mut table = ScheduleTable::default();
    table.window_mut(Device::Irrigation, 0).end_hour = 1;
    rig.install(table, ScheduleEnable::default());

    rig.clock.set(0, 0);
    rig.advance(1_000);
    assert_eq!(rig.ctl.schedule().irrigation_day_counter(), 1);
    assert_eq!(
        rig.bus.count_on(Channel::RemoteValve),
        0,
        "the pulse belongs to the window start"
    );

    // The counter survives in the persisted table.
    let stored = ScheduleTable::parse(rig.nvs.get(
        homectrl::app::ports::StorageKey::Schedule,
    ).unwrap())
    .unwrap();
    assert_eq!(stored.irrigation_day_counter(), 1);
}

#[test]
fn midnight_fires_once_per_day() {
    let mut rig = Rig::new();
    rig.clock.set(0, 0);
    rig.advance(10_000);
    assert_eq!(rig.ctl.schedule().irrigation_day_counter(), 1);
    // Still 00:00 many ticks later: no double count.
    rig.advance(50_000);
    assert_eq!(rig.ctl.schedule().irrigation_day_counter(), 1);
}

#[test]
fn unsynced_clock_leaves_schedule_idle() {
    let mut rig = Rig::new();
    let mut table = ScheduleTable::default();
    *table.window_mut(Device::Ventilation, 0) = window(WindowEnable::On, 0, 0, 23, 59);
    let mut enables = ScheduleEnable::default();
    enables.set(Device::Ventilation, true);
    rig.install(table, enables);
    rig.cmd(Command::SetVentilation(VmcCommand::Prog));

    rig.advance(3_600_000);
    assert_eq!(rig.ctl.vmc_mode(), VmcMode::ProgOff);
    assert!(!rig.io.on(OutputLine::Vmc));
}
