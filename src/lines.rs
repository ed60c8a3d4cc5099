//! Logical I/O line identifiers.
//!
//! The controller core addresses actuators and contacts by logical line,
//! never by GPIO number or shift-register bit. The hardware adapter owns
//! the mapping (and any electrical inversion — the heat-pump contactor is
//! wired normally-closed, so "on" means relay coil released).

/// Output lines driven by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputLine {
    /// Ventilation unit relay (slow speed).
    Vmc = 0,
    /// Heat-pump contactor. Inverted coil: logical on = coil released.
    HeatPump = 1,
    /// Oven power relay.
    Oven = 2,
    /// Main water pump.
    Pump = 3,
    /// 24 V transformer feeding the solenoid valves.
    Transformer = 4,
    /// Garden watering solenoid valve.
    WateringValve = 5,
    /// Reservoir tank-fill solenoid valve.
    TankValve = 6,
    /// East-garden solenoid valve (duty-cycle modulated).
    EastValve = 7,
}

impl OutputLine {
    /// All output lines, in snapshot order.
    pub const ALL: [OutputLine; 8] = [
        OutputLine::Vmc,
        OutputLine::HeatPump,
        OutputLine::Oven,
        OutputLine::Pump,
        OutputLine::Transformer,
        OutputLine::WateringValve,
        OutputLine::TankValve,
        OutputLine::EastValve,
    ];

    /// Short label used in the status snapshot and in logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Vmc => "vmc",
            Self::HeatPump => "pac",
            Self::Oven => "oven",
            Self::Pump => "pump",
            Self::Transformer => "transfo",
            Self::WateringValve => "watering",
            Self::TankValve => "tank",
            Self::EastValve => "east",
        }
    }
}

/// Input contacts polled by the controller (active state already
/// normalized by the hardware adapter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InputLine {
    /// Wireless watering remote (momentary, toggle semantics).
    WateringRemote = 0,
    /// Wireless tank-fill remote (momentary, toggle semantics).
    TankRemote = 1,
    /// Pressurizer pressure-switch contact. Closed = tank needs filling.
    PressurizerContact = 2,
}

impl InputLine {
    pub const fn label(self) -> &'static str {
        match self {
            Self::WateringRemote => "watering_remote",
            Self::TankRemote => "tank_remote",
            Self::PressurizerContact => "pressurizer",
        }
    }
}
