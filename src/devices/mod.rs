//! Device mode state machines: ventilation, heat pump, east valve.
//!
//! Each machine is an explicit enum-state struct driven by commands and
//! by the time-table scheduler. Time-delayed edges go through the
//! [`TimerEngine`](crate::timers::TimerEngine); the expiry handlers on
//! these types run under the restricted context.

pub mod east_valve;
pub mod pac;
pub mod vmc;

pub use east_valve::EastValve;
pub use pac::HeatPump;
pub use vmc::{Vmc, VmcCommand, VmcMode};
