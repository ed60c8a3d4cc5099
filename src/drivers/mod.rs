//! Peripheral drivers: front-panel button and the task watchdog.

pub mod button;
pub mod watchdog;
