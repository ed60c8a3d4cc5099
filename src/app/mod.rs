//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules of the controller: command
//! handling, timer dispatch, schedule application and persistence. All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real
//! peripherals.

pub mod commands;
pub mod ports;
pub mod service;

pub use commands::{Command, Reply, WateringRequest};
pub use service::Controller;
