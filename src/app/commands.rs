//! Inbound commands to the controller.
//!
//! These represent actions requested by the outside world (message bus,
//! serial console, start-up state replay) that the
//! [`Controller`](super::service::Controller) interprets and acts upon.
//! Wire strings are parsed here, at the boundary; the controller itself
//! only ever sees typed values.

use crate::config::DelayParams;
use crate::devices::VmcCommand;
use crate::error::ParseError;
use crate::schedule::{ScheduleEnable, ScheduleTable};

/// Watering request flavours, wire values 0/1/2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WateringRequest {
    Off,
    /// Bounded by the configured watering duration.
    On,
    /// Runs until an explicit `Off`.
    OnNoTimeout,
}

/// Commands the external adapters can send into the controller core.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetWatering(WateringRequest),
    SetTankFilling(bool),
    SetCooking(bool),
    SetVentilation(VmcCommand),
    SetHeatPump(bool),
    SetEastValve(bool),
    /// Consume a pending recoverable pressurizer fault.
    Rearm,
    WriteSchedule(ScheduleTable),
    ReadSchedule,
    WriteScheduleEnable(ScheduleEnable),
    ReadScheduleEnable,
    WriteDelayParams(DelayParams),
    ReadDelayParams,
    ReadStatus,
}

/// Reply to a read command. The adapter that carried the command decides
/// where the encoded string goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Schedule(heapless::String<512>),
    ScheduleEnable(heapless::String<16>),
    DelayParams(heapless::String<96>),
    /// JSON snapshot of outputs and activity flags.
    Status(String),
}

impl Command {
    /// Parse a (topic, payload) pair from the command bus. A `?` payload
    /// on the document topics requests a read-back.
    pub fn parse(topic: &str, payload: &str) -> Result<Self, ParseError> {
        let payload = payload.trim();
        match topic {
            "watering" => Ok(Self::SetWatering(match payload {
                "0" => WateringRequest::Off,
                "1" => WateringRequest::On,
                "2" => WateringRequest::OnNoTimeout,
                _ => return Err(ParseError::OutOfRange("watering 0-2")),
            })),
            "tank" => Ok(Self::SetTankFilling(parse_bool(payload)?)),
            "cooking" => Ok(Self::SetCooking(parse_bool(payload)?)),
            "vmc" => {
                let v: u8 = payload.parse().map_err(|_| ParseError::BadInteger)?;
                VmcCommand::from_wire(v)
                    .map(Self::SetVentilation)
                    .ok_or(ParseError::OutOfRange("vmc command 0-3"))
            }
            "pac" => Ok(Self::SetHeatPump(parse_bool(payload)?)),
            "east-valve" => Ok(Self::SetEastValve(parse_bool(payload)?)),
            "rearm" => Ok(Self::Rearm),
            "schedule" => {
                if payload == "?" {
                    Ok(Self::ReadSchedule)
                } else {
                    ScheduleTable::parse(payload).map(Self::WriteSchedule)
                }
            }
            "schedule/enable" => {
                if payload == "?" {
                    Ok(Self::ReadScheduleEnable)
                } else {
                    ScheduleEnable::parse(payload).map(Self::WriteScheduleEnable)
                }
            }
            "delays" => {
                if payload == "?" {
                    Ok(Self::ReadDelayParams)
                } else {
                    DelayParams::parse(payload).map(Self::WriteDelayParams)
                }
            }
            "status" => Ok(Self::ReadStatus),
            _ => Err(ParseError::OutOfRange("unknown command topic")),
        }
    }
}

fn parse_bool(payload: &str) -> Result<bool, ParseError> {
    match payload {
        "0" | "off" => Ok(false),
        "1" | "on" => Ok(true),
        _ => Err(ParseError::OutOfRange("expected 0/1/on/off")),
    }
}
