//! Runtime-tunable delay parameters and persisted device state.
//!
//! Both structures travel over storage as flat colon-joined integer
//! lists (the format the previous relay-box controller used, kept for
//! compatibility). Parsing happens once here at the storage boundary;
//! the rest of the core only ever sees the typed structures.

use core::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Split a colon-joined integer list into exactly `expected` fields.
pub(crate) fn split_ints<const N: usize>(
    s: &str,
    expected: usize,
) -> Result<heapless::Vec<u32, N>, ParseError> {
    let mut fields = heapless::Vec::new();
    for part in s.trim().trim_end_matches(':').split(':') {
        let v: u32 = part.trim().parse().map_err(|_| ParseError::BadInteger)?;
        fields.push(v).map_err(|_| ParseError::FieldCount {
            expected,
            got: fields.len() + 1,
        })?;
    }
    if fields.len() != expected {
        return Err(ParseError::FieldCount {
            expected,
            got: fields.len(),
        });
    }
    Ok(fields)
}

// ───────────────────────────────────────────────────────────────
// Delay parameters
// ───────────────────────────────────────────────────────────────

/// Wire field count including the security-enable flag.
const DELAY_FIELDS: usize = 8;
/// Older controllers persisted 7 fields (no security flag).
const DELAY_FIELDS_LEGACY: usize = 7;

/// Named delay/option settings, mutated at runtime by remote command.
///
/// The arbiter and device machines read these live on every relevant
/// transition — never cached — so a changed timeout applies to the next
/// activation without a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayParams {
    /// Max duration of a timed manual watering session (seconds).
    pub watering_secs: u32,
    /// Duration of a reservoir tank-fill session (seconds).
    pub tank_fill_secs: u32,
    /// Duration of a manual east-valve run (seconds).
    pub east_valve_secs: u32,
    /// Pressurizer fill timeout before a fault is raised (seconds).
    pub pressurizer_timeout_secs: u32,
    /// Daylight-saving offset applied to the wall clock.
    pub summer_time: bool,
    /// Verbose activity logging.
    pub verbose_log: bool,
    /// Pressurizer auto-fill on contact closure. Cleared by the
    /// security monitor when it trips.
    pub pressurizer_auto_fill: bool,
    /// Activation-frequency security monitor.
    pub pressurizer_security: bool,
}

impl Default for DelayParams {
    fn default() -> Self {
        Self {
            watering_secs: 1800,
            tank_fill_secs: 600,
            east_valve_secs: 150,
            pressurizer_timeout_secs: 65,
            summer_time: true,
            verbose_log: false,
            pressurizer_auto_fill: true,
            pressurizer_security: true,
        }
    }
}

impl DelayParams {
    /// Parse the persisted colon string. Accepts the legacy 7-field
    /// layout, in which case the security monitor defaults to enabled.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let trimmed = s.trim().trim_end_matches(':');
        let n_fields = trimmed.split(':').count();
        let legacy = n_fields == DELAY_FIELDS_LEGACY;
        let expected = if legacy { DELAY_FIELDS_LEGACY } else { DELAY_FIELDS };
        let f = split_ints::<DELAY_FIELDS>(s, expected)?;
        Ok(Self {
            watering_secs: f[0],
            tank_fill_secs: f[1],
            east_valve_secs: f[2],
            pressurizer_timeout_secs: f[3],
            summer_time: f[4] != 0,
            verbose_log: f[5] != 0,
            pressurizer_auto_fill: f[6] != 0,
            pressurizer_security: if legacy { true } else { f[7] != 0 },
        })
    }

    /// Encode to the persisted colon string (always the 8-field layout).
    pub fn encode(&self) -> heapless::String<96> {
        let mut out = heapless::String::new();
        let _ = write!(
            out,
            "{}:{}:{}:{}:{}:{}:{}:{}",
            self.watering_secs,
            self.tank_fill_secs,
            self.east_valve_secs,
            self.pressurizer_timeout_secs,
            u8::from(self.summer_time),
            u8::from(self.verbose_log),
            u8::from(self.pressurizer_auto_fill),
            u8::from(self.pressurizer_security),
        );
        out
    }
}

// ───────────────────────────────────────────────────────────────
// Persisted device state
// ───────────────────────────────────────────────────────────────

const PERSIST_FIELDS: usize = 5;

/// Commanded device state surviving reboot.
///
/// Written on every commanded transition of a persistent-flagged device
/// and replayed once at start-up to restore the actuators. Ventilation
/// keeps the full commanded mode (0–3), not just on/off, so a `Prog`
/// selection survives a power cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentState {
    pub cooking: bool,
    pub irrigation: bool,
    pub east_valve: bool,
    pub heat_pump: bool,
    /// Commanded ventilation mode, 0=Off 1=Prog 2=OnFast 3=On.
    pub ventilation_cmd: u8,
}

impl Default for PersistentState {
    fn default() -> Self {
        Self {
            cooking: false,
            irrigation: false,
            east_valve: false,
            heat_pump: true,
            ventilation_cmd: 0,
        }
    }
}

impl PersistentState {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let f = split_ints::<PERSIST_FIELDS>(s, PERSIST_FIELDS)?;
        if f[4] > 3 {
            return Err(ParseError::OutOfRange("ventilation command 0-3"));
        }
        Ok(Self {
            cooking: f[0] != 0,
            irrigation: f[1] != 0,
            east_valve: f[2] != 0,
            heat_pump: f[3] != 0,
            ventilation_cmd: f[4] as u8,
        })
    }

    pub fn encode(&self) -> heapless::String<32> {
        let mut out = heapless::String::new();
        let _ = write!(
            out,
            "{}:{}:{}:{}:{}",
            u8::from(self.cooking),
            u8::from(self.irrigation),
            u8::from(self.east_valve),
            u8::from(self.heat_pump),
            self.ventilation_cmd,
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_sane() {
        let p = DelayParams::default();
        assert!(p.watering_secs > 0);
        assert!(p.tank_fill_secs > 0);
        assert!(p.east_valve_secs > 0);
        assert!(p.pressurizer_timeout_secs > 0);
        assert!(p.pressurizer_auto_fill);
        assert!(p.pressurizer_security);
    }

    #[test]
    fn params_wire_roundtrip() {
        let p = DelayParams::default();
        let s = p.encode();
        assert_eq!(s.as_str(), "1800:600:150:65:1:0:1:1");
        let p2 = DelayParams::parse(&s).unwrap();
        assert_eq!(p, p2);
    }

    #[test]
    fn params_accept_legacy_seven_fields() {
        let p = DelayParams::parse("1800:600:150:65:1:0:1").unwrap();
        assert_eq!(p.watering_secs, 1800);
        assert!(p.pressurizer_security, "legacy strings default security on");
    }

    #[test]
    fn params_accept_trailing_colon() {
        // The previous controller serialized with a trailing separator.
        let p = DelayParams::parse("1800:600:150:65:1:0:1:0:").unwrap();
        assert!(!p.pressurizer_security);
    }

    #[test]
    fn params_reject_bad_field_count() {
        assert!(matches!(
            DelayParams::parse("1:2:3"),
            Err(ParseError::FieldCount { .. })
        ));
    }

    #[test]
    fn params_reject_garbage() {
        assert!(matches!(
            DelayParams::parse("1800:abc:150:65:1:0:1"),
            Err(ParseError::BadInteger)
        ));
    }

    #[test]
    fn params_serde_roundtrip() {
        let p = DelayParams::default();
        let json = serde_json::to_string(&p).unwrap();
        let p2: DelayParams = serde_json::from_str(&json).unwrap();
        assert_eq!(p, p2);
    }

    #[test]
    fn persistent_wire_roundtrip() {
        let d = PersistentState::default();
        assert_eq!(d.encode().as_str(), "0:0:0:1:0");
        let d2 = PersistentState::parse(&d.encode()).unwrap();
        assert_eq!(d, d2);
    }

    #[test]
    fn persistent_rejects_bad_vmc_command() {
        assert!(matches!(
            PersistentState::parse("0:0:0:1:7"),
            Err(ParseError::OutOfRange(_))
        ));
    }
}
