//! Error types for the persisted wire formats.
//!
//! Runtime faults (fill timeouts, security trips) are not errors in the
//! Rust sense — they are operation flags raised by the arbiter and
//! surfaced by the main loop. The only fallible parsing in the core is
//! the colon-delimited strings at the storage boundary.

use core::fmt;

/// Failure to parse a persisted colon-delimited string.
///
/// All variants are `Copy`; callers fall back to compiled defaults and
/// log the variant, so no allocation is ever needed on this path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The string did not contain the expected number of fields.
    FieldCount { expected: usize, got: usize },
    /// A field was not a valid unsigned integer.
    BadInteger,
    /// A field was outside its allowed range (hour 0–23, minute 0–59, ...).
    OutOfRange(&'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldCount { expected, got } => {
                write!(f, "expected {expected} fields, got {got}")
            }
            Self::BadInteger => write!(f, "field is not an integer"),
            Self::OutOfRange(what) => write!(f, "field out of range: {what}"),
        }
    }
}
