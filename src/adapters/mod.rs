//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements    | Connects to                  |
//! |------------|---------------|------------------------------|
//! | `hardware` | IoPort        | ESP32 GPIO relay board       |
//! | `log_sink` | MessagePort   | Serial log output            |
//! | `nvs`      | StoragePort   | NVS / in-memory store        |
//! | `time`     | ClockPort     | ESP32 timer + system clock   |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
