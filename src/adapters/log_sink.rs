//! Log-based message bus adapter.
//!
//! Implements [`MessagePort`] by writing every outbound status message
//! to the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! An MQTT or serial-protocol adapter would implement the same trait;
//! the domain core does not care where the messages end up.

use log::info;

use crate::app::ports::{Channel, MessagePort};

/// Adapter that logs every published status message.
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagePort for LogSink {
    fn publish(&mut self, channel: Channel, payload: &str) {
        info!("BUS | {} = {}", channel.name(), payload);
    }
}
