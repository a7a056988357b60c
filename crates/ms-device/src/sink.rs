//! Dry-run sink.

use crate::traits::{DeviceError, MidiSink};

/// Writes every outgoing message to the log instead of a port.
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl MidiSink for LogSink {
    fn send(&mut self, bytes: &[u8]) -> Result<(), DeviceError> {
        log::trace!("midi out: {:02X?}", bytes);
        Ok(())
    }
}
