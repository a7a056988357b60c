//! Output device trait and error types.

use ms_ir::{NativeEvent, ShortMessage};
use thiserror::Error;

/// Error type for device operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No output port available
    #[error("no MIDI output device available")]
    NoDevice,
    /// Failed to open or initialize the device
    #[error("device init error: {0}")]
    DeviceInit(String),
    /// A stream property (time division, tempo) was rejected
    #[error("property rejected: {0}")]
    Property(String),
    /// A buffer could not be queued
    #[error("buffer submission rejected: {0}")]
    Submit(String),
    /// Writing a message to the port failed
    #[error("send failed: {0}")]
    Send(String),
    /// The device has been closed
    #[error("device closed")]
    Closed,
}

/// A sequencer-style MIDI output stream.
///
/// Buffers handed to [`submit`](Self::submit) are played in order, timed by
/// their delta times. When a buffer has been fully consumed the device posts
/// on the [`CompletionNotifier`](crate::CompletionNotifier) it was opened
/// with; that notification is the only thing it may do from its own context.
pub trait OutputDevice: Send + Sync {
    /// Set ticks per quarter note (or SMPTE frames/ticks when bit 15 is set).
    fn set_time_division(&self, division: u16) -> Result<(), DeviceError>;

    /// Set microseconds per quarter note.
    fn set_tempo(&self, micros_per_beat: u32) -> Result<(), DeviceError>;

    /// Queue a buffer for playback. The device keeps its own copy.
    fn submit(&self, events: &[NativeEvent]) -> Result<(), DeviceError>;

    /// Send a message right away, bypassing the queue.
    fn send_immediate(&self, message: ShortMessage) -> Result<(), DeviceError>;

    /// Start (or restart) consuming queued buffers.
    fn start(&self) -> Result<(), DeviceError>;

    /// Halt playback, silence notes and return every queued buffer.
    fn stop(&self) -> Result<(), DeviceError>;

    fn pause(&self) -> Result<(), DeviceError>;

    fn resume(&self) -> Result<(), DeviceError>;

    /// Silence notes and reset controllers on every channel.
    fn reset(&self) -> Result<(), DeviceError>;

    fn close(&self) -> Result<(), DeviceError>;
}

/// Destination for raw MIDI bytes.
pub trait MidiSink: Send + 'static {
    fn send(&mut self, bytes: &[u8]) -> Result<(), DeviceError>;
}
