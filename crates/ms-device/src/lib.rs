//! MIDI output devices for midistream.

mod sequencer;
mod sink;
mod traits;
pub mod wake;

#[cfg(feature = "midir")]
mod midir_backend;

pub use sequencer::SequencerDevice;
pub use sink::LogSink;
pub use traits::{DeviceError, MidiSink, OutputDevice};
pub use wake::{wake_channel, CompletionNotifier, WakeReason, WakeReceiver, WakeSender};

#[cfg(feature = "midir")]
pub use midir_backend::{list_ports, MidirSink};
