//! Core IR types for midistream.
//!
//! This crate defines the representation shared by every other crate in
//! the workspace. The file parser emits a [`MidiFile`], the merge engine
//! turns it into a table of [`NativeEvent`]s, and output devices consume
//! those native events.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod event;
mod file;
mod native;

pub use event::{
    ChannelEvent, ChannelEventKind, MetaEvent, MidiEvent, MidiEventKind, CONTROLLER_ALL_NOTES_OFF,
    CONTROLLER_MAIN_VOLUME, CONTROLLER_RESET_ALL, META_END_OF_TRACK, META_SET_TEMPO,
};
pub use file::{MidiFile, MidiTrack, TrackIter};
pub use native::{NativeEvent, NativeEventKind, ShortMessage, MEVT_SHORTMSG, MEVT_TEMPO};

/// Number of channels addressable by a MIDI channel message.
pub const MIDI_CHANNELS: usize = 16;

/// Default tempo in microseconds per quarter note (120 BPM).
pub const DEFAULT_TEMPO: u32 = 500_000;
