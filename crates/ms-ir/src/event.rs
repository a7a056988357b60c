//! Parsed MIDI file events.

use alloc::vec::Vec;

/// Meta event type carrying a tempo change (microseconds per quarter note).
pub const META_SET_TEMPO: u8 = 0x51;
/// Meta event type terminating a track.
pub const META_END_OF_TRACK: u8 = 0x2F;

/// Controller number for channel main volume.
pub const CONTROLLER_MAIN_VOLUME: u8 = 0x07;
/// Controller number for "reset all controllers".
pub const CONTROLLER_RESET_ALL: u8 = 0x79;
/// Controller number for "all notes off".
pub const CONTROLLER_ALL_NOTES_OFF: u8 = 0x7B;

/// One event in a parsed track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    /// Ticks since the previous event in the same track
    pub delta_time: u32,
    /// What the event does
    pub kind: MidiEventKind,
}

impl MidiEvent {
    /// Create a new event.
    pub fn new(delta_time: u32, kind: MidiEventKind) -> Self {
        Self { delta_time, kind }
    }

    /// Shorthand for a channel voice event.
    pub fn channel(delta_time: u32, kind: ChannelEventKind, channel: u8, param1: u8, param2: u8) -> Self {
        Self::new(
            delta_time,
            MidiEventKind::Channel(ChannelEvent {
                kind,
                channel,
                param1,
                param2,
            }),
        )
    }

    /// Shorthand for a set-tempo meta event.
    pub fn tempo(delta_time: u32, micros_per_beat: u32) -> Self {
        let data = micros_per_beat.to_be_bytes()[1..].to_vec();
        Self::new(
            delta_time,
            MidiEventKind::Meta(MetaEvent {
                meta_type: META_SET_TEMPO,
                data,
            }),
        )
    }

    /// Shorthand for an end-of-track meta event.
    pub fn end_of_track(delta_time: u32) -> Self {
        Self::new(
            delta_time,
            MidiEventKind::Meta(MetaEvent {
                meta_type: META_END_OF_TRACK,
                data: Vec::new(),
            }),
        )
    }
}

/// Event payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MidiEventKind {
    /// Channel voice message
    Channel(ChannelEvent),
    /// Meta event (tempo, text, end of track, ...)
    Meta(MetaEvent),
    /// System exclusive data (`F0` or `F7` framing)
    SysEx(Vec<u8>),
}

/// A channel voice message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelEvent {
    pub kind: ChannelEventKind,
    /// 0-15
    pub channel: u8,
    pub param1: u8,
    /// Zero for one-parameter messages
    pub param2: u8,
}

/// Channel voice message type, valued as the upper nibble of its status byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChannelEventKind {
    NoteOff = 0x80,
    NoteOn = 0x90,
    Aftertouch = 0xA0,
    Controller = 0xB0,
    ProgramChange = 0xC0,
    ChannelAftertouch = 0xD0,
    PitchBend = 0xE0,
}

impl ChannelEventKind {
    /// Decode the upper nibble of a status byte.
    pub fn from_status(status: u8) -> Option<Self> {
        match status & 0xF0 {
            0x80 => Some(Self::NoteOff),
            0x90 => Some(Self::NoteOn),
            0xA0 => Some(Self::Aftertouch),
            0xB0 => Some(Self::Controller),
            0xC0 => Some(Self::ProgramChange),
            0xD0 => Some(Self::ChannelAftertouch),
            0xE0 => Some(Self::PitchBend),
            _ => None,
        }
    }

    /// Number of data bytes following the status byte.
    pub fn data_len(self) -> usize {
        match self {
            Self::ProgramChange | Self::ChannelAftertouch => 1,
            _ => 2,
        }
    }
}

/// A meta event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaEvent {
    pub meta_type: u8,
    pub data: Vec<u8>,
}

impl MetaEvent {
    /// Tempo in microseconds per quarter note, if this is a well-formed set-tempo event.
    pub fn tempo(&self) -> Option<u32> {
        if self.meta_type != META_SET_TEMPO || self.data.len() < 3 {
            return None;
        }
        Some(u32::from_be_bytes([0, self.data[0], self.data[1], self.data[2]]))
    }
}
