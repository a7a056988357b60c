//! Format parsers for midistream.
//!
//! Parses Standard MIDI Files (format 0 and 1) into the IR.

mod smf;

pub use smf::load_midi;

use thiserror::Error;

/// Error type for format parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Invalid file header or magic bytes
    #[error("invalid MIDI header")]
    InvalidHeader,
    /// Unexpected end of file
    #[error("unexpected end of MIDI data")]
    UnexpectedEof,
    /// SMF format other than 0 or 1
    #[error("unsupported MIDI file format {0}")]
    UnsupportedFormat(u16),
    /// Malformed event inside a track chunk
    #[error("invalid event in track {track} at byte {offset}")]
    InvalidEvent { track: usize, offset: usize },
    /// Chunk framing could not be read
    #[error("malformed chunk: {0}")]
    Chunk(String),
}
