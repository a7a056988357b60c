//! Playback core for midistream.
//!
//! Merges parsed tracks into a flat table of device-ready events, shapes
//! channel volume on its way out, and fills the small fixed-size buffers
//! that are streamed to an output device.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod score;
pub mod scheduler;
mod stream_buffer;
mod volume;

pub use scheduler::{build_score, merge_tracks, to_native};
pub use score::Score;
pub use stream_buffer::{StreamBuffer, STREAM_MAX_EVENTS};
pub use volume::{VolumeShaper, DEFAULT_CHANNEL_VOLUME, VOLUME_CORRECTION};
