//! Fixed-capacity batch of events handed to the output device.

use arrayvec::ArrayVec;
use ms_ir::NativeEvent;

use crate::score::Score;
use crate::volume::VolumeShaper;

/// Events per submitted buffer. Kept small so volume changes reach the
/// device quickly and playback never runs far ahead of it.
pub const STREAM_MAX_EVENTS: usize = 4;

/// One in-flight buffer's worth of events.
#[derive(Clone, Debug, Default)]
pub struct StreamBuffer {
    events: ArrayVec<NativeEvent, STREAM_MAX_EVENTS>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self {
            events: ArrayVec::new(),
        }
    }

    /// Refill from the score's cursor, shaping volume controllers on the way.
    ///
    /// Returns the number of events now in the buffer. Fewer than
    /// [`STREAM_MAX_EVENTS`] (possibly zero) means a non-looping score ran
    /// out. Never allocates.
    pub fn fill(&mut self, score: &mut Score, volume: &mut VolumeShaper) -> usize {
        self.events.clear();
        while !self.events.is_full() {
            let Some(mut event) = score.next_event() else { break };
            volume.apply(&mut event);
            self.events.push(event);
        }
        self.events.len()
    }

    pub fn events(&self) -> &[NativeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
