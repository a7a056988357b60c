//! The merged, playable event table.

use alloc::vec::Vec;
use ms_ir::NativeEvent;

/// A time-ordered table of native events plus a playback cursor.
///
/// The table is immutable once built. Playback consumes it through a cursor
/// that advances forward without removing elements, wrapping to the start
/// when looping — so the streaming path never allocates.
#[derive(Clone, Debug, Default)]
pub struct Score {
    events: Vec<NativeEvent>,
    /// Next event index to stream.
    cursor: usize,
    looping: bool,
}

impl Score {
    /// Wrap an already-ordered event table.
    pub fn new(events: Vec<NativeEvent>) -> Self {
        Self {
            events,
            cursor: 0,
            looping: false,
        }
    }

    /// Take the event under the cursor and advance.
    ///
    /// At the end of the table this wraps to index 0 when looping, otherwise
    /// returns `None`. An empty table always returns `None`.
    pub fn next_event(&mut self) -> Option<NativeEvent> {
        if self.cursor >= self.events.len() {
            if !self.looping || self.events.is_empty() {
                return None;
            }
            self.cursor = 0;
        }
        let event = self.events[self.cursor];
        self.cursor += 1;
        Some(event)
    }

    /// Reset the cursor to the beginning.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn events(&self) -> &[NativeEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Total length in ticks.
    pub fn duration_ticks(&self) -> u64 {
        self.events.iter().map(|e| e.delta_time as u64).sum()
    }
}
