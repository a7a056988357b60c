//! Parsed multi-track MIDI file.

use alloc::vec::Vec;

use crate::event::MidiEvent;

/// A parsed Standard MIDI File.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MidiFile {
    /// SMF format (0 or 1)
    pub format: u16,
    /// Raw time division word from the header
    pub time_division: u16,
    pub tracks: Vec<MidiTrack>,
}

/// One track: events in file order, delta-timed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MidiTrack {
    pub events: Vec<MidiEvent>,
}

impl MidiTrack {
    pub fn new(events: Vec<MidiEvent>) -> Self {
        Self { events }
    }
}

impl MidiFile {
    /// Create a file from tracks with the given time division.
    pub fn new(time_division: u16, tracks: Vec<MidiTrack>) -> Self {
        Self {
            format: if tracks.len() > 1 { 1 } else { 0 },
            time_division,
            tracks,
        }
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Total number of events across all tracks.
    pub fn num_events(&self) -> usize {
        self.tracks.iter().map(|t| t.events.len()).sum()
    }

    pub fn time_division(&self) -> u16 {
        self.time_division
    }

    /// Iterate over one track, or `None` if `index` is out of range.
    pub fn iterate_track(&self, index: usize) -> Option<TrackIter<'_>> {
        self.tracks.get(index).map(|track| TrackIter {
            events: &track.events,
            position: 0,
        })
    }
}

/// Random-access iterator over a track's events.
#[derive(Clone, Debug)]
pub struct TrackIter<'a> {
    events: &'a [MidiEvent],
    position: usize,
}

impl<'a> TrackIter<'a> {
    /// Delta time of the next pending event, or 0 once the track is drained.
    pub fn peek_delta_time(&self) -> u32 {
        self.events
            .get(self.position)
            .map(|e| e.delta_time)
            .unwrap_or(0)
    }

    /// Consume the next event. Returns `None` at end of track.
    pub fn next_event(&mut self) -> Option<&'a MidiEvent> {
        let event = self.events.get(self.position)?;
        self.position += 1;
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChannelEventKind;

    #[test]
    fn iterator_reports_zero_delta_at_end() {
        let file = MidiFile::new(
            96,
            vec![MidiTrack::new(vec![MidiEvent::channel(
                12,
                ChannelEventKind::NoteOn,
                0,
                60,
                100,
            )])],
        );
        let mut iter = file.iterate_track(0).unwrap();
        assert_eq!(iter.peek_delta_time(), 12);
        assert!(iter.next_event().is_some());
        assert_eq!(iter.peek_delta_time(), 0);
        assert!(iter.next_event().is_none());
    }

    #[test]
    fn counts_span_all_tracks() {
        let file = MidiFile::new(
            480,
            vec![
                MidiTrack::new(vec![MidiEvent::end_of_track(0)]),
                MidiTrack::new(vec![MidiEvent::tempo(0, 400_000), MidiEvent::end_of_track(0)]),
            ],
        );
        assert_eq!(file.num_tracks(), 2);
        assert_eq!(file.num_events(), 3);
        assert_eq!(file.format, 1);
        assert!(file.iterate_track(2).is_none());
    }
}
