//! Track-to-event merging.
//!
//! Walks every track of a parsed file in lockstep, producing one
//! time-ordered Vec<NativeEvent> that the stream buffer can consume.
//! This runs once per load, so a linear scan for the next event is fine.

use alloc::vec::Vec;
use ms_ir::{MidiEvent, MidiEventKind, MidiFile, NativeEvent, NativeEventKind, ShortMessage, TrackIter};

use crate::score::Score;

/// Merge state for one source track.
struct TrackCursor<'a> {
    /// `None` once the track is exhausted.
    iter: Option<TrackIter<'a>>,
    /// Absolute time of the last event taken from this track.
    absolute_time: u64,
}

/// Build a score from every track of a parsed file.
pub fn build_score(file: &MidiFile) -> Score {
    Score::new(merge_tracks(file))
}

/// Merge all tracks into a single table of native events ordered by absolute time.
///
/// Ties go to the lower track index. Events with no native form are dropped,
/// but their delta time carries over into the next emitted event.
pub fn merge_tracks(file: &MidiFile) -> Vec<NativeEvent> {
    let mut cursors: Vec<TrackCursor> = (0..file.num_tracks())
        .map(|i| TrackCursor {
            iter: file.iterate_track(i),
            absolute_time: 0,
        })
        .collect();

    let mut events = Vec::with_capacity(file.num_events());
    let mut current_time: u64 = 0;
    let mut dropped = 0usize;

    loop {
        // Look for the track whose next event is earliest.
        let mut next: Option<(usize, u64)> = None;
        for (i, cursor) in cursors.iter().enumerate() {
            let Some(iter) = &cursor.iter else { continue };
            let time = cursor.absolute_time + iter.peek_delta_time() as u64;
            if next.map_or(true, |(_, min_time)| time < min_time) {
                next = Some((i, time));
            }
        }

        let Some((idx, min_time)) = next else { break };

        let cursor = &mut cursors[idx];
        cursor.absolute_time = min_time;

        let Some(event) = cursor.iter.as_mut().and_then(TrackIter::next_event) else {
            cursor.iter = None;
            continue;
        };

        if let Some(kind) = to_native(event) {
            let delta_time = u32::try_from(min_time - current_time).unwrap_or(u32::MAX);
            events.push(NativeEvent { delta_time, kind });
            current_time = min_time;
        } else {
            dropped += 1;
        }
    }

    log::debug!(
        "merged {} tracks: {} events kept, {} dropped, {} ticks",
        file.num_tracks(),
        events.len(),
        dropped,
        current_time
    );
    events
}

/// Convert a parsed event into its device form, or `None` if the device has no use for it.
pub fn to_native(event: &MidiEvent) -> Option<NativeEventKind> {
    match &event.kind {
        MidiEventKind::Meta(meta) => meta.tempo().map(NativeEventKind::Tempo),
        // ShortMessage::new zeroes the second data byte of one-parameter messages.
        MidiEventKind::Channel(ch) => Some(NativeEventKind::Short(ShortMessage::new(
            ch.kind,
            ch.channel,
            ch.param1,
            ch.param2,
        ))),
        MidiEventKind::SysEx(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use ms_ir::{ChannelEventKind, MetaEvent, MidiTrack, CONTROLLER_MAIN_VOLUME};

    fn note_on(delta: u32, channel: u8, key: u8) -> MidiEvent {
        MidiEvent::channel(delta, ChannelEventKind::NoteOn, channel, key, 100)
    }

    fn note_off(delta: u32, channel: u8, key: u8) -> MidiEvent {
        MidiEvent::channel(delta, ChannelEventKind::NoteOff, channel, key, 0)
    }

    fn file(tracks: Vec<Vec<MidiEvent>>) -> MidiFile {
        MidiFile::new(96, tracks.into_iter().map(MidiTrack::new).collect())
    }

    /// Absolute times reconstructed from delta times.
    fn absolute_times(events: &[NativeEvent]) -> Vec<u64> {
        let mut t = 0u64;
        events
            .iter()
            .map(|e| {
                t += e.delta_time as u64;
                t
            })
            .collect()
    }

    fn key_of(event: &NativeEvent) -> u8 {
        event.message().map(|m| m.data1).unwrap_or(0)
    }

    #[test]
    fn empty_file_produces_no_events() {
        assert!(merge_tracks(&file(vec![])).is_empty());
        assert!(merge_tracks(&file(vec![vec![], vec![]])).is_empty());
    }

    #[test]
    fn single_track_keeps_delta_times() {
        let events = merge_tracks(&file(vec![vec![
            note_on(0, 0, 60),
            note_off(48, 0, 60),
            note_on(48, 0, 62),
        ]]));

        assert_eq!(events.len(), 3);
        assert_eq!(
            events.iter().map(|e| e.delta_time).collect::<Vec<_>>(),
            vec![0, 48, 48]
        );
    }

    #[test]
    fn interleaves_tracks_by_absolute_time() {
        let events = merge_tracks(&file(vec![
            vec![note_on(0, 0, 60), note_off(100, 0, 60)],
            vec![note_on(30, 1, 64), note_off(30, 1, 64), note_on(60, 1, 67)],
        ]));

        assert_eq!(absolute_times(&events), vec![0, 30, 60, 100, 120]);
        assert_eq!(
            events.iter().map(key_of).collect::<Vec<_>>(),
            vec![60, 64, 64, 60, 67]
        );
        assert_eq!(events[2].delta_time, 30);
        assert_eq!(events[3].delta_time, 40);
    }

    #[test]
    fn output_is_non_decreasing_in_time() {
        let tracks = (0..5u8)
            .map(|t| {
                (0..20u32)
                    .map(|i| note_on((i * 7 + t as u32 * 3) % 11, t, i as u8))
                    .collect()
            })
            .collect();
        let events = merge_tracks(&file(tracks));

        assert_eq!(events.len(), 100);
        let times = absolute_times(&events);
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn ties_go_to_lower_track_index() {
        let events = merge_tracks(&file(vec![
            vec![note_on(10, 0, 1)],
            vec![note_on(10, 1, 2)],
            vec![note_on(10, 2, 3)],
        ]));

        assert_eq!(events.iter().map(key_of).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(absolute_times(&events), vec![10, 10, 10]);
    }

    #[test]
    fn dropped_events_carry_their_time_forward() {
        let text = MidiEvent::new(
            40,
            MidiEventKind::Meta(MetaEvent { meta_type: 0x01, data: vec![b'x'] }),
        );
        let events = merge_tracks(&file(vec![vec![
            note_on(0, 0, 60),
            text,
            MidiEvent::new(10, MidiEventKind::SysEx(vec![0x7E])),
            note_off(5, 0, 60),
            MidiEvent::end_of_track(0),
        ]]));

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].delta_time, 55);
    }

    #[test]
    fn keeps_only_accepted_kinds() {
        let kinds = [
            ChannelEventKind::NoteOff,
            ChannelEventKind::NoteOn,
            ChannelEventKind::Aftertouch,
            ChannelEventKind::Controller,
            ChannelEventKind::ProgramChange,
            ChannelEventKind::ChannelAftertouch,
            ChannelEventKind::PitchBend,
        ];
        let mut track: Vec<MidiEvent> = kinds
            .iter()
            .map(|&k| MidiEvent::channel(1, k, 2, 10, 20))
            .collect();
        track.push(MidiEvent::tempo(1, 600_000));
        track.push(MidiEvent::new(1, MidiEventKind::SysEx(vec![1, 2])));
        track.push(MidiEvent::end_of_track(1));

        let events = merge_tracks(&file(vec![track]));

        assert_eq!(events.len(), 8);
        for (event, kind) in events.iter().zip(kinds.iter()) {
            let msg = event.message().unwrap();
            assert_eq!(msg.kind, *kind);
            assert_eq!(msg.channel, 2);
        }
        assert_eq!(events[7].kind, NativeEventKind::Tempo(600_000));
    }

    #[test]
    fn one_byte_messages_zero_second_data_byte() {
        let events = merge_tracks(&file(vec![vec![
            MidiEvent::channel(0, ChannelEventKind::ProgramChange, 0, 19, 99),
            MidiEvent::channel(0, ChannelEventKind::ChannelAftertouch, 0, 40, 99),
        ]]));

        assert!(events.iter().all(|e| e.message().unwrap().data2 == 0));
    }

    #[test]
    fn two_track_volume_scenario() {
        let events = merge_tracks(&file(vec![
            vec![note_on(0, 0, 60), note_off(100, 0, 60)],
            vec![MidiEvent::channel(50, ChannelEventKind::Controller, 0, CONTROLLER_MAIN_VOLUME, 64)],
        ]));

        assert_eq!(absolute_times(&events), vec![0, 50, 100]);
        assert_eq!(events[0].message().unwrap().kind, ChannelEventKind::NoteOn);
        let ctrl = events[1].message().unwrap();
        assert!(ctrl.is_main_volume());
        assert_eq!(ctrl.data2, 64);
        assert_eq!(events[2].message().unwrap().kind, ChannelEventKind::NoteOff);
    }

    #[test]
    fn build_score_starts_at_cursor_zero() {
        let score = build_score(&file(vec![vec![note_on(0, 0, 60)]]));
        assert_eq!(score.len(), 1);
        assert_eq!(score.cursor(), 0);
        assert!(!score.is_looping());
    }
}
