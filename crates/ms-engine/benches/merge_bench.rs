use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ms_engine::{merge_tracks, StreamBuffer, VolumeShaper};
use ms_ir::{ChannelEventKind, MidiEvent, MidiFile, MidiTrack, CONTROLLER_MAIN_VOLUME};

/// A dense 16-track file: each track alternates notes and volume changes.
fn dense_file(tracks: u8, events_per_track: u32) -> MidiFile {
    let tracks = (0..tracks)
        .map(|t| {
            let events = (0..events_per_track)
                .map(|i| {
                    let delta = (i * 5 + t as u32) % 13;
                    if i % 8 == 0 {
                        MidiEvent::channel(delta, ChannelEventKind::Controller, t, CONTROLLER_MAIN_VOLUME, (i % 128) as u8)
                    } else {
                        MidiEvent::channel(delta, ChannelEventKind::NoteOn, t, (i % 128) as u8, 100)
                    }
                })
                .collect();
            MidiTrack::new(events)
        })
        .collect();
    MidiFile::new(480, tracks)
}

fn bench_merge(c: &mut Criterion) {
    let file = dense_file(16, 2_000);
    c.bench_function("merge_16_tracks", |b| {
        b.iter(|| merge_tracks(black_box(&file)))
    });
}

fn bench_fill(c: &mut Criterion) {
    let file = dense_file(16, 2_000);
    let mut score = ms_engine::build_score(&file);
    score.set_looping(true);
    let mut volume = VolumeShaper::new();
    volume.set_gain(0.6);
    let mut buffer = StreamBuffer::new();

    c.bench_function("fill_stream_buffer", |b| {
        b.iter(|| black_box(buffer.fill(&mut score, &mut volume)))
    });
}

criterion_group!(benches, bench_merge, bench_fill);
criterion_main!(benches);
