use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use keystyle::midi::event::MidiMessage;
use keystyle::sequence::timebase::{
    TickEvent, TickSequence, TickTrack, encode_midi_file, parse_midi_bytes, ticks_to_seconds,
};
use keystyle::track::TrackFolder;
use keystyle::{MidiSequence, find_next_event_index};
use std::path::Path;
use std::sync::Arc;

/// `notes` quarter notes with a paired note-off, as a tick sequence
fn tick_sequence(notes: usize) -> TickSequence {
    let mut events = Vec::with_capacity(notes * 2);
    for i in 0..notes {
        let note = 36 + (i % 48) as u8;
        let tick = i as u64 * 480;
        events.push(TickEvent {
            message: MidiMessage::NoteOn {
                channel: 1,
                note,
                velocity: 100,
            },
            tick,
        });
        events.push(TickEvent {
            message: MidiMessage::NoteOff {
                channel: 1,
                note,
                velocity: 0,
            },
            tick: tick + 400,
        });
    }
    TickSequence::new(events)
}

/// Tick to seconds conversion (done for every track on each tempo change)
fn bench_ticks_to_seconds(c: &mut Criterion) {
    let mut group = c.benchmark_group("ticks_to_seconds");
    for notes in [100, 1_000, 10_000] {
        let ticks = tick_sequence(notes);
        group.bench_with_input(BenchmarkId::from_parameter(notes), &ticks, |b, ticks| {
            b.iter(|| black_box(ticks_to_seconds(ticks, 120.0, 480)));
        });
    }
    group.finish();
}

/// Re-sort and re-pair after an edit moved a note
fn bench_sort_and_pair(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_and_pair");
    for notes in [100, 1_000, 10_000] {
        let base = ticks_to_seconds(&tick_sequence(notes), 120.0, 480);
        group.bench_with_input(BenchmarkId::from_parameter(notes), &base, |b, base| {
            b.iter(|| {
                let mut sequence: MidiSequence = base.clone();
                sequence.scale_timestamps(0.8);
                sequence.sort_and_pair();
                black_box(sequence)
            });
        });
    }
    group.finish();
}

/// Cursor resync lookup
fn bench_find_next_event(c: &mut Criterion) {
    let sequence = ticks_to_seconds(&tick_sequence(10_000), 120.0, 480);
    let end = sequence.end_time();

    c.bench_function("find_next_event_index_10k", |b| {
        let mut t = 0.0;
        b.iter(|| {
            t = (t + 0.37) % end;
            black_box(find_next_event_index(sequence.events(), t))
        });
    });
}

/// Full track regeneration at a new tempo, with edits applied
fn bench_set_tempo(c: &mut Criterion) {
    let track = TickTrack {
        index: 0,
        name: None,
        events: Arc::new(tick_sequence(2_000)),
        track_type: Default::default(),
    };
    let bytes = encode_midi_file(&[track], 480, 100.0).unwrap();
    let data = parse_midi_bytes(&bytes).unwrap();
    let mut folder = TrackFolder::from_file_data(&data, "bench", Path::new("bench.mid"));
    let mut entry = folder.tracks.remove(0);

    c.bench_function("set_tempo_2k_notes", |b| {
        let mut bpm = 60.0;
        b.iter(|| {
            bpm = if bpm > 200.0 { 60.0 } else { bpm + 1.0 };
            entry.set_tempo(bpm);
            black_box(entry.revision())
        });
    });
}

criterion_group!(
    benches,
    bench_ticks_to_seconds,
    bench_sort_and_pair,
    bench_find_next_event,
    bench_set_tempo
);
criterion_main!(benches);
