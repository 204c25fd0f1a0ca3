//! Note model edits, change map bookkeeping and bulk resets

use keystyle::editor::{EditRejection, NoteColumn, NoteModel, SortOrder};
use keystyle::midi::event::MidiMessage;
use keystyle::sequence::timebase::{
    TickEvent, TickSequence, TickTrack, encode_midi_file, parse_midi_bytes,
};
use keystyle::track::{ResetScope, TrackEntry, TrackFolder, TrackType};
use std::path::Path;
use std::sync::Arc;

/// Four quarter notes at 120 BPM, 480 ticks per quarter: note-ons at 0, 0.5, 1.0, 1.5 s
fn entry() -> TrackEntry {
    let mut events = Vec::new();
    for (i, note) in [60u8, 62, 64, 65].into_iter().enumerate() {
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
            tick: tick + 240,
        });
    }
    let track = TickTrack {
        index: 0,
        name: Some("Piano".into()),
        events: Arc::new(TickSequence::new(events)),
        track_type: TrackType::Melodic,
    };
    let bytes = encode_midi_file(&[track], 480, 120.0).unwrap();
    let data = parse_midi_bytes(&bytes).unwrap();
    let mut folder = TrackFolder::from_file_data(&data, "Etude", Path::new("etude.mid"));
    folder.tracks.remove(0)
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{a} != {b}");
}

#[test]
fn test_first_then_second_timestamp_edit() {
    let mut entry = entry();
    let mut model = NoteModel::new(&mut entry, None);

    model.set_timestamp(1, 0.6).unwrap();
    let changes = model.entry().changes().unwrap();
    assert_eq!(changes.len(), 1);
    let (source_index, change) = changes.iter().next().unwrap();
    assert_eq!(source_index, 2);
    assert_eq!(change.old_number, 62);
    assert_close(change.old_time_stamp, 0.5);
    assert_eq!(change.old_velocity, 100);
    assert_close(change.new_time_stamp, 0.6);

    model.set_timestamp(1, 0.7).unwrap();
    let change = model.entry().changes().unwrap().get(2).copied().unwrap();
    assert_close(change.old_time_stamp, 0.5);
    assert_close(change.new_time_stamp, 0.7);
}

#[test]
fn test_note_off_follows_note_on() {
    let mut entry = entry();
    {
        let mut model = NoteModel::new(&mut entry, None);
        model.set_cell_text(0, NoteColumn::Note, "G4").unwrap();
        model.set_timestamp(0, 0.2).unwrap();
    }

    let sequence = entry.sequence();
    let on = sequence.position_of_source(0).unwrap();
    let off = sequence.matched_index(on).unwrap();
    let off_event = sequence.get(off).unwrap();
    assert_eq!(off_event.message.note_number(), Some(67));
    // duration of 0.25 s kept
    assert_close(off_event.timestamp, 0.45);
}

#[test]
fn test_rejected_edits_change_nothing() {
    let mut entry = entry();
    let before = entry.sequence().clone();
    let mut model = NoteModel::new(&mut entry, None);

    assert_eq!(
        model.set_cell_text(2, NoteColumn::Note, "Z2"),
        Err(EditRejection::InvalidNoteName)
    );
    assert_eq!(
        model.set_cell_text(2, NoteColumn::Velocity, "128"),
        Err(EditRejection::VelocityOutOfRange)
    );
    assert_eq!(
        model.set_timestamp(2, 1.6),
        Err(EditRejection::TimestampOutOfOrder)
    );
    assert_eq!(model.set_timestamp(0, -0.1), Err(EditRejection::TimestampOutOfOrder));
    assert!(model.entry().changes().is_none());
    drop(model);
    assert_eq!(entry.sequence(), &before);
}

#[test]
fn test_display_sort_keeps_change_keys() {
    let mut entry = entry();
    let mut model = NoteModel::new(&mut entry, None);
    model.sort_by(NoteColumn::Note, SortOrder::Descending);

    // row 0 is now F4, the last note of the file
    assert_eq!(model.cell_text(0, NoteColumn::Note).as_deref(), Some("F4"));
    model.set_velocity(0, 30).unwrap();

    let changes = model.entry().changes().unwrap();
    assert_eq!(changes.get(6).unwrap().new_velocity, 30);
    assert_eq!(model.row(0).unwrap().source_index, 6);
}

#[test]
fn test_edits_are_kept_in_original_time_across_tempo() {
    let mut entry = entry();
    entry.set_tempo(60.0);
    {
        let mut model = NoteModel::new(&mut entry, None);
        // at 60 BPM the second note is at 1.0 s; move it to 1.5 s
        let row = model.row_of_source(2).unwrap();
        model.set_timestamp(row, 1.5).unwrap();
    }
    let change = entry.changes().unwrap().get(2).copied().unwrap();
    assert_close(change.old_time_stamp, 0.5);
    assert_close(change.new_time_stamp, 0.75);

    entry.set_tempo(120.0);
    assert_close(entry.note_values(2).unwrap().timestamp, 0.75);
}

#[test]
fn test_bulk_resets() {
    let mut entry = entry();
    let mut model = NoteModel::new(&mut entry, None);
    model.set_note_number(0, 48).unwrap();
    model.set_velocity(0, 20).unwrap();
    model.set_velocity(1, 50).unwrap();
    model.set_timestamp(2, 1.1).unwrap();

    assert_eq!(model.reset_only_velocities(), 3);
    let changes = model.entry().changes().unwrap();
    assert_eq!(changes.len(), 2);
    assert!(changes.iter().all(|(_, c)| !c.is_no_op()));
    assert_eq!(model.row(1).unwrap().velocity, 100);
    assert_eq!(model.row(0).unwrap().number, 48);

    assert_eq!(model.reset_only_timestamps(), 2);
    assert_close(model.row(2).unwrap().timestamp, 1.0);
    assert_eq!(model.entry().changes().unwrap().len(), 1);

    assert_eq!(model.reset(ResetScope::AllProperties), 1);
    assert!(model.entry().changes().unwrap().is_empty());
    assert!(model.rows().iter().all(|r| !r.edited));
}

#[test]
fn test_edit_back_to_original_erases_change() {
    let mut entry = entry();
    let mut model = NoteModel::new(&mut entry, None);
    model.set_velocity(3, 64).unwrap();
    model.set_velocity(3, 100).unwrap();
    assert!(model.entry().changes().unwrap().is_empty());
    assert!(!model.row(3).unwrap().edited);
}
