// Recording files - save a take as a standard MIDI file and read it back

use crate::recorder::live::RecordedEvent;
use crate::sequence::timebase::{
    DEFAULT_TICKS_PER_QUARTER, MidiFileData, MidiFileError, TickEvent, TickSequence, TickTrack,
    detect_track_type, encode_midi_file, load_midi_file, parse_midi_bytes, seconds_to_ticks,
    stored_bpm, ticks_to_seconds, writable_ticks_per_quarter,
};
use std::path::Path;
use std::sync::Arc;

/// Default resolution recordings are written at
pub const EXPORT_TICKS_PER_QUARTER: u16 = DEFAULT_TICKS_PER_QUARTER;

/// Quantise a take to ticks and encode it with its own tempo track.
///
/// Ticks are computed against the tempo the file will actually carry, which
/// is `bpm` rounded to whole microseconds per quarter.
pub fn encode_recording(
    events: &[RecordedEvent],
    bpm: f64,
    ticks_per_quarter: u16,
) -> Result<Vec<u8>, MidiFileError> {
    let ticks_per_quarter = writable_ticks_per_quarter(ticks_per_quarter);
    let file_bpm = stored_bpm(bpm);
    let ticks: Vec<TickEvent> = events
        .iter()
        .map(|e| TickEvent {
            message: e.message,
            tick: seconds_to_ticks(e.time_from_start, file_bpm, ticks_per_quarter),
        })
        .collect();
    let ticks = TickSequence::new(ticks);

    let track = TickTrack {
        index: 1,
        name: Some("Recording".to_string()),
        track_type: detect_track_type(&ticks),
        events: Arc::new(ticks),
    };
    encode_midi_file(&[track], ticks_per_quarter, bpm)
}

pub fn save_recording(
    path: impl AsRef<Path>,
    events: &[RecordedEvent],
    bpm: f64,
    ticks_per_quarter: u16,
) -> Result<(), MidiFileError> {
    let path = path.as_ref();
    let bytes = encode_recording(events, bpm, ticks_per_quarter)?;
    std::fs::write(path, bytes).map_err(|source| MidiFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), events = events.len(), bpm, "recording saved");
    Ok(())
}

/// Every channel event of every track, in seconds, sorted by time
pub fn recording_from_file_data(data: &MidiFileData) -> Vec<RecordedEvent> {
    let mut events: Vec<RecordedEvent> = data
        .tracks
        .iter()
        .flat_map(|track| {
            ticks_to_seconds(&track.events, data.original_bpm, data.ticks_per_quarter)
                .iter()
                .map(|e| RecordedEvent {
                    message: e.message,
                    time_from_start: e.timestamp,
                })
                .collect::<Vec<_>>()
        })
        .collect();
    events.sort_by(|a, b| a.time_from_start.total_cmp(&b.time_from_start));
    events
}

pub fn decode_recording(bytes: &[u8]) -> Result<Vec<RecordedEvent>, MidiFileError> {
    Ok(recording_from_file_data(&parse_midi_bytes(bytes)?))
}

pub fn load_recording(path: impl AsRef<Path>) -> Result<Vec<RecordedEvent>, MidiFileError> {
    Ok(recording_from_file_data(&load_midi_file(path)?))
}
