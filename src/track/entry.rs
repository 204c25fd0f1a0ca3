// Track entry - one file track with its immutable ticks and its playable sequence

use crate::sequence::event::MidiSequence;
use crate::sequence::timebase::{MidiFileData, TickSequence, TickTrack, ticks_to_seconds};
use crate::track::changes::{ChangeInfo, ChangeMap, NoteValues, ResetScope};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Style whose changes are stored in the track catalog itself
pub const DEFAULT_STYLE: &str = "default";

/// General MIDI program used when a track has none associated
pub const DEFAULT_INSTRUMENT: u8 = 0;

/// Channel volume used when a track has none associated
pub const DEFAULT_VOLUME: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackType {
    #[default]
    Melodic,
    Percussion,
}

impl TrackType {
    pub fn is_percussion(&self) -> bool {
        matches!(self, TrackType::Percussion)
    }
}

/// A track imported from a MIDI file.
///
/// `sequence` is always `original ticks -> seconds at the original tempo ->
/// active style's changes -> scaled to the current tempo`. Every
/// regeneration bumps `revision` so a player holding an older copy can tell.
#[derive(Debug, Clone)]
pub struct TrackEntry {
    pub uuid: Uuid,
    pub display_name: String,
    pub folder_name: String,
    pub track_index: usize,
    pub file_path: PathBuf,
    pub track_type: TrackType,
    pub instrument: u8,
    pub volume: u8,
    original_bpm: f64,
    ticks_per_quarter: u16,
    original_sequence_ticks: Arc<TickSequence>,
    sequence: MidiSequence,
    current_bpm: f64,
    style_changes: HashMap<String, ChangeMap>,
    active_style: String,
    revision: u64,
}

impl TrackEntry {
    pub fn from_file_track(
        file: &MidiFileData,
        track: &TickTrack,
        folder_name: &str,
        file_path: &Path,
    ) -> Self {
        let display_name = track
            .name
            .clone()
            .unwrap_or_else(|| format!("Track {}", track.index + 1));
        let sequence = ticks_to_seconds(&track.events, file.original_bpm, file.ticks_per_quarter);

        Self {
            uuid: Uuid::new_v4(),
            display_name,
            folder_name: folder_name.to_string(),
            track_index: track.index,
            file_path: file_path.to_path_buf(),
            track_type: track.track_type,
            instrument: DEFAULT_INSTRUMENT,
            volume: DEFAULT_VOLUME,
            original_bpm: file.original_bpm,
            ticks_per_quarter: file.ticks_per_quarter,
            original_sequence_ticks: Arc::clone(&track.events),
            sequence,
            current_bpm: file.original_bpm,
            style_changes: HashMap::new(),
            active_style: DEFAULT_STYLE.to_string(),
            revision: 0,
        }
    }

    pub fn original_bpm(&self) -> f64 {
        self.original_bpm
    }

    pub fn ticks_per_quarter(&self) -> u16 {
        self.ticks_per_quarter
    }

    pub fn original_ticks(&self) -> &Arc<TickSequence> {
        &self.original_sequence_ticks
    }

    pub fn sequence(&self) -> &MidiSequence {
        &self.sequence
    }

    /// Tempo the current `sequence` is expressed in
    pub fn current_bpm(&self) -> f64 {
        self.current_bpm
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn active_style(&self) -> &str {
        &self.active_style
    }

    /// Changes of the active style
    pub fn changes(&self) -> Option<&ChangeMap> {
        self.style_changes.get(&self.active_style)
    }

    pub fn style_changes(&self, style_id: &str) -> Option<&ChangeMap> {
        self.style_changes.get(style_id)
    }

    pub fn style_ids(&self) -> impl Iterator<Item = &str> {
        self.style_changes.keys().map(String::as_str)
    }

    /// Current seconds per original second
    fn time_scale(&self) -> f64 {
        self.original_bpm / self.current_bpm
    }

    /// Freshly converted sequence at the original tempo, without changes
    pub fn base_sequence(&self) -> MidiSequence {
        ticks_to_seconds(
            &self.original_sequence_ticks,
            self.original_bpm,
            self.ticks_per_quarter,
        )
    }

    /// What `sequence` would be at `bpm`, derived from the original ticks
    pub fn sequence_at_bpm(&self, bpm: f64) -> MidiSequence {
        let mut sequence = self.base_sequence();
        if let Some(changes) = self.changes() {
            changes.apply_to(&mut sequence);
        }
        sequence.scale_timestamps(self.original_bpm / bpm);
        sequence.sort_and_pair();
        sequence
    }

    /// Regenerate `sequence` for a new tempo
    pub fn set_tempo(&mut self, bpm: f64) {
        self.sequence = self.sequence_at_bpm(bpm);
        self.current_bpm = bpm;
        self.revision += 1;
    }

    /// Make `style_id` active and regenerate at `user_bpm`.
    /// An unknown style simply has no changes yet.
    pub fn select_style(&mut self, style_id: &str, user_bpm: f64) {
        self.active_style = style_id.to_string();
        self.set_tempo(user_bpm);
    }

    /// Replace the change map of one style
    pub fn set_style_changes(&mut self, style_id: &str, mut changes: ChangeMap) {
        changes.purge_no_ops();
        self.style_changes.insert(style_id.to_string(), changes);
        if style_id == self.active_style {
            self.set_tempo(self.current_bpm);
        }
    }

    /// Values of the note-on with this source index, in current seconds
    pub fn note_values(&self, source_index: usize) -> Option<NoteValues> {
        let position = self.sequence.position_of_source(source_index)?;
        let event = self.sequence.get(position)?;
        Some(NoteValues::new(
            event.message.note_number()?,
            event.timestamp,
            event.message.velocity()?,
        ))
    }

    /// Record a user edit of one note-on and apply it to `sequence`.
    ///
    /// `after` is in current seconds; the change map stores original seconds.
    pub fn record_edit(&mut self, source_index: usize, after: NoteValues) -> Option<ChangeInfo> {
        let before = self.note_values(source_index)?;
        let scale = self.time_scale();
        let to_original = |v: NoteValues| NoteValues::new(v.number, v.timestamp / scale, v.velocity);

        let change = self
            .style_changes
            .entry(self.active_style.clone())
            .or_default()
            .record_edit(source_index, to_original(before), to_original(after));

        if let Some(position) = self.sequence.position_of_source(source_index) {
            self.sequence
                .set_note_values(position, after.number, after.timestamp, after.velocity);
            self.sequence.sort_and_pair();
        }
        self.revision += 1;
        change
    }

    /// Bulk "reset to original" on the active style. Returns the number of
    /// events rewritten.
    pub fn reset_changes(&mut self, scope: ResetScope) -> usize {
        let scale = self.time_scale();
        let Some(changes) = self.style_changes.get_mut(&self.active_style) else {
            return 0;
        };
        let targets = changes.reset(scope);

        for (source_index, values) in &targets {
            if let Some(position) = self.sequence.position_of_source(*source_index) {
                self.sequence.set_note_values(
                    position,
                    values.number,
                    values.timestamp * scale,
                    values.velocity,
                );
            }
        }
        self.sequence.sort_and_pair();
        self.revision += 1;
        targets.len()
    }
}
