// Change tracking - sparse per-event overrides recorded by the note editor

use crate::sequence::event::MidiSequence;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Timestamps closer than this are the same instant
const TIMESTAMP_EPSILON: f64 = 1e-9;

/// Number, timestamp and velocity of one note-on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteValues {
    pub number: u8,
    pub timestamp: f64,
    pub velocity: u8,
}

impl NoteValues {
    pub fn new(number: u8, timestamp: f64, velocity: u8) -> Self {
        Self {
            number,
            timestamp,
            velocity,
        }
    }

    /// Equal on all three fields, timestamps compared with a tolerance
    pub fn same_as(&self, other: &NoteValues) -> bool {
        self.number == other.number
            && self.velocity == other.velocity
            && (self.timestamp - other.timestamp).abs() < TIMESTAMP_EPSILON
    }
}

/// One recorded override. Timestamps are seconds in the track's original
/// time base (the file's own tempo).
///
/// Field names are part of the catalog file format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeInfo {
    pub old_number: u8,
    pub old_time_stamp: f64,
    pub old_velocity: u8,
    pub new_number: u8,
    pub new_time_stamp: f64,
    pub new_velocity: u8,
}

impl ChangeInfo {
    pub fn new(old: NoteValues, new: NoteValues) -> Self {
        Self {
            old_number: old.number,
            old_time_stamp: old.timestamp,
            old_velocity: old.velocity,
            new_number: new.number,
            new_time_stamp: new.timestamp,
            new_velocity: new.velocity,
        }
    }

    pub fn old_values(&self) -> NoteValues {
        NoteValues::new(self.old_number, self.old_time_stamp, self.old_velocity)
    }

    pub fn new_values(&self) -> NoteValues {
        NoteValues::new(self.new_number, self.new_time_stamp, self.new_velocity)
    }

    fn set_new_values(&mut self, values: NoteValues) {
        self.new_number = values.number;
        self.new_time_stamp = values.timestamp;
        self.new_velocity = values.velocity;
    }

    /// `new == old` on all three fields
    pub fn is_no_op(&self) -> bool {
        self.old_values().same_as(&self.new_values())
    }
}

/// Which fields a bulk reset puts back to their original value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    AllProperties,
    OnlyNotes,
    OnlyTimeStamps,
    OnlyVelocities,
}

impl ResetScope {
    fn resets_number(self) -> bool {
        matches!(self, ResetScope::AllProperties | ResetScope::OnlyNotes)
    }

    fn resets_timestamp(self) -> bool {
        matches!(self, ResetScope::AllProperties | ResetScope::OnlyTimeStamps)
    }

    fn resets_velocity(self) -> bool {
        matches!(self, ResetScope::AllProperties | ResetScope::OnlyVelocities)
    }
}

/// Sparse `source index -> ChangeInfo` table
///
/// Serialises as a JSON object keyed by the index in decimal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeMap {
    entries: BTreeMap<usize, ChangeInfo>,
}

impl ChangeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, source_index: usize) -> Option<&ChangeInfo> {
        self.entries.get(&source_index)
    }

    pub fn contains(&self, source_index: usize) -> bool {
        self.entries.contains_key(&source_index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ChangeInfo)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Insert a change as-is (used when loading); no-ops are dropped
    pub fn insert(&mut self, source_index: usize, change: ChangeInfo) {
        if change.is_no_op() {
            self.entries.remove(&source_index);
        } else {
            self.entries.insert(source_index, change);
        }
    }

    /// Record an edit of the event at `source_index`.
    ///
    /// The first edit stores both `before` and `after`; later edits only
    /// overwrite the new values. An entry that ends up equal to its original
    /// values is removed. Returns the entry as it now stands.
    pub fn record_edit(
        &mut self,
        source_index: usize,
        before: NoteValues,
        after: NoteValues,
    ) -> Option<ChangeInfo> {
        let change = self
            .entries
            .entry(source_index)
            .and_modify(|c| c.set_new_values(after))
            .or_insert_with(|| ChangeInfo::new(before, after));
        let change = *change;

        if change.is_no_op() {
            self.entries.remove(&source_index);
            None
        } else {
            Some(change)
        }
    }

    /// Put the fields named by `scope` back to their old values in every
    /// entry, then drop entries that became no-ops.
    ///
    /// Returns the values each touched event must now carry.
    pub fn reset(&mut self, scope: ResetScope) -> Vec<(usize, NoteValues)> {
        let mut targets = Vec::with_capacity(self.entries.len());

        for (&source_index, change) in self.entries.iter_mut() {
            let old = change.old_values();
            let mut values = change.new_values();
            if scope.resets_number() {
                values.number = old.number;
            }
            if scope.resets_timestamp() {
                values.timestamp = old.timestamp;
            }
            if scope.resets_velocity() {
                values.velocity = old.velocity;
            }
            change.set_new_values(values);
            targets.push((source_index, values));
        }

        self.purge_no_ops();
        targets
    }

    /// Remove every entry whose new values equal its old values
    pub fn purge_no_ops(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, change| !change.is_no_op());
        before - self.entries.len()
    }

    /// Write every entry's new values into `sequence`.
    ///
    /// `sequence` must be in the original time base and correctly paired.
    /// Positions are looked up by source index, so the sequence order does
    /// not matter; the caller re-sorts afterwards. Returns how many entries
    /// found their event.
    pub fn apply_to(&self, sequence: &mut MidiSequence) -> usize {
        let positions: HashMap<usize, usize> = sequence
            .iter()
            .enumerate()
            .filter(|(_, e)| e.message.is_note_on())
            .map(|(position, e)| (e.source_index, position))
            .collect();

        let mut applied = 0;
        for (source_index, change) in &self.entries {
            match positions.get(source_index) {
                Some(&position) => {
                    sequence.set_note_values(
                        position,
                        change.new_number,
                        change.new_time_stamp,
                        change.new_velocity,
                    );
                    applied += 1;
                }
                None => {
                    tracing::warn!(source_index, "change refers to no note-on; skipped");
                }
            }
        }
        applied
    }
}
