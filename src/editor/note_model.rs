// Note model - editable table of one track's note-ons, backed by its change map

use crate::editor::validator::{
    EditRejection, is_valid_timestamp_delta, parse_note_number, parse_timestamp, parse_velocity,
    validate_velocity,
};
use crate::sequence::note_name::note_name;
use crate::track::changes::{NoteValues, ResetScope};
use crate::track::entry::TrackEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteColumn {
    Index,
    Note,
    Time,
    Velocity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// One note-on as shown in the table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteRow {
    /// Stable key of the event; what the change map is keyed by
    pub source_index: usize,
    pub number: u8,
    pub timestamp: f64,
    pub velocity: u8,
    pub edited: bool,
}

/// Editing view over one track.
///
/// Rows are addressed by display position; every edit goes through the
/// entry so the change map and the sequence stay in step.
pub struct NoteModel<'a> {
    entry: &'a mut TrackEntry,
    channel: Option<u8>,
    rows: Vec<NoteRow>,
    sort: (NoteColumn, SortOrder),
}

impl<'a> NoteModel<'a> {
    /// View the note-ons of `entry`, restricted to `channel` when given
    pub fn new(entry: &'a mut TrackEntry, channel: Option<u8>) -> Self {
        let mut model = Self {
            entry,
            channel,
            rows: Vec::new(),
            sort: (NoteColumn::Time, SortOrder::Ascending),
        };
        model.refresh();
        model
    }

    pub fn rows(&self) -> &[NoteRow] {
        &self.rows
    }

    pub fn row(&self, row: usize) -> Option<&NoteRow> {
        self.rows.get(row)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn entry(&self) -> &TrackEntry {
        self.entry
    }

    pub fn sort_by(&mut self, column: NoteColumn, order: SortOrder) {
        self.sort = (column, order);
        self.apply_sort();
    }

    pub fn cell_text(&self, row: usize, column: NoteColumn) -> Option<String> {
        let row = self.rows.get(row)?;
        Some(match column {
            NoteColumn::Index => row.source_index.to_string(),
            NoteColumn::Note => note_name(row.number),
            NoteColumn::Time => format!("{:.3}", row.timestamp),
            NoteColumn::Velocity => row.velocity.to_string(),
        })
    }

    /// Edit a cell from text, as typed by the user
    pub fn set_cell_text(
        &mut self,
        row: usize,
        column: NoteColumn,
        text: &str,
    ) -> Result<(), EditRejection> {
        match column {
            NoteColumn::Note => self.set_note_number(row, parse_note_number(text)?),
            NoteColumn::Time => self.set_timestamp(row, parse_timestamp(text)?),
            NoteColumn::Velocity => self.set_velocity(row, i64::from(parse_velocity(text)?)),
            NoteColumn::Index => Err(EditRejection::UnknownRow),
        }
    }

    pub fn set_note_number(&mut self, row: usize, number: u8) -> Result<(), EditRejection> {
        if number > 127 {
            return Err(EditRejection::InvalidNoteName);
        }
        let current = self.row(row).copied().ok_or(EditRejection::UnknownRow)?;
        self.commit(
            current,
            NoteValues::new(number, current.timestamp, current.velocity),
        );
        Ok(())
    }

    pub fn set_velocity(&mut self, row: usize, velocity: i64) -> Result<(), EditRejection> {
        let velocity = validate_velocity(velocity)?;
        let current = self.row(row).copied().ok_or(EditRejection::UnknownRow)?;
        self.commit(
            current,
            NoteValues::new(current.number, current.timestamp, velocity),
        );
        Ok(())
    }

    /// Move a note-on to `timestamp` (current seconds). The move may not
    /// reorder the track's note-ons.
    pub fn set_timestamp(&mut self, row: usize, timestamp: f64) -> Result<(), EditRejection> {
        let current = self.row(row).copied().ok_or(EditRejection::UnknownRow)?;

        let mut in_time_order: Vec<(f64, usize)> = self
            .rows
            .iter()
            .map(|r| (r.timestamp, r.source_index))
            .collect();
        in_time_order.sort_by(|a, b| a.0.total_cmp(&b.0));
        let times: Vec<f64> = in_time_order.iter().map(|(t, _)| *t).collect();
        let position = in_time_order
            .iter()
            .position(|(_, source)| *source == current.source_index)
            .ok_or(EditRejection::UnknownRow)?;

        if !is_valid_timestamp_delta(&times, position, timestamp - current.timestamp) {
            return Err(EditRejection::TimestampOutOfOrder);
        }

        self.commit(
            current,
            NoteValues::new(current.number, timestamp, current.velocity),
        );
        Ok(())
    }

    /// Put the fields named by `scope` back to their original values.
    /// Returns how many notes were rewritten.
    pub fn reset(&mut self, scope: ResetScope) -> usize {
        let count = self.entry.reset_changes(scope);
        self.refresh();
        count
    }

    pub fn reset_all_properties(&mut self) -> usize {
        self.reset(ResetScope::AllProperties)
    }

    pub fn reset_only_notes(&mut self) -> usize {
        self.reset(ResetScope::OnlyNotes)
    }

    pub fn reset_only_timestamps(&mut self) -> usize {
        self.reset(ResetScope::OnlyTimeStamps)
    }

    pub fn reset_only_velocities(&mut self) -> usize {
        self.reset(ResetScope::OnlyVelocities)
    }

    fn commit(&mut self, current: NoteRow, after: NoteValues) {
        let before = NoteValues::new(current.number, current.timestamp, current.velocity);
        if before.same_as(&after) {
            return;
        }
        self.entry.record_edit(current.source_index, after);
        self.refresh();
    }

    /// Rebuild rows from the entry's sequence, keeping the display sort
    pub fn refresh(&mut self) {
        let changes = self.entry.changes();
        self.rows = self
            .entry
            .sequence()
            .iter()
            .filter(|e| e.message.is_note_on() && !e.is_synthetic())
            .filter(|e| self.channel.is_none_or(|c| e.message.channel() == c))
            .filter_map(|e| {
                Some(NoteRow {
                    source_index: e.source_index,
                    number: e.message.note_number()?,
                    timestamp: e.timestamp,
                    velocity: e.message.velocity()?,
                    edited: changes.is_some_and(|c| c.contains(e.source_index)),
                })
            })
            .collect();
        self.apply_sort();
    }

    fn apply_sort(&mut self) {
        let (column, order) = self.sort;
        self.rows.sort_by(|a, b| {
            let ordering = match column {
                NoteColumn::Index => a.source_index.cmp(&b.source_index),
                NoteColumn::Note => a.number.cmp(&b.number),
                NoteColumn::Time => a.timestamp.total_cmp(&b.timestamp),
                NoteColumn::Velocity => a.velocity.cmp(&b.velocity),
            }
            .then_with(|| a.source_index.cmp(&b.source_index));
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
    }

    /// Row currently showing the event with `source_index`
    pub fn row_of_source(&self, source_index: usize) -> Option<usize> {
        self.rows.iter().position(|r| r.source_index == source_index)
    }
}
