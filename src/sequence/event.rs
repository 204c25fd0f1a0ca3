// Second-based MIDI sequences with stable event identities

use crate::midi::event::MidiMessage;
use std::collections::{HashMap, VecDeque};

/// Source index carried by events that do not come from a file
/// (volume/program lead-in events injected before playback)
pub const SYNTHETIC_EVENT: usize = usize::MAX;

/// One message at an absolute time in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    pub message: MidiMessage,
    pub timestamp: f64,
    /// Position of this event in the freshly converted file sequence.
    /// Survives sorting, filtering and rescaling; the change map is keyed by it.
    pub source_index: usize,
    matched: Option<usize>,
}

impl TimedEvent {
    pub fn new(message: MidiMessage, timestamp: f64, source_index: usize) -> Self {
        Self {
            message,
            timestamp,
            source_index,
            matched: None,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.source_index == SYNTHETIC_EVENT
    }
}

/// Arena-style sequence: events are addressed by position, and by
/// `source_index` when the position may have moved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MidiSequence {
    events: Vec<TimedEvent>,
}

impl MidiSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<TimedEvent>) -> Self {
        let mut sequence = Self { events };
        sequence.update_matched_pairs();
        sequence
    }

    /// Append a file event; its source index is its position
    pub fn push(&mut self, message: MidiMessage, timestamp: f64) -> usize {
        let index = self.events.len();
        self.events.push(TimedEvent::new(message, timestamp, index));
        index
    }

    pub fn push_event(&mut self, event: TimedEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TimedEvent> {
        self.events.get(index)
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimedEvent> {
        self.events.iter()
    }

    /// Timestamp of the last event, 0 for an empty sequence
    pub fn end_time(&self) -> f64 {
        self.events.last().map_or(0.0, |e| e.timestamp)
    }

    /// Current position of the event with the given source index
    pub fn position_of_source(&self, source_index: usize) -> Option<usize> {
        self.events
            .iter()
            .position(|e| e.source_index == source_index)
    }

    /// Position of the note-off paired with the note-on at `index`
    pub fn matched_index(&self, index: usize) -> Option<usize> {
        self.events.get(index).and_then(|e| e.matched)
    }

    /// Stable time sort; at equal timestamps note-offs go before note-ons so a
    /// repeated note is released before it is struck again.
    pub fn sort(&mut self) {
        self.events.sort_by(|a, b| {
            a.timestamp
                .total_cmp(&b.timestamp)
                .then_with(|| note_rank(&a.message).cmp(&note_rank(&b.message)))
        });
    }

    /// Re-derive note-on/note-off pairs.
    ///
    /// Each note-on is paired with the first later note-off on the same channel
    /// and note number that no earlier note-on has claimed.
    pub fn update_matched_pairs(&mut self) {
        let mut open: HashMap<(u8, u8), VecDeque<usize>> = HashMap::new();

        for event in &mut self.events {
            event.matched = None;
        }

        for index in 0..self.events.len() {
            let message = self.events[index].message;
            let Some(note) = message.note_number() else {
                continue;
            };
            let key = (message.channel(), note);

            if message.is_note_on() {
                open.entry(key).or_default().push_back(index);
            } else if let Some(on_index) = open.get_mut(&key).and_then(|q| q.pop_front()) {
                self.events[on_index].matched = Some(index);
            }
        }
    }

    /// Sort then re-pair; call after any timestamp or channel rewrite
    pub fn sort_and_pair(&mut self) {
        self.sort();
        self.update_matched_pairs();
    }

    /// First event with `timestamp >= time`, or `len()` if none
    pub fn find_next_event_index(&self, time: f64) -> usize {
        find_next_event_index(&self.events, time)
    }

    /// Note on/off events only, readdressed to `channel`, re-paired
    pub fn filtered_notes(&self, channel: u8) -> MidiSequence {
        let events = self
            .events
            .iter()
            .filter(|e| e.message.is_note())
            .map(|e| TimedEvent::new(e.message.with_channel(channel), e.timestamp, e.source_index))
            .collect();
        MidiSequence::from_events(events)
    }

    /// Multiply every timestamp by `factor`
    pub fn scale_timestamps(&mut self, factor: f64) {
        for event in &mut self.events {
            event.timestamp *= factor;
        }
    }

    /// Readdress every message to `channel`
    pub fn set_channel(&mut self, channel: u8) {
        for event in &mut self.events {
            event.message = event.message.with_channel(channel);
        }
    }

    /// Overwrite a note-on's number, timestamp and velocity.
    ///
    /// The paired note-off takes the new number and keeps the note's duration.
    /// The caller re-sorts when the timestamp moved.
    pub fn set_note_values(&mut self, index: usize, number: u8, timestamp: f64, velocity: u8) {
        let Some(event) = self.events.get_mut(index) else {
            return;
        };
        let old_timestamp = event.timestamp;
        event.message.set_note_number(number);
        event.message.set_velocity(velocity);
        event.timestamp = timestamp;
        let matched = event.matched;

        if let Some(off) = matched.and_then(|i| self.events.get_mut(i)) {
            let duration = off.timestamp - old_timestamp;
            off.message.set_note_number(number);
            off.timestamp = timestamp + duration;
        }
    }
}

fn note_rank(message: &MidiMessage) -> u8 {
    match message {
        MidiMessage::NoteOff { .. } => 0,
        MidiMessage::NoteOn { .. } => 2,
        _ => 1,
    }
}

/// Lower bound on a time-sorted slice: smallest `i` with
/// `events[i].timestamp >= time`, or `events.len()` if there is none.
///
/// Every cursor resync goes through this one function.
pub fn find_next_event_index(events: &[TimedEvent], time: f64) -> usize {
    events.partition_point(|e| e.timestamp < time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on(note: u8) -> MidiMessage {
        MidiMessage::NoteOn {
            channel: 1,
            note,
            velocity: 100,
        }
    }

    fn off(note: u8) -> MidiMessage {
        MidiMessage::NoteOff {
            channel: 1,
            note,
            velocity: 0,
        }
    }

    fn sequence_at(times: &[f64]) -> MidiSequence {
        let mut sequence = MidiSequence::new();
        for &t in times {
            sequence.push(on(60), t);
        }
        sequence
    }

    #[test]
    fn test_find_next_event_index_empty() {
        assert_eq!(MidiSequence::new().find_next_event_index(0.0), 0);
        assert_eq!(MidiSequence::new().find_next_event_index(5.0), 0);
    }

    #[test]
    fn test_find_next_event_index_single() {
        let sequence = sequence_at(&[1.0]);
        assert_eq!(sequence.find_next_event_index(0.5), 0);
        assert_eq!(sequence.find_next_event_index(1.0), 0);
        assert_eq!(sequence.find_next_event_index(1.5), 1);
    }

    #[test]
    fn test_find_next_event_index_ties_return_first() {
        let sequence = sequence_at(&[0.0, 1.0, 1.0, 1.0, 2.0]);
        assert_eq!(sequence.find_next_event_index(1.0), 1);
        assert_eq!(sequence.find_next_event_index(1.0001), 4);
        assert_eq!(sequence.find_next_event_index(3.0), 5);
    }

    #[test]
    fn test_pairs_follow_channel_and_note() {
        let mut sequence = MidiSequence::new();
        sequence.push(on(60), 0.0);
        sequence.push(on(64), 0.1);
        sequence.push(off(64), 0.5);
        sequence.push(off(60), 1.0);
        sequence.update_matched_pairs();

        assert_eq!(sequence.matched_index(0), Some(3));
        assert_eq!(sequence.matched_index(1), Some(2));
        assert_eq!(sequence.matched_index(2), None);
    }

    #[test]
    fn test_repeated_note_pairs_in_order() {
        let mut sequence = MidiSequence::new();
        sequence.push(on(60), 0.0);
        sequence.push(on(60), 0.2);
        sequence.push(off(60), 0.5);
        sequence.push(off(60), 0.7);
        sequence.update_matched_pairs();

        assert_eq!(sequence.matched_index(0), Some(2));
        assert_eq!(sequence.matched_index(1), Some(3));
    }

    #[test]
    fn test_sort_puts_note_off_first_on_ties() {
        let mut sequence = MidiSequence::new();
        sequence.push(on(60), 1.0);
        sequence.push(off(60), 1.0);
        sequence.push(on(62), 0.5);
        sequence.sort();

        let sources: Vec<usize> = sequence.iter().map(|e| e.source_index).collect();
        assert_eq!(sources, vec![2, 1, 0]);
    }

    #[test]
    fn test_filtered_notes_drops_other_messages() {
        let mut sequence = MidiSequence::new();
        sequence.push(
            MidiMessage::ProgramChange {
                channel: 1,
                program: 5,
            },
            0.0,
        );
        sequence.push(on(60), 0.0);
        sequence.push(off(60), 1.0);

        let filtered = sequence.filtered_notes(3);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|e| e.message.channel() == 3));
        assert_eq!(filtered.get(0).unwrap().source_index, 1);
        assert_eq!(filtered.matched_index(0), Some(1));
    }

    #[test]
    fn test_set_note_values_moves_note_off() {
        let mut sequence = MidiSequence::new();
        sequence.push(on(60), 1.0);
        sequence.push(off(60), 1.5);
        sequence.update_matched_pairs();

        sequence.set_note_values(0, 67, 2.0, 90);

        let note_off = sequence.get(1).unwrap();
        assert_eq!(note_off.message.note_number(), Some(67));
        assert!((note_off.timestamp - 2.5).abs() < 1e-12);
        assert_eq!(sequence.get(0).unwrap().message.velocity(), Some(90));
    }
}
