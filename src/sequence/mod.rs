// Sequences: second-based events, tick/second time base, note names

pub mod event;
pub mod note_name;
pub mod timebase;

pub use event::{MidiSequence, SYNTHETIC_EVENT, TimedEvent, find_next_event_index};
pub use note_name::{note_name, parse_note_name};
pub use timebase::{
    DEFAULT_BPM, DEFAULT_TICKS_PER_QUARTER, MidiFileData, MidiFileError, TickEvent, TickSequence,
    TickTrack, load_midi_file, parse_midi_bytes, ticks_to_seconds,
};
