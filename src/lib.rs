// Keystyle - multi-track MIDI playback, tempo remapping and note editing

pub mod catalog;
pub mod config;
pub mod connection;
pub mod editor;
pub mod messaging;
pub mod midi;
pub mod player;
pub mod recorder;
pub mod sequence;
pub mod timing;
pub mod track;

// Re-export commonly used types for convenience
pub use catalog::{CatalogError, StyleCatalog, StyleSection, load_catalog, save_catalog};
pub use config::{ConfigError, EngineConfig};
pub use editor::{EditRejection, NoteColumn, NoteModel, SortOrder};
pub use messaging::{Notification, NotificationCategory, NotificationLevel};
pub use midi::{CaptureOutput, DeviceError, MidiMessage, OutputDevice, OutputHandle};
pub use player::{MultiTrackPlayer, PlayerConfig, PlayerEvent};
pub use recorder::{LiveRecorder, RecordedEvent, RecorderEvent};
pub use sequence::{MidiFileError, MidiSequence, TimedEvent, find_next_event_index};
pub use track::{ChangeInfo, ChangeMap, ResetScope, TrackEntry, TrackStore, TrackType};
