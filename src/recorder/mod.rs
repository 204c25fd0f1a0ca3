// Recorder module - live capture and playback of incoming MIDI

pub mod file;
pub mod live;

pub use file::{load_recording, save_recording};
pub use live::{LiveRecorder, RecordedEvent, RecorderEvent, RecorderInput};
