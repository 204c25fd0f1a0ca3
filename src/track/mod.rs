// Track module - imported tracks, their edits and their owner

pub mod changes;
pub mod entry;
pub mod store;

pub use changes::{ChangeInfo, ChangeMap, NoteValues, ResetScope};
pub use entry::{DEFAULT_STYLE, TrackEntry, TrackType};
pub use store::{TrackFolder, TrackStore};
