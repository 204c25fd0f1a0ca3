// Editor module - change-tracking note table and its validators

pub mod note_model;
pub mod validator;

pub use note_model::{NoteColumn, NoteModel, NoteRow, SortOrder};
pub use validator::{EditRejection, is_valid_timestamp_delta};
