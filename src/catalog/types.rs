// Catalog types - on-disk JSON schema of the track catalog

use crate::track::changes::ChangeMap;
use crate::track::entry::TrackEntry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One imported file and the tracks taken from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    pub folder_name: String,
    pub file_path: PathBuf,
    #[serde(rename = "Tracks", default)]
    pub tracks: Vec<TrackRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    pub track_index: usize,
    pub display_name: String,
    pub uuid: Uuid,
    /// Edits of the default style, keyed by source index
    #[serde(rename = "Changes", default)]
    pub changes: ChangeMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
}

impl TrackRecord {
    pub fn from_entry(entry: &TrackEntry, changes: ChangeMap) -> Self {
        Self {
            track_index: entry.track_index,
            display_name: entry.display_name.clone(),
            uuid: entry.uuid,
            changes,
            instrument: Some(entry.instrument),
            volume: Some(entry.volume),
        }
    }
}

/// The whole catalog file: an array of folders
pub type TrackCatalog = Vec<FolderRecord>;
