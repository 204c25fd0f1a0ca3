// Catalog manager - saving the track store and rebuilding it from disk

use crate::catalog::types::{FolderRecord, TrackCatalog, TrackRecord};
use crate::sequence::timebase::{MidiFileError, load_midi_file};
use crate::track::entry::{DEFAULT_STYLE, TrackEntry};
use crate::track::store::{TrackFolder, TrackStore};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("cannot access catalog '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot reload '{path}': {source}")]
    Midi {
        path: PathBuf,
        #[source]
        source: MidiFileError,
    },

    #[error("folder '{folder}' has no track {track_index}")]
    UnknownTrack { folder: String, track_index: usize },
}

/// Catalog records for everything in `store` (default-style edits only)
pub fn catalog_from_store(store: &TrackStore) -> TrackCatalog {
    store
        .folders()
        .iter()
        .map(|folder| FolderRecord {
            folder_name: folder.folder_name.clone(),
            file_path: folder.file_path.clone(),
            tracks: folder
                .tracks
                .iter()
                .map(|entry| {
                    let changes = entry.style_changes(DEFAULT_STYLE).cloned().unwrap_or_default();
                    TrackRecord::from_entry(entry, changes)
                })
                .collect(),
        })
        .collect()
}

pub fn save_catalog(path: impl AsRef<Path>, store: &TrackStore) -> Result<(), CatalogError> {
    let path = path.as_ref();
    let catalog = catalog_from_store(store);
    let json = serde_json::to_string_pretty(&catalog)?;
    std::fs::write(path, json).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), folders = catalog.len(), "catalog saved");
    Ok(())
}

pub fn read_catalog(path: impl AsRef<Path>) -> Result<TrackCatalog, CatalogError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&json)?)
}

/// Re-parse every referenced file and re-apply the stored edits.
///
/// Relative file paths are taken from the catalog's directory. Any failure
/// aborts the whole load.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<TrackStore, CatalogError> {
    let path = path.as_ref();
    let catalog = read_catalog(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let mut store = TrackStore::new();
    for record in &catalog {
        store.add_folder(rebuild_folder(record, base)?);
    }
    tracing::info!(
        path = %path.display(),
        folders = store.folders().len(),
        tracks = store.track_count(),
        "catalog loaded"
    );
    Ok(store)
}

/// Replace `store` with the catalog at `path`; on error `store` is untouched
pub fn load_catalog_into(store: &mut TrackStore, path: impl AsRef<Path>) -> Result<(), CatalogError> {
    *store = load_catalog(path)?;
    Ok(())
}

fn rebuild_folder(record: &FolderRecord, base: &Path) -> Result<TrackFolder, CatalogError> {
    let file_path = if record.file_path.is_relative() {
        base.join(&record.file_path)
    } else {
        record.file_path.clone()
    };
    let data = load_midi_file(&file_path).map_err(|source| CatalogError::Midi {
        path: file_path.clone(),
        source,
    })?;

    let mut tracks = Vec::with_capacity(record.tracks.len());
    for track in &record.tracks {
        let tick_track = data
            .track(track.track_index)
            .ok_or_else(|| CatalogError::UnknownTrack {
                folder: record.folder_name.clone(),
                track_index: track.track_index,
            })?;

        let mut entry =
            TrackEntry::from_file_track(&data, tick_track, &record.folder_name, &record.file_path);
        entry.uuid = track.uuid;
        entry.display_name = track.display_name.clone();
        if let Some(instrument) = track.instrument {
            entry.instrument = instrument;
        }
        if let Some(volume) = track.volume {
            entry.volume = volume;
        }
        entry.set_style_changes(DEFAULT_STYLE, track.changes.clone());
        tracks.push(entry);
    }

    Ok(TrackFolder {
        folder_name: record.folder_name.clone(),
        file_path: record.file_path.clone(),
        tracks,
    })
}
