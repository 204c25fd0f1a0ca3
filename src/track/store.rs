// Track store - folders of imported tracks, addressed by uuid

use crate::sequence::timebase::{MidiFileData, MidiFileError, load_midi_file};
use crate::track::entry::TrackEntry;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// All tracks imported from one MIDI file
#[derive(Debug, Clone)]
pub struct TrackFolder {
    pub folder_name: String,
    pub file_path: PathBuf,
    pub tracks: Vec<TrackEntry>,
}

impl TrackFolder {
    /// One entry per track of `data` that carries notes
    pub fn from_file_data(data: &MidiFileData, folder_name: &str, file_path: &Path) -> Self {
        let tracks = data
            .note_tracks()
            .map(|track| TrackEntry::from_file_track(data, track, folder_name, file_path))
            .collect();

        Self {
            folder_name: folder_name.to_string(),
            file_path: file_path.to_path_buf(),
            tracks,
        }
    }
}

/// Exclusive owner of every Track Entry
#[derive(Debug, Default)]
pub struct TrackStore {
    folders: Vec<TrackFolder>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a file and add its tracks as a new folder.
    ///
    /// The folder is named after the file stem unless `folder_name` is given.
    pub fn import_file(
        &mut self,
        path: impl AsRef<Path>,
        folder_name: Option<&str>,
    ) -> Result<&TrackFolder, MidiFileError> {
        // stored absolute: catalogs resolve relative paths against their own directory
        let path = path.as_ref();
        let path = std::path::absolute(path).map_err(|source| MidiFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let data = load_midi_file(&path)?;
        let name = folder_name.map(str::to_string).unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Untitled".to_string())
        });

        let folder = TrackFolder::from_file_data(&data, &name, &path);
        tracing::info!(folder = %name, tracks = folder.tracks.len(), "folder imported");
        Ok(self.add_folder(folder))
    }

    pub fn add_folder(&mut self, folder: TrackFolder) -> &TrackFolder {
        self.folders.push(folder);
        let last = self.folders.len() - 1;
        &self.folders[last]
    }

    pub fn remove_folder(&mut self, folder_name: &str) -> Option<TrackFolder> {
        let position = self
            .folders
            .iter()
            .position(|f| f.folder_name == folder_name)?;
        Some(self.folders.remove(position))
    }

    pub fn remove_track(&mut self, uuid: Uuid) -> Option<TrackEntry> {
        self.folders.iter_mut().find_map(|folder| {
            let position = folder.tracks.iter().position(|t| t.uuid == uuid)?;
            Some(folder.tracks.remove(position))
        })
    }

    pub fn folders(&self) -> &[TrackFolder] {
        &self.folders
    }

    pub fn folder(&self, folder_name: &str) -> Option<&TrackFolder> {
        self.folders.iter().find(|f| f.folder_name == folder_name)
    }

    pub fn find(&self, uuid: Uuid) -> Option<&TrackEntry> {
        self.tracks().find(|t| t.uuid == uuid)
    }

    pub fn find_mut(&mut self, uuid: Uuid) -> Option<&mut TrackEntry> {
        self.tracks_mut().find(|t| t.uuid == uuid)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackEntry> {
        self.folders.iter().flat_map(|f| f.tracks.iter())
    }

    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut TrackEntry> {
        self.folders.iter_mut().flat_map(|f| f.tracks.iter_mut())
    }

    pub fn track_count(&self) -> usize {
        self.folders.iter().map(|f| f.tracks.len()).sum()
    }

    pub fn clear(&mut self) {
        self.folders.clear();
    }
}
