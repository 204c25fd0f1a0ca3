// Style catalog - named arrangements: sections plus per-track edits

use crate::catalog::manager::CatalogError;
use crate::track::changes::ChangeMap;
use crate::track::entry::DEFAULT_STYLE;
use crate::track::store::TrackStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Arrangement marker. Times are seconds at the file's own tempo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSection {
    pub id: String,
    pub name: String,
    pub start_time_seconds: f64,
    pub end_time_seconds: f64,
    pub start_bar: u32,
    pub end_bar: u32,
}

impl StyleSection {
    pub fn duration(&self) -> f64 {
        (self.end_time_seconds - self.start_time_seconds).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleTrackChanges {
    pub uuid: Uuid,
    #[serde(rename = "Changes", default)]
    pub changes: ChangeMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sections: Vec<StyleSection>,
    #[serde(rename = "Tracks", default)]
    pub tracks: Vec<StyleTrackChanges>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleCatalog {
    styles: Vec<StyleRecord>,
}

impl StyleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn styles(&self) -> &[StyleRecord] {
        &self.styles
    }

    pub fn style(&self, id: &str) -> Option<&StyleRecord> {
        self.styles.iter().find(|s| s.id == id)
    }

    /// Add a style, replacing one with the same id
    pub fn upsert(&mut self, style: StyleRecord) {
        match self.styles.iter_mut().find(|s| s.id == style.id) {
            Some(existing) => *existing = style,
            None => self.styles.push(style),
        }
    }

    pub fn section(&self, style_id: &str, section_id: &str) -> Option<&StyleSection> {
        self.style(style_id)?
            .sections
            .iter()
            .find(|s| s.id == section_id)
    }

    /// Hand every stored change map to its track. Tracks not in the store
    /// are skipped. Returns how many maps were applied.
    pub fn apply_to(&self, store: &mut TrackStore) -> usize {
        let mut applied = 0;
        for style in &self.styles {
            for track in &style.tracks {
                match store.find_mut(track.uuid) {
                    Some(entry) => {
                        entry.set_style_changes(&style.id, track.changes.clone());
                        applied += 1;
                    }
                    None => tracing::debug!(uuid = %track.uuid, style = %style.id, "style refers to unknown track"),
                }
            }
        }
        applied
    }

    /// Refresh the per-track maps of every known style from `store`
    pub fn capture_from(&mut self, store: &TrackStore) {
        for style in &mut self.styles {
            style.tracks = store
                .tracks()
                .filter_map(|entry| {
                    let changes = entry.style_changes(&style.id)?;
                    (!changes.is_empty()).then(|| StyleTrackChanges {
                        uuid: entry.uuid,
                        changes: changes.clone(),
                    })
                })
                .collect();
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog: StyleCatalog = serde_json::from_str(&json)?;
        if catalog.style(DEFAULT_STYLE).is_some() {
            tracing::warn!("style catalog redefines the default style; its edits live in the track catalog");
        }
        tracing::info!(path = %path.display(), styles = catalog.styles.len(), "style catalog loaded");
        Ok(catalog)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section() -> StyleSection {
        StyleSection {
            id: "verse".into(),
            name: "Verse".into(),
            start_time_seconds: 8.0,
            end_time_seconds: 16.0,
            start_bar: 5,
            end_bar: 9,
        }
    }

    #[test]
    fn test_section_schema() {
        let json = serde_json::to_value(section()).unwrap();
        assert_eq!(json["startTimeSeconds"], 8.0);
        assert_eq!(json["endBar"], 9);
        assert_eq!(section().duration(), 8.0);
    }

    #[test]
    fn test_upsert_and_lookup() {
        let mut catalog = StyleCatalog::new();
        catalog.upsert(StyleRecord {
            id: "rock".into(),
            name: "Rock".into(),
            sections: vec![section()],
            tracks: Vec::new(),
        });
        catalog.upsert(StyleRecord {
            id: "rock".into(),
            name: "Rock 2".into(),
            sections: vec![section()],
            tracks: Vec::new(),
        });

        assert_eq!(catalog.styles().len(), 1);
        assert_eq!(catalog.style("rock").unwrap().name, "Rock 2");
        assert_eq!(catalog.section("rock", "verse").unwrap().start_bar, 5);
        assert!(catalog.section("rock", "chorus").is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("styles.json");
        let mut catalog = StyleCatalog::new();
        catalog.upsert(StyleRecord {
            id: "jazz".into(),
            name: "Jazz".into(),
            sections: vec![section()],
            tracks: Vec::new(),
        });
        catalog.save(&path).unwrap();

        assert_eq!(StyleCatalog::load(&path).unwrap(), catalog);
    }
}
