//! Track and style catalogs written to disk and read back

use keystyle::catalog::{
    CatalogError, StyleCatalog, StyleRecord, StyleSection, load_catalog, load_catalog_into,
    save_catalog,
};
use keystyle::midi::event::MidiMessage;
use keystyle::sequence::timebase::{TickEvent, TickSequence, TickTrack, write_midi_file};
use keystyle::track::{TrackStore, TrackType};
use keystyle::NoteModel;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn notes(channel: u8, notes: &[u8]) -> TickTrack {
    let mut events = Vec::new();
    for (i, &note) in notes.iter().enumerate() {
        let tick = i as u64 * 480;
        events.push(TickEvent {
            message: MidiMessage::NoteOn {
                channel,
                note,
                velocity: 90,
            },
            tick,
        });
        events.push(TickEvent {
            message: MidiMessage::NoteOff {
                channel,
                note,
                velocity: 0,
            },
            tick: tick + 240,
        });
    }
    TickTrack {
        index: 0,
        name: Some(format!("ch{channel}")),
        events: Arc::new(TickSequence::new(events)),
        track_type: TrackType::Melodic,
    }
}

fn write_fixture(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("ballad.mid");
    write_midi_file(
        &path,
        &[notes(1, &[60, 62, 64]), notes(10, &[36, 38, 36])],
        480,
        90.0,
    )
    .unwrap();
    path
}

fn imported(dir: &TempDir) -> TrackStore {
    let mut store = TrackStore::new();
    store.import_file(write_fixture(dir.path()), None).unwrap();
    store
}

#[test]
fn test_edits_survive_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = imported(&dir);
    let uuid = store.folders()[0].tracks[0].uuid;
    {
        let entry = store.find_mut(uuid).unwrap();
        let mut model = NoteModel::new(entry, None);
        model.set_velocity(1, 40).unwrap();
        model.set_note_number(2, 65).unwrap();
    }

    let catalog_path = dir.path().join("catalog.json");
    save_catalog(&catalog_path, &store).unwrap();
    let loaded = load_catalog(&catalog_path).unwrap();

    assert_eq!(loaded.folders().len(), 1);
    assert_eq!(loaded.folders()[0].folder_name, "ballad");
    assert_eq!(loaded.track_count(), 2);

    let original = store.find(uuid).unwrap();
    let entry = loaded.find(uuid).unwrap();
    assert_eq!(entry.display_name, original.display_name);
    assert_eq!(entry.track_index, original.track_index);
    assert_eq!(entry.changes(), original.changes());
    assert_eq!(entry.sequence(), original.sequence());
    assert_eq!(entry.note_values(2).unwrap().velocity, 40);
    assert_eq!(entry.note_values(4).unwrap().number, 65);
}

/// `target` spelled relative to the working directory
fn relative_to_cwd(target: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap();
    let mut relative = PathBuf::new();
    for _ in cwd.components().skip(1) {
        relative.push("..");
    }
    relative.join(target.strip_prefix("/").unwrap())
}

#[test]
fn test_relative_import_reloads_from_another_directory() {
    let songs = tempfile::tempdir().unwrap();
    let catalogs = tempfile::tempdir().unwrap();
    let file = write_fixture(songs.path());
    let relative = relative_to_cwd(&file);
    assert!(relative.is_relative());

    let mut store = TrackStore::new();
    store.import_file(&relative, None).unwrap();
    assert!(store.folders()[0].file_path.is_absolute());
    let uuid = store.folders()[0].tracks[0].uuid;
    {
        let mut model = NoteModel::new(store.find_mut(uuid).unwrap(), None);
        model.set_velocity(0, 55).unwrap();
    }

    let catalog_path = catalogs.path().join("catalog.json");
    save_catalog(&catalog_path, &store).unwrap();
    let loaded = load_catalog(&catalog_path).unwrap();
    assert_eq!(loaded.find(uuid).unwrap().note_values(0).unwrap().velocity, 55);
}

#[test]
fn test_catalog_json_shape() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = imported(&dir);
    let uuid = store.folders()[0].tracks[0].uuid;
    {
        let mut model = NoteModel::new(store.find_mut(uuid).unwrap(), None);
        model.set_velocity(0, 12).unwrap();
    }
    let catalog_path = dir.path().join("catalog.json");
    save_catalog(&catalog_path, &store).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&catalog_path).unwrap()).unwrap();
    let track = &json[0]["Tracks"][0];
    assert_eq!(json[0]["folderName"], "ballad");
    assert_eq!(track["uuid"], uuid.to_string());
    assert_eq!(track["Changes"]["0"]["oldVelocity"], 90);
    assert_eq!(track["Changes"]["0"]["newVelocity"], 12);
}

#[test]
fn test_relative_paths_resolve_against_catalog() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let catalog_path = dir.path().join("catalog.json");
    std::fs::write(
        &catalog_path,
        r#"[{"folderName": "ballad", "filePath": "ballad.mid", "Tracks": [
            {"trackIndex": 2, "displayName": "Drums",
             "uuid": "6f1c1a4e-4d0e-4c39-9a3e-0f5b8f2a7d11"}]}]"#,
    )
    .unwrap();

    let store = load_catalog(&catalog_path).unwrap();
    let entry = &store.folders()[0].tracks[0];
    assert_eq!(entry.display_name, "Drums");
    assert_eq!(entry.track_type, TrackType::Percussion);
    assert!(entry.changes().is_none_or(|c| c.is_empty()));
}

#[test]
fn test_failed_load_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = imported(&dir);
    let catalog_path = dir.path().join("catalog.json");
    std::fs::write(
        &catalog_path,
        r#"[{"folderName": "gone", "filePath": "missing.mid", "Tracks": []}]"#,
    )
    .unwrap();

    let result = load_catalog_into(&mut store, &catalog_path);
    assert!(matches!(result, Err(CatalogError::Midi { .. })));
    assert_eq!(store.track_count(), 2);

    std::fs::write(
        &catalog_path,
        r#"[{"folderName": "ballad", "filePath": "ballad.mid", "Tracks": [
            {"trackIndex": 9, "displayName": "Nope",
             "uuid": "6f1c1a4e-4d0e-4c39-9a3e-0f5b8f2a7d11"}]}]"#,
    )
    .unwrap();
    let result = load_catalog_into(&mut store, &catalog_path);
    assert!(matches!(
        result,
        Err(CatalogError::UnknownTrack { track_index: 9, .. })
    ));
    assert_eq!(store.folders()[0].folder_name, "ballad");
}

#[test]
fn test_style_catalog_applies_per_track_edits() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = imported(&dir);
    let uuid = store.folders()[0].tracks[0].uuid;

    // author an edit under the "verse" style and capture it
    {
        let entry = store.find_mut(uuid).unwrap();
        entry.select_style("verse", 90.0);
        let mut model = NoteModel::new(entry, None);
        model.set_note_number(0, 72).unwrap();
    }
    let mut styles = StyleCatalog::new();
    styles.upsert(StyleRecord {
        id: "verse".into(),
        name: "Verse".into(),
        sections: vec![StyleSection {
            id: "a".into(),
            name: "A".into(),
            start_time_seconds: 0.0,
            end_time_seconds: 1.0,
            start_bar: 1,
            end_bar: 2,
        }],
        tracks: Vec::new(),
    });
    styles.capture_from(&store);
    assert_eq!(styles.style("verse").unwrap().tracks.len(), 1);

    let styles_path = dir.path().join("styles.json");
    styles.save(&styles_path).unwrap();

    // a fresh import knows nothing about the style until it is applied
    let mut fresh = imported(&dir);
    let fresh_uuid = fresh.folders()[0].tracks[0].uuid;
    let mut loaded = StyleCatalog::load(&styles_path).unwrap();
    for style in loaded.styles().to_vec() {
        let mut style = style;
        for track in &mut style.tracks {
            track.uuid = fresh_uuid;
        }
        loaded.upsert(style);
    }
    assert_eq!(loaded.apply_to(&mut fresh), 1);

    let entry = fresh.find_mut(fresh_uuid).unwrap();
    assert_eq!(entry.note_values(0).unwrap().number, 60);
    entry.select_style("verse", 90.0);
    assert_eq!(entry.note_values(0).unwrap().number, 72);

    let section = loaded.section("verse", "a").unwrap();
    assert!((section.duration() - 1.0).abs() < 1e-12);
}
