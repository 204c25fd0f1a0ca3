// Catalog module - JSON persistence of tracks, edits and styles

pub mod manager;
pub mod style;
pub mod types;

pub use manager::{CatalogError, load_catalog, load_catalog_into, save_catalog};
pub use style::{StyleCatalog, StyleRecord, StyleSection, StyleTrackChanges};
pub use types::{FolderRecord, TrackCatalog, TrackRecord};
