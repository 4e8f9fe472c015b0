//! Local snapshot store
//!
//! The whole liked collection is kept as one JSON document:
//!
//! ```text
//! { "likedSongs": [ { "id": "...", "title": "...", ... }, ... ] }
//! ```
//!
//! Reads never fail from the caller's point of view: a missing, unreadable or
//! corrupt file is an empty collection, and individual malformed records are
//! skipped. Writes go to a temp file that is renamed over the snapshot so a
//! reader never sees a half-written document.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::model::{MediaItem, dedup_by_id};

/// Key of the collection inside the snapshot document
pub const LIKED_SONGS_KEY: &str = "likedSongs";

/// Local store errors
#[derive(Debug, Clone)]
pub enum LocalStoreError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for LocalStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocalStoreError::Io(e) => write!(f, "Local store IO error: {}", e),
            LocalStoreError::Parse(e) => write!(f, "Local store parse error: {}", e),
        }
    }
}

impl std::error::Error for LocalStoreError {}

/// File-backed snapshot of the liked collection
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last written snapshot, or an empty list if there is none or it can't be read
    pub fn load_all(&self) -> Vec<MediaItem> {
        match self.try_load() {
            Ok(items) => items,
            Err(e) => {
                warn!("Ignoring local liked songs snapshot {:?}: {}", self.path, e);
                Vec::new()
            }
        }
    }

    /// Replace the stored snapshot; failures are logged and dropped
    pub fn save_all(&self, items: &[MediaItem]) {
        if let Err(e) = self.try_save(items) {
            error!("Failed to save liked songs to {:?}: {}", self.path, e);
        }
    }

    /// Remove the stored snapshot entirely
    pub fn clear(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            match e.kind() {
                io::ErrorKind::NotFound => (),
                _ => error!("Failed to remove liked songs snapshot {:?}: {}", self.path, e),
            }
        }
    }

    fn try_load(&self) -> Result<Vec<MediaItem>, LocalStoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LocalStoreError::Io(e.to_string())),
        };

        let document: Value =
            serde_json::from_str(&content).map_err(|e| LocalStoreError::Parse(e.to_string()))?;

        let records = match document.get(LIKED_SONGS_KEY) {
            Some(Value::Array(records)) => records,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(other) => {
                return Err(LocalStoreError::Parse(format!(
                    "'{}' is not an array: {}",
                    LIKED_SONGS_KEY, other
                )));
            }
        };

        let items = records
            .iter()
            .filter_map(
                |record| match serde_json::from_value::<MediaItem>(record.clone()) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        warn!("Skipping malformed liked song record: {}", e);
                        None
                    }
                },
            )
            .collect();

        Ok(dedup_by_id(items))
    }

    fn try_save(&self, items: &[MediaItem]) -> Result<(), LocalStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| LocalStoreError::Io(e.to_string()))?;
        }

        let records =
            serde_json::to_value(items).map_err(|e| LocalStoreError::Parse(e.to_string()))?;
        let mut document = Map::new();
        document.insert(LIKED_SONGS_KEY.to_string(), records);
        let content = serde_json::to_string_pretty(&Value::Object(document))
            .map_err(|e| LocalStoreError::Parse(e.to_string()))?;

        let temp_path = self.path.with_extension("json.tmp");
        if let Err(e) = fs::write(&temp_path, content) {
            let _ = fs::remove_file(&temp_path);
            return Err(LocalStoreError::Io(e.to_string()));
        }
        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(LocalStoreError::Io(e.to_string()));
        }

        debug!("Saved {} liked songs to {:?}", items.len(), self.path);
        Ok(())
    }
}
