//! Core Store implementation
//!
//! One JSON file per collection: `{schema_version, records: {id: record}}`.
//! Records written by older schema versions are normalized on load (missing
//! fields take their serde defaults) and the file is rewritten at the
//! current version.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::Record;

/// Current on-disk schema version
pub const SCHEMA_VERSION: u32 = 2;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported collection file {path}: {reason}")]
    Unsupported { path: String, reason: String },
}

#[derive(Serialize)]
struct SaveFile<'a, T> {
    schema_version: u32,
    records: &'a HashMap<String, T>,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
struct LoadFile<T> {
    #[serde(default = "first_version")]
    schema_version: u32,
    #[serde(default)]
    records: HashMap<String, T>,
}

fn first_version() -> u32 {
    1
}

/// Whole-state JSON collection store
pub struct Store {
    /// Base path for collection files
    base_path: PathBuf,
}

impl Store {
    /// Open or create a store at the given directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        debug!(?base_path, "Opened store");
        Ok(Self { base_path })
    }

    /// Base directory of the store
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    fn collection_path<T: Record>(&self) -> PathBuf {
        self.base_path.join(format!("{}.json", T::collection_name()))
    }

    /// Load a full collection, keyed by record id
    ///
    /// A missing file yields an empty collection. Files written at an older
    /// schema version are rewritten at the current version after their
    /// records have been normalized through deserialization defaults.
    pub fn load_collection<T: Record>(&self) -> Result<HashMap<String, T>, StoreError> {
        let path = self.collection_path::<T>();
        debug!(path = %path.display(), "load_collection: called");

        if !path.exists() {
            debug!(collection = T::collection_name(), "load_collection: no file, empty collection");
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(&path)?;
        let file: LoadFile<T> = serde_json::from_str(&content)?;

        if file.schema_version > SCHEMA_VERSION {
            return Err(StoreError::Unsupported {
                path: path.display().to_string(),
                reason: format!(
                    "schema version {} is newer than supported version {}",
                    file.schema_version, SCHEMA_VERSION
                ),
            });
        }

        if file.schema_version < SCHEMA_VERSION {
            info!(
                collection = T::collection_name(),
                from = file.schema_version,
                to = SCHEMA_VERSION,
                "Migrating collection to current schema version"
            );
            self.save_collection(&file.records)?;
        }

        debug!(
            collection = T::collection_name(),
            count = file.records.len(),
            "load_collection: loaded"
        );
        Ok(file.records)
    }

    /// Save a full collection, replacing the previous file contents
    pub fn save_collection<T: Record>(&self, records: &HashMap<String, T>) -> Result<(), StoreError> {
        let path = self.collection_path::<T>();
        debug!(path = %path.display(), count = records.len(), "save_collection: called");

        let file = SaveFile {
            schema_version: SCHEMA_VERSION,
            records,
        };
        let json = serde_json::to_string_pretty(&file)?;

        // Write via a sibling temp file so a crash mid-write never leaves a
        // truncated collection behind.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            warn!(error = %e, path = %path.display(), "save_collection: rename failed");
            return Err(StoreError::Io(e));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: String,
        name: String,
        #[serde(default)]
        weight: u32,
        updated_at: i64,
    }

    impl Record for Widget {
        fn id(&self) -> &str {
            &self.id
        }

        fn updated_at(&self) -> i64 {
            self.updated_at
        }

        fn collection_name() -> &'static str {
            "widgets"
        }
    }

    fn widget(id: &str, name: &str) -> Widget {
        Widget {
            id: id.to_string(),
            name: name.to_string(),
            weight: 7,
            updated_at: crate::now_ms(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_collection() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let loaded: HashMap<String, Widget> = store.load_collection().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let mut records = HashMap::new();
        records.insert("w-1".to_string(), widget("w-1", "first"));
        records.insert("w-2".to_string(), widget("w-2", "second"));

        store.save_collection(&records).unwrap();
        let loaded: HashMap<String, Widget> = store.load_collection().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("w-1"), records.get("w-1"));
        assert_eq!(loaded.get("w-2"), records.get("w-2"));
    }

    #[test]
    fn test_old_schema_version_is_migrated_on_load() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();

        // Hand-written v1 file: records lack the `weight` field entirely.
        let v1 = r#"{
            "schema_version": 1,
            "records": {
                "w-1": { "id": "w-1", "name": "legacy", "updated_at": 1 }
            }
        }"#;
        fs::write(temp.path().join("widgets.json"), v1).unwrap();

        let loaded: HashMap<String, Widget> = store.load_collection().unwrap();
        assert_eq!(loaded.get("w-1").map(|w| w.weight), Some(0));

        // The file was rewritten at the current schema version.
        let content = fs::read_to_string(temp.path().join("widgets.json")).unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(reparsed["schema_version"], SCHEMA_VERSION);
        assert_eq!(reparsed["records"]["w-1"]["weight"], 0);
    }

    #[test]
    fn test_newer_schema_version_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let future = format!(r#"{{ "schema_version": {}, "records": {{}} }}"#, SCHEMA_VERSION + 1);
        fs::write(temp.path().join("widgets.json"), future).unwrap();

        let result: Result<HashMap<String, Widget>, _> = store.load_collection();
        assert!(matches!(result, Err(StoreError::Unsupported { .. })));
    }

    #[test]
    fn test_save_replaces_previous_contents() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let mut records = HashMap::new();
        records.insert("w-1".to_string(), widget("w-1", "first"));
        store.save_collection(&records).unwrap();

        records.clear();
        records.insert("w-2".to_string(), widget("w-2", "second"));
        store.save_collection(&records).unwrap();

        let loaded: HashMap<String, Widget> = store.load_collection().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("w-2"));
    }
}
