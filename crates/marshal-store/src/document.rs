//! File-backed JSON document store.
//!
//! Each store owns one JSON file holding a list of records. The file is
//! read once at startup and rewritten synchronously on every mutation, so
//! a crash loses at most the in-flight update. Writes go to a `.tmp`
//! sibling first and are renamed over the target, which keeps the document
//! intact if the process dies mid-write.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use marshal_core::error::{MarshalError, Result};

/// A JSON list-of-records document at a fixed path.
pub struct DocumentStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> DocumentStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Bind a store to `path`. The file is not created until the first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records. A missing file is an empty store; a corrupt file
    /// logs a warning and also reads as empty rather than failing startup.
    /// Only unexpected I/O failures propagate.
    pub fn load(&self) -> Result<Vec<T>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MarshalError::Storage(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        match serde_json::from_str(&content) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!("Corrupt document at {}: {}", self.path.display(), e);
                Ok(Vec::new())
            }
        }
    }

    /// Persist all records, replacing the previous document.
    pub fn save(&self, records: &[T]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(records)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            MarshalError::Storage(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        count: u32,
    }

    fn store_in(dir: &tempfile::TempDir) -> DocumentStore<Record> {
        DocumentStore::new(dir.path().join("records.json"))
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let records = vec![
            Record {
                name: "a".to_string(),
                count: 1,
            },
            Record {
                name: "b".to_string(),
                count: 2,
            },
        ];
        store.save(&records).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_save_replaces_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store
            .save(&[Record {
                name: "old".to_string(),
                count: 1,
            }])
            .unwrap();
        store
            .save(&[Record {
                name: "new".to_string(),
                count: 2,
            }])
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "new");
    }

    #[test]
    fn test_corrupt_file_loads_empty_and_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load().unwrap().is_empty());

        // Next save round-trips cleanly.
        store
            .save(&[Record {
                name: "fresh".to_string(),
                count: 7,
            }])
            .unwrap();
        assert_eq!(store.load().unwrap()[0].count, 7);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store: DocumentStore<Record> =
            DocumentStore::new(dir.path().join("nested/deeper/records.json"));
        store.save(&[]).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .save(&[Record {
                name: "x".to_string(),
                count: 0,
            }])
            .unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
