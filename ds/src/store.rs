//! Core DocStore implementation

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Unique identifier for a document
pub type DocId = String;

/// Errors that can occur talking to the store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {id}")]
    NotFound { id: DocId },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid document id: {id}")]
    InvalidId { id: DocId },
}

/// The document store
pub struct DocStore {
    /// Base path for storage
    base_path: PathBuf,
}

impl DocStore {
    /// Open or create a document store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        debug!(?base_path, "Opened document store");
        Ok(Self { base_path })
    }

    /// Read the latest version of a document
    pub fn get(&self, id: &str) -> Result<Value, StoreError> {
        let path = self.doc_path(id)?;
        if !path.exists() {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        let content = fs::read_to_string(&path)?;
        let doc = serde_json::from_str(&content)?;
        debug!(%id, bytes = content.len(), "Read document");
        Ok(doc)
    }

    /// Overwrite a document, creating it if absent
    ///
    /// Writes go through a temp file followed by a rename so a crash
    /// mid-write never leaves a truncated document behind.
    pub fn put(&self, id: &str, doc: &Value) -> Result<(), StoreError> {
        let path = self.doc_path(id)?;
        let tmp_path = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(doc)?;
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, &path)?;

        debug!(%id, bytes = content.len(), "Wrote document");
        Ok(())
    }

    /// Create a document with an initial value if it does not already exist
    ///
    /// Returns the document id either way. The id is derived from `name`,
    /// so a restarted process resolving the same name finds the same
    /// document.
    pub fn create(&self, name: &str, initial: &Value) -> Result<DocId, StoreError> {
        let id = name.to_string();
        let path = self.doc_path(&id)?;
        if path.exists() {
            debug!(%id, "Document already exists, returning existing id");
            return Ok(id);
        }
        self.put(&id, initial)?;
        debug!(%id, "Created document");
        Ok(id)
    }

    /// Check whether a document exists
    pub fn exists(&self, id: &str) -> bool {
        self.doc_path(id).map(|p| p.exists()).unwrap_or(false)
    }

    /// Resolve a document id to its file path, rejecting ids that would
    /// escape the store directory
    fn doc_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
        if !valid || id.contains("..") {
            return Err(StoreError::InvalidId { id: id.to_string() });
        }
        Ok(self.base_path.join(format!("{}.json", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, DocStore) {
        let dir = TempDir::new().unwrap();
        let store = DocStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_put_and_get_roundtrip() {
        let (_dir, store) = open_store();

        let doc = json!({ "active": true, "run-count": 3 });
        store.put("schedule", &doc).unwrap();

        let loaded = store.get("schedule").unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let (_dir, store) = open_store();

        match store.get("nope") {
            Err(StoreError::NotFound { id }) => assert_eq!(id, "nope"),
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_create_is_lazy() {
        let (_dir, store) = open_store();

        let id = store.create("schedule", &json!({ "active": false })).unwrap();
        assert_eq!(id, "schedule");
        assert!(store.exists(&id));

        // A second create with different initial content must not clobber
        store.put(&id, &json!({ "active": true })).unwrap();
        let same_id = store.create("schedule", &json!({ "active": false })).unwrap();
        assert_eq!(same_id, id);
        assert_eq!(store.get(&id).unwrap()["active"], json!(true));
    }

    #[test]
    fn test_overwrite_replaces_document() {
        let (_dir, store) = open_store();

        store.put("doc", &json!({ "v": 1 })).unwrap();
        store.put("doc", &json!({ "v": 2 })).unwrap();

        assert_eq!(store.get("doc").unwrap()["v"], json!(2));
    }

    #[test]
    fn test_invalid_ids_rejected() {
        let (_dir, store) = open_store();

        assert!(matches!(store.get(""), Err(StoreError::InvalidId { .. })));
        assert!(matches!(
            store.put("../escape", &json!({})),
            Err(StoreError::InvalidId { .. })
        ));
        assert!(matches!(
            store.get("a/b"),
            Err(StoreError::InvalidId { .. })
        ));
    }

    #[test]
    fn test_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = DocStore::open(dir.path()).unwrap();
            store.put("doc", &json!({ "kept": true })).unwrap();
        }
        let store = DocStore::open(dir.path()).unwrap();
        assert_eq!(store.get("doc").unwrap()["kept"], json!(true));
    }
}
