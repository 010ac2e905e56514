//! Bounded activity log
//!
//! An append-only document of timestamped, leveled events, capped at the
//! newest [`MAX_LOG_ENTRIES`]. The log is a diagnostic aid: every store
//! failure here is swallowed and traced so a pipeline run can never be
//! aborted by its own logging.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use eyre::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use docstore::DocStore;

/// Maximum entries retained; older entries are dropped FIFO
pub const MAX_LOG_ENTRIES: usize = 200;

/// Severity/category of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Ok,
    Err,
    Ai,
}

/// One timestamped event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LogDocument {
    #[serde(default)]
    entries: Vec<LogEntry>,
}

/// Handle to the persisted activity log document
#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<DocStore>,
    doc_id: String,
}

impl ActivityLog {
    /// Resolve the log document, lazily creating an empty log when absent
    pub fn open(store: Arc<DocStore>, doc_name: &str) -> Result<Self> {
        let initial = serde_json::to_value(LogDocument::default())?;
        let doc_id = store.create(doc_name, &initial)?;
        debug!(%doc_id, "Activity log resolved");
        Ok(Self { store, doc_id })
    }

    /// Append one entry stamped with the current UTC time
    pub fn append(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry {
            time: Utc::now(),
            level,
            message: message.into(),
        };

        let mut doc = self.read_document();
        doc.entries.push(entry);
        if doc.entries.len() > MAX_LOG_ENTRIES {
            let excess = doc.entries.len() - MAX_LOG_ENTRIES;
            doc.entries.drain(..excess);
        }
        self.write_document(&doc);
    }

    /// Newest `limit` entries, oldest first within that window
    pub fn read(&self, limit: usize) -> Vec<LogEntry> {
        let doc = self.read_document();
        let start = doc.entries.len().saturating_sub(limit);
        doc.entries[start..].to_vec()
    }

    /// Truncate the log to empty
    pub fn clear(&self) {
        self.write_document(&LogDocument::default());
    }

    fn read_document(&self) -> LogDocument {
        let doc = match self.store.get(&self.doc_id) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(doc_id = %self.doc_id, error = %e, "Failed to read activity log");
                return LogDocument::default();
            }
        };
        serde_json::from_value(doc).unwrap_or_else(|e| {
            warn!(doc_id = %self.doc_id, error = %e, "Malformed activity log document");
            LogDocument::default()
        })
    }

    fn write_document(&self, doc: &LogDocument) {
        let value = match serde_json::to_value(doc) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to serialize activity log");
                return;
            }
        };
        if let Err(e) = self.store.put(&self.doc_id, &value) {
            warn!(doc_id = %self.doc_id, error = %e, "Failed to write activity log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_log() -> (TempDir, ActivityLog) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DocStore::open(dir.path()).unwrap());
        let log = ActivityLog::open(store, "activity").unwrap();
        (dir, log)
    }

    #[test]
    fn test_append_and_read_preserve_order() {
        let (_dir, log) = open_log();

        log.append(LogLevel::Info, "first");
        log.append(LogLevel::Ok, "second");
        log.append(LogLevel::Err, "third");

        let entries = log.read(10);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[2].message, "third");
        assert_eq!(entries[1].level, LogLevel::Ok);
    }

    #[test]
    fn test_read_limit_returns_newest_window() {
        let (_dir, log) = open_log();

        for i in 0..5 {
            log.append(LogLevel::Info, format!("entry {i}"));
        }

        let entries = log.read(2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "entry 3");
        assert_eq!(entries[1].message, "entry 4");
    }

    #[test]
    fn test_cap_drops_oldest_first() {
        let (_dir, log) = open_log();

        for i in 0..MAX_LOG_ENTRIES + 25 {
            log.append(LogLevel::Info, format!("entry {i}"));
        }

        let entries = log.read(MAX_LOG_ENTRIES + 25);
        assert_eq!(entries.len(), MAX_LOG_ENTRIES);
        assert_eq!(entries[0].message, "entry 25");
        assert_eq!(
            entries.last().unwrap().message,
            format!("entry {}", MAX_LOG_ENTRIES + 24)
        );
    }

    #[test]
    fn test_clear_truncates() {
        let (_dir, log) = open_log();

        log.append(LogLevel::Ai, "analysis done");
        log.clear();

        assert!(log.read(10).is_empty());
    }

    #[test]
    fn test_malformed_document_degrades_to_empty() {
        let (dir, log) = open_log();

        let raw = Arc::new(DocStore::open(dir.path()).unwrap());
        raw.put("activity", &serde_json::json!({ "entries": "oops" })).unwrap();

        assert!(log.read(10).is_empty());

        // Appending recovers the document
        log.append(LogLevel::Info, "fresh start");
        assert_eq!(log.read(10).len(), 1);
    }
}
