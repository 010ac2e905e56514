//! DocStore - file-backed opaque JSON document store
//!
//! Stores structured documents as individual JSON files under a base
//! directory. Documents are addressed by opaque string identifiers and the
//! store performs no schema validation: callers read and write
//! `serde_json::Value` records and own their own shapes.
//!
//! # Architecture
//!
//! ```text
//! .docstore/
//! ├── schedule.json        # one file per document id
//! └── activity.json
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docstore::DocStore;
//!
//! let store = DocStore::open(".docstore")?;
//! let id = store.create("schedule", &serde_json::json!({ "active": false }))?;
//! let doc = store.get(&id)?;
//! ```

mod store;

pub use store::{DocId, DocStore, StoreError};
