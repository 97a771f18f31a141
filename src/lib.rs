//! A versioned object store backed by GitHub issues.
//!
//! Objects are JSON documents keyed by a string ID. Each one lives on a
//! single issue; the issue body is the last reconciled snapshot and the
//! comments are the update log. An external reconciler folds pending
//! updates into the body and closes the issue.

pub mod cache;
pub mod config;
pub mod error;
pub mod github;
pub mod snapshot;
pub mod store;

pub use config::Config;
pub use error::{Result, StoreError};
pub use snapshot::Snapshot;
pub use store::{HistoryEntry, ObjectMeta, StoreClient, StoredObject};
