//! Versioned objects stored as GitHub issues.
//!
//! Each object lives on one issue: labels identify it, the body holds the
//! snapshot written at creation and the comments form an append-only log
//! of updates. Versions are derived from the length of that log.

mod client;
pub mod identity;
pub mod payload;
mod types;


pub use client::StoreClient;
pub use identity::LabelCodec;
pub use types::{EntryType, HistoryEntry, ObjectMeta, StoredObject, UpdateMeta};
