//! Point-in-time export of every object in a store.
//!
//! The export is a single JSON document that read-only consumers load
//! instead of querying the tracker. It can be refreshed incrementally by
//! merging in objects updated after the previous snapshot time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::github::IssueTransport;
use crate::store::{StoreClient, StoredObject};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
  pub snapshot_time: DateTime<Utc>,
  pub repository: String,
  pub objects: BTreeMap<String, StoredObject>,
}

impl Snapshot {
  /// Export every canonical object in the store.
  pub async fn capture<T: IssueTransport>(store: &StoreClient<T>, repository: &str) -> Result<Self> {
    Self::capture_at(store, repository, Utc::now()).await
  }

  async fn capture_at<T: IssueTransport>(
    store: &StoreClient<T>,
    repository: &str,
    now: DateTime<Utc>,
  ) -> Result<Self> {
    let objects = store.list_all().await?;
    info!(count = objects.len(), repository, "captured snapshot");
    Ok(Self {
      snapshot_time: now,
      repository: repository.to_string(),
      objects,
    })
  }

  /// Merge in objects updated since the snapshot was taken. Returns how
  /// many objects changed.
  pub async fn refresh<T: IssueTransport>(&mut self, store: &StoreClient<T>) -> Result<usize> {
    self.refresh_at(store, Utc::now()).await
  }

  async fn refresh_at<T: IssueTransport>(
    &mut self,
    store: &StoreClient<T>,
    now: DateTime<Utc>,
  ) -> Result<usize> {
    let updated = store.list_updated_since(self.snapshot_time).await?;
    let count = updated.len();
    self.objects.extend(updated);
    self.snapshot_time = now;
    info!(count, repository = %self.repository, "refreshed snapshot");
    Ok(count)
  }

  pub fn load(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
  }

  pub fn save(&self, path: &Path) -> Result<()> {
    let contents = serde_json::to_string_pretty(self)?;
    std::fs::write(path, contents)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::StoreConfig;
  use crate::github::MemoryTransport;
  use pretty_assertions::assert_eq;
  use serde_json::json;

  fn store() -> StoreClient<MemoryTransport> {
    StoreClient::new(MemoryTransport::new(true), &StoreConfig::default()).unwrap()
  }

  #[tokio::test]
  async fn test_capture_and_round_trip_through_file() {
    let store = store();
    store
      .create_object("paper:1", &json!({"title": "X"}), &[])
      .await
      .unwrap();

    let snapshot = Snapshot::capture(&store, "owner/papers").await.unwrap();
    assert_eq!(snapshot.objects.len(), 1);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gh-store-snapshot.json");
    snapshot.save(&path).unwrap();

    let raw: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["repository"], "owner/papers");
    assert_eq!(raw["objects"]["paper:1"]["data"], json!({"title": "X"}));
    assert_eq!(raw["objects"]["paper:1"]["meta"]["objectId"], "paper:1");
    assert_eq!(raw["objects"]["paper:1"]["meta"]["version"], 1);

    assert_eq!(Snapshot::load(&path).unwrap(), snapshot);
  }

  #[tokio::test]
  async fn test_refresh_merges_updated_objects() {
    let store = store();
    store.create_object("paper:1", &json!({"n": 1}), &[]).await.unwrap();
    store.create_object("paper:2", &json!({"n": 2}), &[]).await.unwrap();

    let taken_at = store.transport().now();
    let mut snapshot = Snapshot::capture_at(&store, "owner/papers", taken_at).await.unwrap();

    store.update_object("paper:2", &json!({"n": 20})).await.unwrap();
    store.transport().reconcile(2).unwrap();
    store.create_object("paper:3", &json!({"n": 3}), &[]).await.unwrap();

    let now = store.transport().now();
    let changed = snapshot.refresh_at(&store, now).await.unwrap();
    assert_eq!(changed, 2);
    assert_eq!(snapshot.snapshot_time, now);
    assert_eq!(snapshot.objects.len(), 3);
    assert_eq!(snapshot.objects["paper:2"].data, json!({"n": 20}));
    assert_eq!(snapshot.objects["paper:2"].meta.version, 2);
    assert_eq!(snapshot.objects["paper:1"].data, json!({"n": 1}));
  }

  #[test]
  fn test_load_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Snapshot::load(&dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, crate::error::StoreError::Io(_)));
  }
}
