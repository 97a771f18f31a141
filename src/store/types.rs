use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata derived from the backing issue, never supplied by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
  pub object_id: String,
  /// The ID label of the backing issue
  pub label: String,
  pub issue_number: u64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  /// Number of updates on the event log plus one, computed at read time
  pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
  pub meta: ObjectMeta,
  pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
  InitialState,
  Update,
}

impl EntryType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::InitialState => "initial_state",
      Self::Update => "update",
    }
  }

  /// Unknown type names are treated as updates.
  pub fn parse(s: &str) -> Self {
    match s {
      "initial_state" => Self::InitialState,
      _ => Self::Update,
    }
  }
}

/// Metadata block of an update comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMeta {
  pub client_version: String,
  pub timestamp: String,
  pub update_mode: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub issue_number: Option<u64>,
}

/// One decoded comment of an object's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub comment_id: u64,
  /// When the comment was posted
  pub timestamp: DateTime<Utc>,
  #[serde(rename = "type")]
  pub kind: EntryType,
  pub data: Value,
  pub metadata: UpdateMeta,
}
