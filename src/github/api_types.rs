//! Serde types matching GitHub issue API requests and responses.
//!
//! These are kept separate from the store's domain types so the wire shape
//! can be deserialized leniently without leaking into the public API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
  Open,
  Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiLabel {
  pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiIssue {
  pub number: u64,
  #[serde(default)]
  pub title: String,
  pub body: Option<String>,
  pub state: IssueState,
  #[serde(default)]
  pub labels: Vec<ApiLabel>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  /// Number of comments on the issue, as reported by the server
  #[serde(default)]
  pub comments: u64,
}

impl ApiIssue {
  pub fn label_names(&self) -> impl Iterator<Item = &str> {
    self.labels.iter().map(|l| l.name.as_str())
  }

  pub fn has_label(&self, name: &str) -> bool {
    self.label_names().any(|l| l == name)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiComment {
  pub id: u64,
  #[serde(default)]
  pub body: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Body of `POST /repos/{repo}/issues`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
  pub title: String,
  pub body: String,
  pub labels: Vec<String>,
}

/// Body of `PATCH /repos/{repo}/issues/{n}`
#[derive(Debug, Serialize)]
pub struct IssueStatePatch {
  pub state: IssueState,
}

/// Body of `POST /repos/{repo}/issues/{n}/comments`
#[derive(Debug, Serialize)]
pub struct NewComment<'a> {
  pub body: &'a str,
}

/// Body of `POST /repos/{repo}/issues/comments/{id}/reactions`
#[derive(Debug, Serialize)]
pub struct NewReaction<'a> {
  pub content: &'a str,
}

/// Error document GitHub returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub message: String,
}
