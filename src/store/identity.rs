//! Mapping between object IDs and the labels that identify backing issues.

use tracing::warn;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::github::ApiIssue;

/// Label applied to archived objects; listings skip them.
pub const ARCHIVED_LABEL: &str = "archived";

#[derive(Debug, Clone)]
pub struct LabelCodec {
  store_label: String,
  base_label: String,
  uid_prefix: String,
  allow_base_label_match: bool,
}

impl LabelCodec {
  pub fn new(config: &StoreConfig) -> Self {
    Self {
      store_label: config.store_label.clone(),
      base_label: config.base_label.clone(),
      uid_prefix: config.uid_prefix.clone(),
      allow_base_label_match: config.identity.allow_base_label_match,
    }
  }

  pub fn store_label(&self) -> &str {
    &self.store_label
  }

  pub fn base_label(&self) -> &str {
    &self.base_label
  }

  pub fn id_label(&self, object_id: &str) -> String {
    format!("{}{}", self.uid_prefix, object_id)
  }

  pub fn title(&self, object_id: &str) -> String {
    format!("Stored Object: {}", object_id)
  }

  /// Labels attached to a new backing issue.
  pub fn creation_labels(&self, object_id: &str, extra: &[String]) -> Vec<String> {
    let mut labels = self.query_labels(object_id);
    for label in extra {
      if !labels.contains(label) {
        labels.push(label.clone());
      }
    }
    labels
  }

  /// Labels that select exactly the backing issue of `object_id`.
  pub fn query_labels(&self, object_id: &str) -> Vec<String> {
    vec![
      self.store_label.clone(),
      self.base_label.clone(),
      self.id_label(object_id),
    ]
  }

  /// Whether `issue` is the backing issue of `object_id`.
  ///
  /// Requires the ID label unless legacy matching is enabled, in which case
  /// the base label alone is enough.
  pub fn verify(&self, issue: &ApiIssue, object_id: &str) -> bool {
    let id_label = self.id_label(object_id);
    issue.label_names().any(|label| {
      label == id_label || (self.allow_base_label_match && label == self.base_label)
    })
  }

  pub fn check(&self, issue: &ApiIssue, object_id: &str) -> Result<()> {
    if self.verify(issue, object_id) {
      Ok(())
    } else {
      Err(StoreError::IdentityMismatch {
        id: object_id.to_string(),
        issue_number: issue.number,
      })
    }
  }

  /// Recover the object ID from an issue's ID label.
  pub fn id_from_labels(&self, issue: &ApiIssue) -> Result<String> {
    let mut ids = issue
      .label_names()
      .filter(|label| *label != self.base_label)
      .filter_map(|label| label.strip_prefix(self.uid_prefix.as_str()));

    let id = ids.next().ok_or_else(|| StoreError::not_found(format!("issue #{}", issue.number)))?;
    if ids.next().is_some() {
      warn!(issue_number = issue.number, "issue carries more than one ID label");
    }
    Ok(id.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::github::{ApiLabel, IssueState};
  use chrono::Utc;

  fn issue(labels: &[&str]) -> ApiIssue {
    ApiIssue {
      number: 7,
      title: String::new(),
      body: None,
      state: IssueState::Closed,
      labels: labels
        .iter()
        .map(|l| ApiLabel {
          name: l.to_string(),
        })
        .collect(),
      created_at: Utc::now(),
      updated_at: Utc::now(),
      comments: 0,
    }
  }

  fn codec(allow_base_label_match: bool) -> LabelCodec {
    let mut config = StoreConfig::default();
    config.identity.allow_base_label_match = allow_base_label_match;
    LabelCodec::new(&config)
  }

  #[test]
  fn test_labels() {
    let codec = codec(false);
    assert_eq!(codec.id_label("paper:42"), "UID:paper:42");
    assert_eq!(
      codec.creation_labels("paper:42", &["TODO:hydrate-metadata".to_string(), "gh-store".to_string()]),
      vec!["gh-store", "stored-object", "UID:paper:42", "TODO:hydrate-metadata"]
    );
    assert_eq!(codec.title("paper:42"), "Stored Object: paper:42");
  }

  #[test]
  fn test_verify_strict() {
    let codec = codec(false);
    assert!(codec.verify(&issue(&["stored-object", "UID:paper:42"]), "paper:42"));
    assert!(!codec.verify(&issue(&["stored-object", "UID:paper:1"]), "paper:42"));
    assert!(!codec.verify(&issue(&["stored-object"]), "paper:42"));
  }

  #[test]
  fn test_verify_legacy_accepts_base_label() {
    let codec = codec(true);
    assert!(codec.verify(&issue(&["stored-object"]), "paper:42"));
    assert!(!codec.verify(&issue(&["gh-store"]), "paper:42"));
  }

  #[test]
  fn test_check_reports_mismatch() {
    let err = codec(false)
      .check(&issue(&["UID:paper:1"]), "paper:42")
      .unwrap_err();
    assert!(matches!(err, StoreError::IdentityMismatch { issue_number: 7, .. }));
  }

  #[test]
  fn test_id_from_labels() {
    let codec = codec(false);
    let id = codec
      .id_from_labels(&issue(&["gh-store", "stored-object", "UID:paper:42"]))
      .unwrap();
    assert_eq!(id, "paper:42");

    let err = codec.id_from_labels(&issue(&["gh-store", "stored-object"])).unwrap_err();
    assert!(err.is_not_found());
  }
}
