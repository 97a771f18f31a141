//! Encoding of issue bodies and event-log comments.
//!
//! Comment bodies come in three shapes, all of which decode:
//!
//! - the current envelope: `{"_data": .., "_meta": {..}, "type": ..}`
//! - a bare initial state: `{"type": "initial_state", "data": ..}`
//! - raw JSON with no envelope at all, written by early clients

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::types::{EntryType, UpdateMeta};
use crate::error::Result;

pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const UPDATE_MODE_APPEND: &str = "append";
const LEGACY_CLIENT_VERSION: &str = "legacy";

#[derive(Serialize)]
struct Envelope<'a> {
  #[serde(rename = "_data")]
  data: &'a Value,
  #[serde(rename = "_meta")]
  meta: UpdateMeta,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  kind: Option<EntryType>,
}

/// A comment body decoded into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedComment {
  pub kind: EntryType,
  pub data: Value,
  pub meta: UpdateMeta,
}

/// Issue body holding the creation-time snapshot.
pub fn encode_snapshot(data: &Value) -> Result<String> {
  Ok(serde_json::to_string_pretty(data)?)
}

pub fn decode_snapshot(body: &str) -> Result<Value> {
  Ok(serde_json::from_str(body)?)
}

pub fn encode_update_comment(
  data: &Value,
  issue_number: u64,
  kind: Option<EntryType>,
) -> Result<String> {
  encode_update_comment_at(data, issue_number, kind, Utc::now())
}

fn encode_update_comment_at(
  data: &Value,
  issue_number: u64,
  kind: Option<EntryType>,
  now: DateTime<Utc>,
) -> Result<String> {
  let envelope = Envelope {
    data,
    meta: UpdateMeta {
      client_version: CLIENT_VERSION.to_string(),
      timestamp: now.to_rfc3339(),
      update_mode: UPDATE_MODE_APPEND.to_string(),
      issue_number: Some(issue_number),
    },
    kind,
  };
  Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Decode a comment body posted at `posted_at`. Fails only when the body is
/// not valid JSON.
pub fn decode_history_entry(body: &str, posted_at: DateTime<Utc>) -> Result<DecodedComment> {
  let value: Value = serde_json::from_str(body)?;

  if let Value::Object(map) = &value {
    if map.contains_key("_data") {
      return Ok(decode_envelope(map, posted_at));
    }

    let is_initial_state = map.get("type").and_then(Value::as_str) == Some("initial_state");
    if is_initial_state {
      if let Some(data) = map.get("data") {
        return Ok(DecodedComment {
          kind: EntryType::InitialState,
          data: data.clone(),
          meta: meta_or_legacy(map.get("_meta"), posted_at),
        });
      }
    }
  }

  Ok(DecodedComment {
    kind: EntryType::Update,
    data: value,
    meta: legacy_meta(posted_at),
  })
}

fn decode_envelope(map: &Map<String, Value>, posted_at: DateTime<Utc>) -> DecodedComment {
  let kind = map
    .get("type")
    .and_then(Value::as_str)
    .map(EntryType::parse)
    .unwrap_or(EntryType::Update);

  DecodedComment {
    kind,
    data: map.get("_data").cloned().unwrap_or(Value::Null),
    meta: meta_or_legacy(map.get("_meta"), posted_at),
  }
}

fn meta_or_legacy(meta: Option<&Value>, posted_at: DateTime<Utc>) -> UpdateMeta {
  meta
    .and_then(|m| serde_json::from_value(m.clone()).ok())
    .unwrap_or_else(|| legacy_meta(posted_at))
}

fn legacy_meta(posted_at: DateTime<Utc>) -> UpdateMeta {
  UpdateMeta {
    client_version: LEGACY_CLIENT_VERSION.to_string(),
    timestamp: posted_at.to_rfc3339(),
    update_mode: UPDATE_MODE_APPEND.to_string(),
    issue_number: None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use pretty_assertions::assert_eq;
  use serde_json::json;

  fn posted() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
  }

  #[test]
  fn test_snapshot_is_pretty_json() {
    let body = encode_snapshot(&json!({"title": "X"})).unwrap();
    assert_eq!(body, "{\n  \"title\": \"X\"\n}");
    assert_eq!(decode_snapshot(&body).unwrap(), json!({"title": "X"}));
  }

  #[test]
  fn test_update_comment_envelope() {
    let body = encode_update_comment_at(&json!({"rating": "up"}), 42, None, posted()).unwrap();
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
      value,
      json!({
        "_data": {"rating": "up"},
        "_meta": {
          "client_version": CLIENT_VERSION,
          "timestamp": "2025-03-01T12:00:00+00:00",
          "update_mode": "append",
          "issue_number": 42
        }
      })
    );
  }

  #[test]
  fn test_initial_state_envelope_carries_type() {
    let body = encode_update_comment(&json!(1), 1, Some(EntryType::InitialState)).unwrap();
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["type"], "initial_state");

    let decoded = decode_history_entry(&body, posted()).unwrap();
    assert_eq!(decoded.kind, EntryType::InitialState);
    assert_eq!(decoded.data, json!(1));
    assert_eq!(decoded.meta.issue_number, Some(1));
  }

  #[test]
  fn test_decode_envelope_defaults_to_update() {
    let decoded = decode_history_entry(r#"{"_data": {"a": 1}}"#, posted()).unwrap();
    assert_eq!(decoded.kind, EntryType::Update);
    assert_eq!(decoded.data, json!({"a": 1}));
    assert_eq!(decoded.meta.client_version, "legacy");
  }

  #[test]
  fn test_decode_bare_initial_state() {
    let decoded =
      decode_history_entry(r#"{"type": "initial_state", "data": {"title": "X"}}"#, posted()).unwrap();
    assert_eq!(decoded.kind, EntryType::InitialState);
    assert_eq!(decoded.data, json!({"title": "X"}));
  }

  #[test]
  fn test_decode_raw_value() {
    let decoded = decode_history_entry(r#"{"title": "X", "type": "paper"}"#, posted()).unwrap();
    assert_eq!(decoded.kind, EntryType::Update);
    assert_eq!(decoded.data, json!({"title": "X", "type": "paper"}));
    assert_eq!(
      decoded.meta,
      UpdateMeta {
        client_version: "legacy".to_string(),
        timestamp: "2025-03-01T12:00:00+00:00".to_string(),
        update_mode: "append".to_string(),
        issue_number: None,
      }
    );

    let scalar = decode_history_entry("[1, 2]", posted()).unwrap();
    assert_eq!(scalar.data, json!([1, 2]));
  }

  #[test]
  fn test_decode_rejects_invalid_json() {
    assert!(decode_history_entry("thanks for the paper!", posted()).is_err());
  }
}
