//! In-memory issue tracker implementing [`IssueTransport`].
//!
//! Follows the GitHub semantics the store relies on: label filters are
//! conjunctive, `since` includes the boundary, listings are newest first
//! and comments keep creation order. Time is a deterministic counter that
//! advances one second per mutation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::api_types::{ApiComment, ApiIssue, ApiLabel, IssueState, NewIssue};
use super::transport::{IssueQuery, IssueTransport, Page, PageRequest};
use crate::error::{Result, StoreError};

/// Recorded calls, for asserting round trips.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
  pub get_issue: usize,
  pub list_issues: usize,
  pub list_comments: usize,
  pub create_comment: usize,
}

struct State {
  issues: Vec<ApiIssue>,
  comments: HashMap<u64, Vec<ApiComment>>,
  reactions: Vec<(u64, String)>,
  next_comment_id: u64,
  now: DateTime<Utc>,
  calls: CallCounts,
  fail_reactions: bool,
}

impl State {
  fn tick(&mut self) -> DateTime<Utc> {
    self.now += Duration::seconds(1);
    self.now
  }

  fn issue_mut(&mut self, number: u64) -> Result<&mut ApiIssue> {
    self
      .issues
      .iter_mut()
      .find(|i| i.number == number)
      .ok_or_else(not_found_status)
  }
}

fn not_found_status() -> StoreError {
  StoreError::Transport {
    status: 404,
    message: "Not Found".to_string(),
  }
}

pub struct MemoryTransport {
  state: Mutex<State>,
  authenticated: bool,
}

impl MemoryTransport {
  pub fn new(authenticated: bool) -> Self {
    Self {
      state: Mutex::new(State {
        issues: Vec::new(),
        comments: HashMap::new(),
        reactions: Vec::new(),
        next_comment_id: 1000,
        // 2025-01-01T00:00:00Z
        now: DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default(),
        calls: CallCounts::default(),
        fail_reactions: false,
      }),
      authenticated,
    }
  }

  fn state(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Current value of the deterministic clock.
  pub fn now(&self) -> DateTime<Utc> {
    self.state().now
  }

  /// Add an issue directly, bypassing the store.
  pub fn insert_issue(&self, title: &str, body: &str, labels: &[&str], state: IssueState) -> u64 {
    let mut s = self.state();
    let now = s.tick();
    let number = s.issues.len() as u64 + 1;
    s.issues.push(ApiIssue {
      number,
      title: title.to_string(),
      body: Some(body.to_string()),
      state,
      labels: labels
        .iter()
        .map(|l| ApiLabel {
          name: l.to_string(),
        })
        .collect(),
      created_at: now,
      updated_at: now,
      comments: 0,
    });
    number
  }

  /// Add a comment directly, bypassing the store.
  pub fn insert_comment(&self, number: u64, body: &str) -> u64 {
    let mut s = self.state();
    Self::push_comment(&mut s, number, body).map(|c| c.id).unwrap_or_default()
  }

  fn push_comment(s: &mut State, number: u64, body: &str) -> Result<ApiComment> {
    let now = s.tick();
    let id = s.next_comment_id;
    s.next_comment_id += 1;

    let issue = s.issue_mut(number)?;
    issue.comments += 1;
    issue.updated_at = now;

    let comment = ApiComment {
      id,
      body: Some(body.to_string()),
      created_at: now,
    };
    s.comments.entry(number).or_default().push(comment.clone());
    Ok(comment)
  }

  pub fn issue(&self, number: u64) -> Option<ApiIssue> {
    self.state().issues.iter().find(|i| i.number == number).cloned()
  }

  pub fn issue_count(&self) -> usize {
    self.state().issues.len()
  }

  pub fn reactions(&self) -> Vec<(u64, String)> {
    self.state().reactions.clone()
  }

  pub fn calls(&self) -> CallCounts {
    self.state().calls.clone()
  }

  pub fn fail_reactions(&self, fail: bool) {
    self.state().fail_reactions = fail;
  }

  /// Stand-in for the external reconciler: copy the newest update's data
  /// into the issue body and close the issue.
  pub fn reconcile(&self, number: u64) -> Result<()> {
    let mut s = self.state();
    let latest = s
      .comments
      .get(&number)
      .and_then(|comments| {
        comments.iter().rev().find_map(|c| {
          let value: serde_json::Value = serde_json::from_str(c.body.as_deref()?).ok()?;
          value.get("_data").cloned()
        })
      });

    let now = s.tick();
    let issue = s.issue_mut(number)?;
    if let Some(data) = latest {
      issue.body = Some(serde_json::to_string_pretty(&data)?);
    }
    issue.state = IssueState::Closed;
    issue.updated_at = now;
    Ok(())
  }
}

fn paged<T: Clone>(items: Vec<T>, request: PageRequest) -> Page<T> {
  let per_page = request.per_page.max(1) as usize;
  let start = (request.page.saturating_sub(1) as usize) * per_page;
  let end = (start + per_page).min(items.len());
  let slice = if start < items.len() {
    items[start..end].to_vec()
  } else {
    Vec::new()
  };
  Page {
    items: slice,
    request,
    next: (end < items.len()).then(|| request.next()),
  }
}

#[async_trait]
impl IssueTransport for MemoryTransport {
  fn is_authenticated(&self) -> bool {
    self.authenticated
  }

  async fn create_issue(&self, issue: &NewIssue) -> Result<ApiIssue> {
    let labels: Vec<&str> = issue.labels.iter().map(String::as_str).collect();
    let number = self.insert_issue(&issue.title, &issue.body, &labels, IssueState::Open);
    self.issue(number).ok_or_else(not_found_status)
  }

  async fn get_issue(&self, number: u64) -> Result<ApiIssue> {
    let mut s = self.state();
    s.calls.get_issue += 1;
    s.issues
      .iter()
      .find(|i| i.number == number)
      .cloned()
      .ok_or_else(not_found_status)
  }

  async fn list_issues(&self, query: &IssueQuery, page: PageRequest) -> Result<Page<ApiIssue>> {
    let mut s = self.state();
    s.calls.list_issues += 1;
    let matching: Vec<ApiIssue> = s
      .issues
      .iter()
      .rev()
      .filter(|i| query.state.matches(i.state))
      .filter(|i| query.labels.iter().all(|l| i.has_label(l)))
      .filter(|i| query.since.map_or(true, |since| i.updated_at >= since))
      .cloned()
      .collect();
    Ok(paged(matching, page))
  }

  async fn set_issue_state(&self, number: u64, state: IssueState) -> Result<ApiIssue> {
    let mut s = self.state();
    let now = s.tick();
    let issue = s.issue_mut(number)?;
    issue.state = state;
    issue.updated_at = now;
    Ok(issue.clone())
  }

  async fn create_comment(&self, number: u64, body: &str) -> Result<ApiComment> {
    let mut s = self.state();
    s.calls.create_comment += 1;
    Self::push_comment(&mut s, number, body)
  }

  async fn list_comments(&self, number: u64, page: PageRequest) -> Result<Page<ApiComment>> {
    let mut s = self.state();
    s.calls.list_comments += 1;
    s.issue_mut(number)?;
    let comments = s.comments.get(&number).cloned().unwrap_or_default();
    Ok(paged(comments, page))
  }

  async fn create_reaction(&self, comment_id: u64, content: &str) -> Result<()> {
    let mut s = self.state();
    if s.fail_reactions {
      return Err(StoreError::Transport {
        status: 500,
        message: "Server Error".to_string(),
      });
    }
    s.reactions.push((comment_id, content.to_string()));
    Ok(())
  }
}
