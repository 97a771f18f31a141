//! The seam between the store and the issue tracker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::api_types::{ApiComment, ApiIssue, IssueState, NewIssue};
use crate::error::Result;

/// Issue state filter for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFilter {
  Open,
  Closed,
  All,
}

impl StateFilter {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Open => "open",
      Self::Closed => "closed",
      Self::All => "all",
    }
  }

  pub fn matches(&self, state: IssueState) -> bool {
    match self {
      Self::Open => state == IssueState::Open,
      Self::Closed => state == IssueState::Closed,
      Self::All => true,
    }
  }
}

/// Filters for listing issues. An issue matches when it carries every label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueQuery {
  pub labels: Vec<String>,
  pub state: StateFilter,
  /// Only issues updated at or after this time
  pub since: Option<DateTime<Utc>>,
}

impl IssueQuery {
  pub fn new(labels: Vec<String>, state: StateFilter) -> Self {
    Self {
      labels,
      state,
      since: None,
    }
  }

  pub fn since(mut self, since: DateTime<Utc>) -> Self {
    self.since = Some(since);
    self
  }
}

/// Position in a paged listing. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub page: u32,
  pub per_page: u32,
}

impl PageRequest {
  pub fn first(per_page: u32) -> Self {
    Self { page: 1, per_page }
  }

  pub fn next(&self) -> Self {
    Self {
      page: self.page + 1,
      per_page: self.per_page,
    }
  }
}

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
  pub items: Vec<T>,
  /// The request that produced this page
  pub request: PageRequest,
  /// Where to continue, if the server reported more results
  pub next: Option<PageRequest>,
}

/// REST operations the store needs from an issue tracker.
#[async_trait]
pub trait IssueTransport: Send + Sync {
  /// Whether a write credential is configured.
  fn is_authenticated(&self) -> bool;

  async fn create_issue(&self, issue: &NewIssue) -> Result<ApiIssue>;

  async fn get_issue(&self, number: u64) -> Result<ApiIssue>;

  async fn list_issues(&self, query: &IssueQuery, page: PageRequest) -> Result<Page<ApiIssue>>;

  async fn set_issue_state(&self, number: u64, state: IssueState) -> Result<ApiIssue>;

  async fn create_comment(&self, number: u64, body: &str) -> Result<ApiComment>;

  async fn list_comments(&self, number: u64, page: PageRequest) -> Result<Page<ApiComment>>;

  async fn create_reaction(&self, comment_id: u64, content: &str) -> Result<()>;
}
