//! Store client: objects as GitHub issues, updates as comments.

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::identity::{LabelCodec, ARCHIVED_LABEL};
use super::payload::{self, encode_snapshot, encode_update_comment};
use super::types::{EntryType, HistoryEntry, ObjectMeta, StoredObject};
use crate::cache::{CacheMetadata, CacheStats, IssueCache, MemoryCache, NoopCache};
use crate::config::{Config, ReactionsConfig, StoreConfig};
use crate::error::{Result, StoreError};
use crate::github::paging::{items, paginate};
use crate::github::{
  ApiComment, ApiIssue, GithubClient, IssueQuery, IssueState, IssueTransport, NewIssue,
  PageRequest, StateFilter,
};

const DEFAULT_PER_PAGE: u32 = 100;

/// Versioned object store backed by the issues of one repository.
///
/// Reads consult the cache for the issue number first and fall back to a
/// label query. Writes require a token; without one the store is public
/// and read-only.
///
/// After `update_object` the backing issue stays open until an external
/// reconciler processes the update and closes it. Label queries in
/// `get_object` only match closed issues, so during that window reads are
/// served through the cached issue number.
pub struct StoreClient<T = GithubClient> {
  transport: T,
  labels: LabelCodec,
  reactions: ReactionsConfig,
  cache: Mutex<Box<dyn IssueCache>>,
  per_page: u32,
  max_pages: Option<u32>,
}

impl StoreClient<GithubClient> {
  /// Create a store for the configured repository.
  pub fn from_config(config: &Config, token: Option<String>) -> Result<Self> {
    let transport = GithubClient::new(&config.github, token)?;
    Ok(
      Self::new(transport, &config.store)?
        .with_paging(config.github.per_page, config.github.max_pages),
    )
  }
}

impl<T: IssueTransport> StoreClient<T> {
  pub fn new(transport: T, config: &StoreConfig) -> Result<Self> {
    config.validate()?;

    let cache: Box<dyn IssueCache> = if config.cache.max_size == 0 {
      Box::new(NoopCache)
    } else {
      Box::new(MemoryCache::new(config.cache.max_size, config.cache.ttl()))
    };

    Ok(Self {
      transport,
      labels: LabelCodec::new(config),
      reactions: config.reactions.clone(),
      cache: Mutex::new(cache),
      per_page: DEFAULT_PER_PAGE,
      max_pages: None,
    })
  }

  /// Replace the issue cache.
  pub fn with_cache(self, cache: Box<dyn IssueCache>) -> Self {
    Self {
      cache: Mutex::new(cache),
      ..self
    }
  }

  pub fn with_paging(mut self, per_page: u32, max_pages: Option<u32>) -> Self {
    self.per_page = per_page.max(1);
    self.max_pages = max_pages;
    self
  }

  /// Raw access to the transport, for operations the store does not wrap.
  pub fn transport(&self) -> &T {
    &self.transport
  }

  pub fn is_public(&self) -> bool {
    !self.transport.is_authenticated()
  }

  pub fn cache_stats(&self) -> CacheStats {
    self.cache().stats()
  }

  /// Whether an observed `updated_at` is newer than what the cache holds.
  pub fn should_refresh(&self, object_id: &str, updated_at: DateTime<Utc>) -> bool {
    self.cache().should_refresh(object_id, updated_at)
  }

  fn cache(&self) -> MutexGuard<'_, Box<dyn IssueCache>> {
    self.cache.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn remember(&self, object_id: &str, issue: &ApiIssue) {
    self.cache().set(
      object_id,
      issue.number,
      CacheMetadata {
        created_at: issue.created_at,
        updated_at: issue.updated_at,
      },
    );
  }

  fn require_token(&self) -> Result<()> {
    if self.is_public() {
      return Err(StoreError::AuthRequired);
    }
    Ok(())
  }

  /// Fetch an object by ID.
  pub async fn get_object(&self, object_id: &str) -> Result<StoredObject> {
    let cached = self.cache().get(object_id);

    let issue = match cached {
      Some(number) => match self.cached_issue(object_id, number).await? {
        Some(issue) => issue,
        None => self.find_issue(object_id, StateFilter::Closed).await?,
      },
      None => self.find_issue(object_id, StateFilter::Closed).await?,
    };

    let object = self.build_object(object_id, &issue).await?;
    self.remember(object_id, &issue);
    Ok(object)
  }

  /// The issue behind a cached number, or `None` (with the entry dropped)
  /// when it is gone or no longer carries the object's identity.
  async fn cached_issue(&self, object_id: &str, number: u64) -> Result<Option<ApiIssue>> {
    let issue = match self.transport.get_issue(number).await {
      Ok(issue) => issue,
      Err(e) if e.status() == Some(404) => {
        warn!(object_id, issue_number = number, "cached issue no longer exists, querying by label");
        self.cache().remove(object_id);
        return Ok(None);
      }
      Err(e) => return Err(e),
    };

    match self.labels.check(&issue, object_id) {
      Ok(()) => Ok(Some(issue)),
      Err(e) => {
        warn!(object_id, error = %e, "cached issue failed verification, querying by label");
        self.cache().remove(object_id);
        Ok(None)
      }
    }
  }

  /// Fetch the object backed by a given issue number.
  pub async fn get_object_by_number(&self, issue_number: u64) -> Result<StoredObject> {
    let issue = self.transport.get_issue(issue_number).await?;
    let object_id = self.labels.id_from_labels(&issue)?;
    let object = self.build_object(&object_id, &issue).await?;
    self.remember(&object_id, &issue);
    Ok(object)
  }

  /// Create a new object. The backing issue is closed once the initial
  /// state is recorded; a failure part way leaves it open and is not
  /// rolled back.
  pub async fn create_object(
    &self,
    object_id: &str,
    data: &Value,
    extra_labels: &[String],
  ) -> Result<StoredObject> {
    self.require_token()?;

    let new_issue = NewIssue {
      title: self.labels.title(object_id),
      body: encode_snapshot(data)?,
      labels: self.labels.creation_labels(object_id, extra_labels),
    };
    let issue = self.transport.create_issue(&new_issue).await?;
    info!(object_id, issue_number = issue.number, "created backing issue");
    self.remember(object_id, &issue);

    let body = encode_update_comment(data, issue.number, Some(EntryType::InitialState))?;
    let comment = self.transport.create_comment(issue.number, &body).await?;
    self
      .transport
      .create_reaction(comment.id, &self.reactions.processed)
      .await?;
    self
      .transport
      .create_reaction(comment.id, &self.reactions.initial_state)
      .await?;

    let closed = self
      .transport
      .set_issue_state(issue.number, IssueState::Closed)
      .await?;
    self.remember(object_id, &closed);

    Ok(StoredObject {
      meta: self.meta(object_id, &closed, 1),
      data: data.clone(),
    })
  }

  /// Append a full snapshot to the object's event log and reopen its issue
  /// for reconciliation.
  ///
  /// Returns immediately without waiting for the reconciler. The metadata
  /// describes the reopened issue; the data is the value just written, since
  /// the issue body only reflects it once the reconciler has run.
  pub async fn update_object(&self, object_id: &str, data: &Value) -> Result<StoredObject> {
    self.require_token()?;

    let issue = self.find_issue(object_id, StateFilter::All).await?;
    let body = encode_update_comment(data, issue.number, None)?;
    self.transport.create_comment(issue.number, &body).await?;

    let reopened = self
      .transport
      .set_issue_state(issue.number, IssueState::Open)
      .await?;
    info!(object_id, issue_number = issue.number, "posted update, awaiting reconciliation");
    self.remember(object_id, &reopened);

    // The comment is already posted, so nothing below may depend on the
    // cache or on the issue state
    let version = self.version(reopened.number).await?;
    Ok(StoredObject {
      meta: self.meta(object_id, &reopened, version),
      data: data.clone(),
    })
  }

  /// Reopen an object's issue so external automation picks it up.
  pub async fn reopen(&self, object_id: &str) -> Result<()> {
    self.require_token()?;

    let issue = self.find_issue(object_id, StateFilter::All).await?;
    let reopened = self
      .transport
      .set_issue_state(issue.number, IssueState::Open)
      .await?;
    self.remember(object_id, &reopened);
    Ok(())
  }

  /// Every canonical (closed, not archived) object.
  pub async fn list_all(&self) -> Result<BTreeMap<String, StoredObject>> {
    let query = IssueQuery::new(vec![self.labels.base_label().to_string()], StateFilter::Closed);
    self.collect_objects(&query, |_| true).await
  }

  /// Objects whose issue was updated strictly after `since`.
  pub async fn list_updated_since(
    &self,
    since: DateTime<Utc>,
  ) -> Result<BTreeMap<String, StoredObject>> {
    let query = IssueQuery::new(vec![self.labels.base_label().to_string()], StateFilter::Closed)
      .since(since);
    self
      .collect_objects(&query, |issue| issue.updated_at > since)
      .await
  }

  /// Objects with an update still waiting for the reconciler, as
  /// `(object_id, issue_number)`.
  pub async fn list_pending(&self) -> Result<Vec<(String, u64)>> {
    let query = IssueQuery::new(
      vec![
        self.labels.store_label().to_string(),
        self.labels.base_label().to_string(),
      ],
      StateFilter::Open,
    );
    let issues = self.list_issues(&query).await?;

    Ok(
      issues
        .iter()
        .filter_map(|issue| match self.labels.id_from_labels(issue) {
          Ok(id) => Some((id, issue.number)),
          Err(e) => {
            warn!(issue_number = issue.number, error = %e, "skipping open issue");
            None
          }
        })
        .collect(),
    )
  }

  /// The object's event log, oldest first. Comments that are not valid
  /// JSON are skipped.
  pub async fn get_object_history(&self, object_id: &str) -> Result<Vec<HistoryEntry>> {
    let issue = self.find_issue(object_id, StateFilter::All).await?;
    let comments = self.list_comments(issue.number).await?;

    Ok(
      comments
        .iter()
        .filter_map(|comment| match decode_comment(comment) {
          Ok(entry) => Some(entry),
          Err(e) => {
            debug!(comment_id = comment.id, error = %e, "skipping undecodable comment");
            None
          }
        })
        .collect(),
    )
  }

  async fn collect_objects(
    &self,
    query: &IssueQuery,
    keep: impl Fn(&ApiIssue) -> bool,
  ) -> Result<BTreeMap<String, StoredObject>> {
    let issues = self.list_issues(query).await?;
    let mut objects = BTreeMap::new();

    for issue in issues.iter().filter(|i| !i.has_label(ARCHIVED_LABEL)) {
      if !keep(issue) {
        continue;
      }
      match self.object_from_issue(issue).await {
        Ok(object) => {
          objects.insert(object.meta.object_id.clone(), object);
        }
        Err(e) => warn!(issue_number = issue.number, error = %e, "skipping issue"),
      }
    }

    Ok(objects)
  }

  async fn object_from_issue(&self, issue: &ApiIssue) -> Result<StoredObject> {
    let object_id = self.labels.id_from_labels(issue)?;
    self.build_object(&object_id, issue).await
  }

  async fn build_object(&self, object_id: &str, issue: &ApiIssue) -> Result<StoredObject> {
    let data = payload::decode_snapshot(issue.body.as_deref().unwrap_or_default())?;
    let version = self.version(issue.number).await?;
    Ok(StoredObject {
      meta: self.meta(object_id, issue, version),
      data,
    })
  }

  fn meta(&self, object_id: &str, issue: &ApiIssue, version: u64) -> ObjectMeta {
    ObjectMeta {
      object_id: object_id.to_string(),
      label: self.labels.id_label(object_id),
      issue_number: issue.number,
      created_at: issue.created_at,
      updated_at: issue.updated_at,
      version,
    }
  }

  /// Updates on the event log plus one. Only comments that decode as
  /// updates count: the initial-state entry and non-JSON discussion are
  /// skipped, so a freshly created object is at version 1.
  async fn version(&self, issue_number: u64) -> Result<u64> {
    let comments = self.list_comments(issue_number).await?;
    let updates = comments.iter().filter(|c| is_update(c)).count() as u64;
    Ok(updates + 1)
  }

  /// First issue matching the object's identity labels.
  async fn find_issue(&self, object_id: &str, state: StateFilter) -> Result<ApiIssue> {
    let query = IssueQuery::new(self.labels.query_labels(object_id), state);
    let mut matches = Box::pin(items(paginate(
      PageRequest::first(self.per_page),
      Some(1),
      |page| self.transport.list_issues(&query, page),
    )));

    match matches.try_next().await? {
      Some(issue) => Ok(issue),
      None => Err(StoreError::not_found(object_id)),
    }
  }

  async fn list_issues(&self, query: &IssueQuery) -> Result<Vec<ApiIssue>> {
    items(paginate(
      PageRequest::first(self.per_page),
      self.max_pages,
      |page| self.transport.list_issues(query, page),
    ))
    .try_collect()
    .await
  }

  async fn list_comments(&self, issue_number: u64) -> Result<Vec<ApiComment>> {
    // Versions depend on the full log, so comment walks are never truncated
    paginate(
      PageRequest::first(self.per_page),
      None,
      |page| self.transport.list_comments(issue_number, page),
    )
    .map_ok(|page| page.items)
    .try_concat()
    .await
  }
}

fn decode_comment(comment: &ApiComment) -> Result<HistoryEntry> {
  let decoded = payload::decode_history_entry(
    comment.body.as_deref().unwrap_or_default(),
    comment.created_at,
  )?;
  Ok(HistoryEntry {
    comment_id: comment.id,
    timestamp: comment.created_at,
    kind: decoded.kind,
    data: decoded.data,
    metadata: decoded.meta,
  })
}

fn is_update(comment: &ApiComment) -> bool {
  decode_comment(comment).is_ok_and(|entry| entry.kind == EntryType::Update)
}
