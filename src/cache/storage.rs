//! In-memory cache implementations.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::traits::{CacheMetadata, CacheStats, Clock, IssueCache, SystemClock};

pub const DEFAULT_MAX_SIZE: usize = 1000;
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
  issue_number: u64,
  last_accessed: Instant,
  meta: CacheMetadata,
}

/// Bounded, TTL-based cache with least-recently-used eviction.
pub struct MemoryCache {
  entries: HashMap<String, CacheEntry>,
  /// Object IDs, most recently used first
  recency: VecDeque<String>,
  max_size: usize,
  ttl: Duration,
  clock: Arc<dyn Clock>,
}

impl MemoryCache {
  pub fn new(max_size: usize, ttl: Duration) -> Self {
    Self::with_clock(max_size, ttl, Arc::new(SystemClock))
  }

  pub fn with_clock(max_size: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
    Self {
      entries: HashMap::new(),
      recency: VecDeque::new(),
      max_size,
      ttl,
      clock,
    }
  }

  fn touch(&mut self, object_id: &str) {
    if let Some(pos) = self.recency.iter().position(|id| id == object_id) {
      self.recency.remove(pos);
    }
    self.recency.push_front(object_id.to_string());
  }

  fn forget(&mut self, object_id: &str) {
    self.entries.remove(object_id);
    self.recency.retain(|id| id != object_id);
  }

  fn evict_lru(&mut self) {
    if let Some(oldest) = self.recency.pop_back() {
      debug!(object_id = %oldest, "evicting least recently used cache entry");
      self.entries.remove(&oldest);
    }
  }
}

impl Default for MemoryCache {
  fn default() -> Self {
    Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
  }
}

impl IssueCache for MemoryCache {
  fn get(&mut self, object_id: &str) -> Option<u64> {
    let now = self.clock.now();
    let entry = self.entries.get_mut(object_id)?;

    if now.saturating_duration_since(entry.last_accessed) > self.ttl {
      debug!(object_id, "cache entry expired");
      self.forget(object_id);
      return None;
    }

    entry.last_accessed = now;
    let issue_number = entry.issue_number;
    self.touch(object_id);
    Some(issue_number)
  }

  fn set(&mut self, object_id: &str, issue_number: u64, meta: CacheMetadata) {
    if self.max_size == 0 {
      return;
    }

    if !self.entries.contains_key(object_id) && self.entries.len() >= self.max_size {
      self.evict_lru();
    }

    let entry = CacheEntry {
      issue_number,
      last_accessed: self.clock.now(),
      meta,
    };
    self.entries.insert(object_id.to_string(), entry);
    self.touch(object_id);
  }

  fn remove(&mut self, object_id: &str) {
    self.forget(object_id);
  }

  fn should_refresh(&self, object_id: &str, updated_at: DateTime<Utc>) -> bool {
    match self.entries.get(object_id) {
      Some(entry) => updated_at > entry.meta.updated_at,
      None => true,
    }
  }

  fn clear(&mut self) {
    self.entries.clear();
    self.recency.clear();
  }

  fn stats(&self) -> CacheStats {
    CacheStats {
      size: self.entries.len(),
      max_size: self.max_size,
      ttl: self.ttl,
    }
  }
}

/// Cache that never remembers anything. Used when caching is disabled.
pub struct NoopCache;

impl IssueCache for NoopCache {
  fn get(&mut self, _object_id: &str) -> Option<u64> {
    None // Always miss
  }

  fn set(&mut self, _object_id: &str, _issue_number: u64, _meta: CacheMetadata) {}

  fn remove(&mut self, _object_id: &str) {}

  fn should_refresh(&self, _object_id: &str, _updated_at: DateTime<Utc>) -> bool {
    true
  }

  fn clear(&mut self) {}

  fn stats(&self) -> CacheStats {
    CacheStats {
      size: 0,
      max_size: 0,
      ttl: Duration::ZERO,
    }
  }
}
