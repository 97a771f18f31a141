//! Core traits and types for the issue cache.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Timestamps of the backing issue, recorded alongside the issue number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetadata {
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Introspection snapshot of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
  pub size: usize,
  pub max_size: usize,
  pub ttl: Duration,
}

/// Mapping from object ID to the number of its backing issue.
///
/// The store owns one of these and consults it before querying by label.
/// Implementations need not be internally synchronized; the store guards
/// access with a mutex.
pub trait IssueCache: Send {
  /// Look up the issue number for an object, refreshing its recency.
  /// Entries older than the TTL are evicted and reported as absent.
  fn get(&mut self, object_id: &str) -> Option<u64>;

  /// Insert or refresh an entry, evicting the least recently used entry
  /// when the cache is full and `object_id` is new.
  fn set(&mut self, object_id: &str, issue_number: u64, meta: CacheMetadata);

  fn remove(&mut self, object_id: &str);

  /// True if the object is unknown or `updated_at` is newer than what the
  /// cache last saw.
  fn should_refresh(&self, object_id: &str, updated_at: DateTime<Utc>) -> bool;

  fn clear(&mut self);

  fn stats(&self) -> CacheStats;
}

/// Source of monotonic time for TTL bookkeeping.
pub trait Clock: Send + Sync {
  fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> Instant {
    Instant::now()
  }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
  base: Instant,
  offset: Mutex<Duration>,
}

impl ManualClock {
  pub fn new() -> Self {
    Self {
      base: Instant::now(),
      offset: Mutex::new(Duration::ZERO),
    }
  }

  pub fn advance(&self, by: Duration) {
    let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
    *offset += by;
  }
}

impl Default for ManualClock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Instant {
    let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
    self.base + offset
  }
}
