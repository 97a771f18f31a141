//! In-memory cache mapping object IDs to backing issue numbers.
//!
//! The cache lets a read skip the label query when the issue number is
//! already known. Entries expire after a TTL measured from last access and
//! the least recently used entry is evicted when the cache is full.

mod storage;
mod traits;

pub use storage::{MemoryCache, NoopCache, DEFAULT_MAX_SIZE, DEFAULT_TTL};
pub use traits::{CacheMetadata, CacheStats, Clock, IssueCache, ManualClock, SystemClock};
