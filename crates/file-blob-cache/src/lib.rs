//! File-based blob store with TTL and size-bound eviction
//!
//! Stores raw bytes in a flat directory, one file per [`CacheKey`], with no
//! index or manifest. Sweeps are explicit: callers decide when to expire old
//! entries and when to shrink the store back under its limit.

mod cache;
mod error;
mod key;
mod types;

pub use cache::BlobStore;
pub use error::{BlobStoreError, Result};
pub use key::{CacheKey, KeyStrategy};
pub use types::{DiskEntry, DiskStats, StoreOutcome, SweepStats};
