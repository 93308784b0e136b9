//! Store types

use crate::key::CacheKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::UNIX_EPOCH;

/// A single file in the store, as seen by directory enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskEntry {
    pub key: CacheKey,
    /// `None` when the filesystem reports neither an access nor a modification time
    pub last_access: Option<DateTime<Utc>>,
    pub size: u64,
}

impl DiskEntry {
    /// An entry with no known access time never expires
    pub fn is_expired(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_access.is_some_and(|at| at < cutoff)
    }

    /// Access time for oldest-first ordering; unknown times sort first
    pub fn sweep_order(&self) -> DateTime<Utc> {
        self.last_access
            .unwrap_or_else(|| DateTime::<Utc>::from(UNIX_EPOCH))
    }
}

/// What happened to a `store` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Written,
    /// The store was already at or above its byte limit
    Skipped,
}

/// Result of one eviction sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    pub removed: usize,
    pub freed_bytes: u64,
}

/// Statistics about the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskStats {
    pub entries: usize,
    pub total_size: u64,
    pub limit: u64,
}
