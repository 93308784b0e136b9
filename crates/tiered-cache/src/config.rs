//! Cache configuration

use file_blob_cache::KeyStrategy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Limits and location for both cache tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Dedicated directory for the disk tier
    pub cache_dir: PathBuf,
    /// Total decoded cost the memory tier may hold
    pub memory_limit_bytes: u64,
    /// Byte limit for the disk tier; sweeps shrink it below this
    pub disk_limit_bytes: u64,
    /// Entries not accessed for this long are removed by the TTL sweep
    pub disk_ttl_secs: u64,
    pub key_strategy: KeyStrategy,
}

impl CacheConfig {
    pub fn disk_ttl(&self) -> Duration {
        Duration::from_secs(self.disk_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache/images"),
            memory_limit_bytes: 48 * MIB,
            disk_limit_bytes: 64 * MIB,
            disk_ttl_secs: 10 * 24 * 60 * 60, // 10 days
            key_strategy: KeyStrategy::Sha256,
        }
    }
}
