//! Reporting types

use crate::memory::MemoryStats;
use file_blob_cache::{DiskStats, SweepStats};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of a background/terminate sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries removed for outliving the TTL
    pub expired: SweepStats,
    /// Entries removed to get back under the disk limit
    pub downsized: SweepStats,
}

/// Snapshot of both tiers and the fetch pipeline
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub memory: MemoryStats,
    /// `None` when the disk tier could not be read or the worker is gone
    pub disk: Option<DiskStats>,
    pub in_flight: usize,
    pub disk_hits: u64,
    pub disk_misses: u64,
    pub network_fetches: u64,
    pub coalesced_joins: u64,
}

/// Pipeline counters shared between the handle and the worker
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub disk_hits: AtomicU64,
    pub disk_misses: AtomicU64,
    pub network_fetches: AtomicU64,
    pub coalesced_joins: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fill(&self, stats: &mut CacheStats) {
        stats.disk_hits = self.disk_hits.load(Ordering::Relaxed);
        stats.disk_misses = self.disk_misses.load(Ordering::Relaxed);
        stats.network_fetches = self.network_fetches.load(Ordering::Relaxed);
        stats.coalesced_joins = self.coalesced_joins.load(Ordering::Relaxed);
    }
}
