//! Public handle for the tiered cache
//!
//! `fetch` checks the memory tier on the caller's task and only hands off to
//! the worker on a miss. Handles are cheap to clone; the worker keeps running
//! until the last one is dropped.

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::memory::MemoryCache;
use crate::traits::{Decoder, Fetcher};
use crate::types::{CacheStats, Counters, SweepReport};
use crate::worker::{lock_memory, Command, SharedMemory, Worker};
use file_blob_cache::{BlobStore, CacheKey, KeyStrategy};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 256;

pub struct CacheManager<D: Decoder> {
    memory: SharedMemory<D::Content>,
    commands: mpsc::Sender<Command<D::Content>>,
    counters: Arc<Counters>,
    key_strategy: KeyStrategy,
}

impl<D: Decoder> Clone for CacheManager<D> {
    fn clone(&self) -> Self {
        Self {
            memory: Arc::clone(&self.memory),
            commands: self.commands.clone(),
            counters: Arc::clone(&self.counters),
            key_strategy: self.key_strategy,
        }
    }
}

impl<D: Decoder> CacheManager<D> {
    /// Build both tiers from `config` and start the worker.
    ///
    /// A cache directory that cannot be created is logged, not fatal: every
    /// disk operation then misses and fetches still succeed.
    pub async fn start(config: CacheConfig, fetcher: Arc<dyn Fetcher>, decoder: D) -> Self {
        let disk = BlobStore::new(config.cache_dir.clone(), config.disk_limit_bytes);
        if let Err(e) = disk.init().await {
            warn!(cache_dir = ?config.cache_dir, error = %e, "Disk tier unavailable");
        }

        let memory = MemoryCache::new(config.memory_limit_bytes);
        Self::with_tiers(
            memory,
            disk,
            fetcher,
            decoder,
            config.disk_ttl(),
            config.key_strategy,
        )
    }

    /// Start a worker around tiers the caller built. Must be called from
    /// within a tokio runtime.
    pub fn with_tiers(
        memory: MemoryCache<CacheKey, D::Content>,
        disk: BlobStore,
        fetcher: Arc<dyn Fetcher>,
        decoder: D,
        disk_ttl: Duration,
        key_strategy: KeyStrategy,
    ) -> Self {
        let memory = Arc::new(Mutex::new(memory));
        let counters = Arc::new(Counters::default());
        let (commands, commands_rx) = mpsc::channel(COMMAND_BUFFER);

        info!(
            memory_limit = lock_memory(&memory).limit(),
            disk_limit = disk.max_size(),
            disk_ttl_secs = disk_ttl.as_secs(),
            "Starting tiered cache"
        );

        Worker::spawn(
            disk,
            Arc::clone(&memory),
            fetcher,
            Arc::new(decoder),
            disk_ttl,
            Arc::clone(&counters),
            commands_rx,
        );

        Self {
            memory,
            commands,
            counters,
            key_strategy,
        }
    }

    pub fn key_for(&self, identifier: &str) -> CacheKey {
        CacheKey::derive_with(self.key_strategy, identifier)
    }

    /// Get content for `identifier`: memory, then disk, then the network.
    ///
    /// Concurrent calls for the same identifier share one network fetch and
    /// all receive the same result. `ignore_cache` skips both tier lookups
    /// but still coalesces and still refreshes both tiers on success.
    pub async fn fetch(&self, identifier: &str, ignore_cache: bool) -> Result<D::Content> {
        let key = self.key_for(identifier);

        if !ignore_cache {
            let cached = lock_memory(&self.memory).get(&key);
            if let Some(content) = cached {
                debug!(key = %key, "Memory hit");
                return Ok(content);
            }
        }

        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Fetch {
                identifier: identifier.to_string(),
                key,
                ignore_cache,
                reply,
            })
            .await
            .map_err(|_| CacheError::Closed)?;

        response.await.map_err(|_| CacheError::Closed)?
    }

    /// The host is going to the background: expire and shrink the disk tier
    pub async fn on_background(&self) -> Result<SweepReport> {
        info!("Background signal received, sweeping disk tier");
        self.sweep().await
    }

    /// The host is shutting down: expire and shrink the disk tier
    pub async fn on_terminate(&self) -> Result<SweepReport> {
        info!("Terminate signal received, sweeping disk tier");
        self.sweep().await
    }

    /// Drop everything held in memory
    pub fn on_memory_pressure(&self) {
        let mut memory = lock_memory(&self.memory);
        let dropped = memory.len();
        memory.clear();
        info!(dropped, "Memory pressure, cleared memory tier");
    }

    async fn sweep(&self) -> Result<SweepReport> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Sweep { reply })
            .await
            .map_err(|_| CacheError::Closed)?;
        response.await.map_err(|_| CacheError::Closed)
    }

    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            memory: lock_memory(&self.memory).stats(),
            ..Default::default()
        };
        self.counters.fill(&mut stats);

        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Stats { reply }).await.is_ok() {
            if let Ok((disk, in_flight)) = response.await {
                stats.disk = disk;
                stats.in_flight = in_flight;
            }
        }

        stats
    }
}
