//! The sequential worker that owns the waiter registry and the disk tier
//!
//! Every registry mutation and every filesystem operation happens on this one
//! task, so two callers can never both lead the same key and two writers can
//! never race on the same file. Network fetches run on their own tasks and
//! report back over a channel, so a slow fetch never blocks other keys.

use crate::coalescer::{RequestCoalescer, Role};
use crate::error::{CacheError, Result};
use crate::memory::MemoryCache;
use crate::traits::{Decoder, Fetcher};
use crate::types::{Counters, SweepReport};
use chrono::{DateTime, Utc};
use file_blob_cache::{BlobStore, CacheKey, DiskStats, StoreOutcome, SweepStats};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Caps the TTL well inside chrono's range
const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

pub(crate) type SharedMemory<C> = Arc<Mutex<MemoryCache<CacheKey, C>>>;

pub(crate) enum Command<C> {
    Fetch {
        identifier: String,
        key: CacheKey,
        ignore_cache: bool,
        reply: oneshot::Sender<Result<C>>,
    },
    Sweep {
        reply: oneshot::Sender<SweepReport>,
    },
    Stats {
        reply: oneshot::Sender<(Option<DiskStats>, usize)>,
    },
}

/// A fetched payload together with its decoded form
struct Fetched<C> {
    content: C,
    bytes: Vec<u8>,
}

struct Completion<C> {
    key: CacheKey,
    outcome: Result<Fetched<C>>,
}

pub(crate) struct Worker<D: Decoder> {
    disk: BlobStore,
    waiters: RequestCoalescer<Result<D::Content>>,
    memory: SharedMemory<D::Content>,
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<D>,
    ttl: chrono::Duration,
    counters: Arc<Counters>,
    completions_tx: mpsc::UnboundedSender<Completion<D::Content>>,
}

pub(crate) fn lock_memory<C>(
    memory: &SharedMemory<C>,
) -> std::sync::MutexGuard<'_, MemoryCache<CacheKey, C>> {
    memory.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<D: Decoder> Worker<D> {
    /// Spawn the worker onto the current runtime
    pub fn spawn(
        disk: BlobStore,
        memory: SharedMemory<D::Content>,
        fetcher: Arc<dyn Fetcher>,
        decoder: Arc<D>,
        ttl: std::time::Duration,
        counters: Arc<Counters>,
        commands: mpsc::Receiver<Command<D::Content>>,
    ) {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let ttl = chrono::Duration::seconds(ttl.as_secs().min(MAX_TTL_SECS) as i64);

        let worker = Worker {
            disk,
            waiters: RequestCoalescer::new(),
            memory,
            fetcher,
            decoder,
            ttl,
            counters,
            completions_tx,
        };

        tokio::spawn(worker.run(commands, completions_rx));
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command<D::Content>>,
        mut completions: mpsc::UnboundedReceiver<Completion<D::Content>>,
    ) {
        debug!(cache_dir = ?self.disk.cache_dir(), "Cache worker started");

        loop {
            tokio::select! {
                Some(done) = completions.recv() => self.finish_fetch(done).await,
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }

        // Every handle is gone; let in-flight fetches land so their waiters hear back
        while !self.waiters.is_empty() {
            match completions.recv().await {
                Some(done) => self.finish_fetch(done).await,
                None => break,
            }
        }

        debug!("Cache worker stopped");
    }

    async fn handle(&mut self, command: Command<D::Content>) {
        match command {
            Command::Fetch {
                identifier,
                key,
                ignore_cache,
                reply,
            } => self.begin_fetch(identifier, key, ignore_cache, reply).await,
            Command::Sweep { reply } => {
                let report = self.sweep(Utc::now()).await;
                let _ = reply.send(report);
            }
            Command::Stats { reply } => {
                let disk = match self.disk.stats().await {
                    Ok(stats) => Some(stats),
                    Err(e) => {
                        warn!(error = %e, "Failed to read disk stats");
                        None
                    }
                };
                let _ = reply.send((disk, self.waiters.in_flight()));
            }
        }
    }

    async fn begin_fetch(
        &mut self,
        identifier: String,
        key: CacheKey,
        ignore_cache: bool,
        reply: oneshot::Sender<Result<D::Content>>,
    ) {
        if self.waiters.join_or_lead(&key, reply) == Role::Joined {
            Counters::bump(&self.counters.coalesced_joins);
            debug!(key = %key, waiting = self.waiters.waiting(&key), "Joined in-flight fetch");
            return;
        }

        if !ignore_cache {
            // A fetch for this key may have landed after the caller's own memory check
            let cached = lock_memory(&self.memory).get(&key);
            if let Some(content) = cached {
                debug!(key = %key, "Memory hit after miss, fetch already landed");
                self.resolve(&key, Ok(content));
                return;
            }

            if let Some(content) = self.check_disk(&key).await {
                self.populate_memory(&key, content.clone());
                self.resolve(&key, Ok(content));
                return;
            }
        }

        self.spawn_fetch(identifier, key);
    }

    /// A read error or a blob that no longer decodes is just a miss; the file
    /// is left for the fetch to overwrite
    async fn check_disk(&self, key: &CacheKey) -> Option<D::Content> {
        let bytes = match self.disk.retrieve(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                Counters::bump(&self.counters.disk_misses);
                debug!(key = %key, "Disk miss");
                return None;
            }
            Err(e) => {
                Counters::bump(&self.counters.disk_misses);
                warn!(key = %key, error = %e, "Failed to read cached blob");
                return None;
            }
        };

        match self.decoder.decode(&bytes) {
            Ok(content) => {
                Counters::bump(&self.counters.disk_hits);
                debug!(key = %key, size = bytes.len(), "Disk hit");
                Some(content)
            }
            Err(e) => {
                Counters::bump(&self.counters.disk_misses);
                warn!(key = %key, error = %e, "Cached blob failed to decode, refetching");
                None
            }
        }
    }

    fn spawn_fetch(&self, identifier: String, key: CacheKey) {
        Counters::bump(&self.counters.network_fetches);
        debug!(key = %key, identifier = %identifier, "Fetching from network");

        let fetcher = Arc::clone(&self.fetcher);
        let decoder = Arc::clone(&self.decoder);
        let completions_tx = self.completions_tx.clone();

        tokio::spawn(async move {
            let fetch = fetch_and_decode(fetcher.as_ref(), decoder.as_ref(), &identifier);
            let outcome = AssertUnwindSafe(fetch)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(CacheError::FetchFailed("fetch task panicked".to_string()))
                });

            // Only fails once the worker is gone, and then nobody is waiting
            let _ = completions_tx.send(Completion { key, outcome });
        });
    }

    async fn finish_fetch(&mut self, done: Completion<D::Content>) {
        let Completion { key, outcome } = done;

        match outcome {
            Ok(Fetched { content, bytes }) => {
                self.populate_memory(&key, content.clone());

                match self.disk.store(&key, &bytes).await {
                    Ok(StoreOutcome::Written) => {}
                    Ok(StoreOutcome::Skipped) => {
                        debug!(key = %key, "Disk tier full, blob not persisted")
                    }
                    Err(e) => warn!(key = %key, error = %e, "Failed to cache blob"),
                }

                self.resolve(&key, Ok(content));
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Fetch failed");
                self.resolve(&key, Err(e));
            }
        }
    }

    fn populate_memory(&self, key: &CacheKey, content: D::Content) {
        let cost = self.decoder.cost(&content);
        let evicted = lock_memory(&self.memory).put(key.clone(), content, cost);
        if evicted > 0 {
            debug!(key = %key, cost, evicted, "Memory tier evicted entries");
        }
    }

    fn resolve(&mut self, key: &CacheKey, result: Result<D::Content>) {
        let delivered = self.waiters.resolve(key, result);
        debug!(key = %key, delivered, "Resolved waiters");
    }

    /// TTL sweep, then size sweep against the disk limit
    async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let cutoff = now
            .checked_sub_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let expired = self.disk.evict_expired(cutoff).await.unwrap_or_else(|e| {
            warn!(error = %e, "TTL sweep failed");
            SweepStats::default()
        });

        let downsized = self
            .disk
            .downsize(self.disk.max_size())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Size sweep failed");
                SweepStats::default()
            });

        let report = SweepReport { expired, downsized };
        info!(?report, "Disk sweep complete");
        report
    }
}

async fn fetch_and_decode<D: Decoder>(
    fetcher: &dyn Fetcher,
    decoder: &D,
    identifier: &str,
) -> Result<Fetched<D::Content>> {
    let bytes = fetcher.fetch(identifier).await?;
    let content = decoder.decode(&bytes)?;
    Ok(Fetched { content, bytes })
}
