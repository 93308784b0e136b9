//! Flat-directory blob storage
//!
//! One file per key and no index: the directory listing plus per-file
//! access times is the entire state. The store has no locking of its own and
//! expects a single owner to sequence its mutations.

use crate::error::Result;
use crate::key::CacheKey;
use crate::types::{DiskEntry, DiskStats, StoreOutcome, SweepStats};
use chrono::{DateTime, Utc};
use std::fs::{FileTimes, Metadata, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, info, warn};

const TEMP_PREFIX: &str = ".tmp-";

/// A blob store backed by a dedicated directory
pub struct BlobStore {
    /// Directory where blobs are stored
    cache_dir: PathBuf,
    /// Byte limit; writes are refused once the store reaches it
    max_size: u64,
}

impl BlobStore {
    /// Create a new blob store
    pub fn new(cache_dir: PathBuf, max_size: u64) -> Self {
        Self { cache_dir, max_size }
    }

    /// Ensure the directory exists and clear out interrupted writes
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).await?;

        let mut dir = fs::read_dir(&self.cache_dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let stale = item
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(TEMP_PREFIX));
            if stale {
                let _ = fs::remove_file(item.path()).await;
            }
        }

        info!(cache_dir = ?self.cache_dir, max_size = self.max_size, "Blob store initialized");
        Ok(())
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(key.as_str())
    }

    /// Write a blob, replacing any existing entry for the key.
    ///
    /// Nothing is written while the store is at or above its limit; room is
    /// only made by the sweeps.
    pub async fn store(&self, key: &CacheKey, data: &[u8]) -> Result<StoreOutcome> {
        let current = self.total_size_bytes().await?;
        if current >= self.max_size {
            debug!(key = %key, current, max_size = self.max_size, "Store full, skipping write");
            return Ok(StoreOutcome::Skipped);
        }

        let path = self.entry_path(key);
        let tmp = self.cache_dir.join(format!("{}{}", TEMP_PREFIX, key));

        fs::write(&tmp, data).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(key = %key, size = data.len(), "Stored blob");
        Ok(StoreOutcome::Written)
    }

    /// Read a blob. `Ok(None)` means the entry does not exist.
    pub async fn retrieve(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);

        match fs::read(&path).await {
            Ok(data) => {
                self.touch(path).await;
                Ok(Some(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Mark an entry as just read. Many mounts use `relatime` or `noatime`,
    /// so the read itself cannot be relied on to move the access time.
    async fn touch(&self, path: PathBuf) {
        let result = tokio::task::spawn_blocking(move || {
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_times(FileTimes::new().set_accessed(SystemTime::now()))
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Failed to refresh access time"),
            Err(e) => debug!(error = %e, "Access time refresh task failed"),
        }
    }

    /// Delete a blob. Returns whether anything was removed.
    pub async fn remove(&self, key: &CacheKey) -> Result<bool> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Enumerate every entry. Order is whatever the filesystem yields.
    pub async fn list_entries(&self) -> Result<Vec<DiskEntry>> {
        let mut dir = match fs::read_dir(&self.cache_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name();
            let Some(key) = name.to_str().and_then(CacheKey::from_file_name) else {
                continue;
            };

            let metadata = match item.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(key = %key, error = %e, "Skipping entry without metadata");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            entries.push(DiskEntry {
                key,
                last_access: last_access(&metadata),
                size: metadata.len(),
            });
        }

        Ok(entries)
    }

    /// Sum of the sizes of all stored blobs
    pub async fn total_size_bytes(&self) -> Result<u64> {
        Ok(self.list_entries().await?.iter().map(|e| e.size).sum())
    }

    /// Get current store statistics
    pub async fn stats(&self) -> Result<DiskStats> {
        let entries = self.list_entries().await?;
        Ok(DiskStats {
            entries: entries.len(),
            total_size: entries.iter().map(|e| e.size).sum(),
            limit: self.max_size,
        })
    }

    /// Remove every entry last accessed before `cutoff`, regardless of size
    pub async fn evict_expired(&self, cutoff: DateTime<Utc>) -> Result<SweepStats> {
        let mut stats = SweepStats::default();

        for entry in self.list_entries().await? {
            if !entry.is_expired(cutoff) {
                continue;
            }
            match self.remove(&entry.key).await {
                Ok(true) => {
                    stats.removed += 1;
                    stats.freed_bytes += entry.size;
                    debug!(key = %entry.key, last_access = ?entry.last_access, "Evicted expired blob");
                }
                Ok(false) => {}
                Err(e) => warn!(key = %entry.key, error = %e, "Failed to evict expired blob"),
            }
        }

        info!(
            removed = stats.removed,
            freed_bytes = stats.freed_bytes,
            cutoff = %cutoff,
            "TTL sweep finished"
        );
        Ok(stats)
    }

    /// Remove least recently accessed entries until the total drops below `target`
    pub async fn downsize(&self, target: u64) -> Result<SweepStats> {
        let mut entries = self.list_entries().await?;
        entries.sort_by(|a, b| {
            a.sweep_order()
                .cmp(&b.sweep_order())
                .then_with(|| a.key.cmp(&b.key))
        });

        let mut total: u64 = entries.iter().map(|e| e.size).sum();
        let mut stats = SweepStats::default();

        for entry in entries {
            if total < target {
                break;
            }
            match self.remove(&entry.key).await {
                Ok(removed) => {
                    total = total.saturating_sub(entry.size);
                    if removed {
                        stats.removed += 1;
                        stats.freed_bytes += entry.size;
                        debug!(key = %entry.key, size = entry.size, "Evicted blob to free space");
                    }
                }
                Err(e) => warn!(key = %entry.key, error = %e, "Failed to evict blob"),
            }
        }

        info!(
            removed = stats.removed,
            freed_bytes = stats.freed_bytes,
            remaining_bytes = total,
            target,
            "Size sweep finished"
        );
        Ok(stats)
    }
}

fn last_access(metadata: &Metadata) -> Option<DateTime<Utc>> {
    metadata
        .accessed()
        .or_else(|_| metadata.modified())
        .map(DateTime::<Utc>::from)
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::fs::File;
    use tempfile::tempdir;

    const DAY: i64 = 24 * 60 * 60;

    fn set_last_access(path: &Path, at: DateTime<Utc>) {
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_times(FileTimes::new().set_accessed(at.into()))
            .unwrap();
    }

    /// Whole seconds so filesystems with coarse timestamps store it exactly
    fn whole_seconds_ago(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(Utc::now().timestamp() - secs, 0).unwrap()
    }

    async fn store_with_access(store: &BlobStore, id: &str, data: &[u8], at: DateTime<Utc>) -> CacheKey {
        let key = CacheKey::derive(id);
        assert_eq!(store.store(&key, data).await.unwrap(), StoreOutcome::Written);
        set_last_access(&store.cache_dir().join(key.as_str()), at);
        key
    }

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024 * 1024);
        store.init().await.unwrap();

        let key = CacheKey::derive("https://x/a.png");
        let data = b"\x89PNG not really";

        assert_eq!(store.store(&key, data).await.unwrap(), StoreOutcome::Written);
        assert_eq!(store.retrieve(&key).await.unwrap(), Some(data.to_vec()));
    }

    #[tokio::test]
    async fn test_retrieve_miss() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024);
        store.init().await.unwrap();

        let key = CacheKey::derive("https://x/missing.png");
        assert_eq!(store.retrieve(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024);
        store.init().await.unwrap();

        let key = CacheKey::derive("https://x/a.png");
        store.store(&key, b"first").await.unwrap();
        store.store(&key, b"second").await.unwrap();

        assert_eq!(store.retrieve(&key).await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(store.list_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_store_skipped_when_full() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 10);
        store.init().await.unwrap();

        // Starts empty, so this write is allowed even though it reaches the limit
        let first = CacheKey::derive("one");
        assert_eq!(store.store(&first, b"0123456789").await.unwrap(), StoreOutcome::Written);

        let second = CacheKey::derive("two");
        assert_eq!(store.store(&second, b"x").await.unwrap(), StoreOutcome::Skipped);
        assert_eq!(store.retrieve(&second).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024);
        store.init().await.unwrap();

        let key = CacheKey::derive("https://x/a.png");
        store.store(&key, b"data").await.unwrap();

        assert!(store.remove(&key).await.unwrap());
        assert!(!store.remove(&key).await.unwrap());
        assert_eq!(store.retrieve(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_total_size_sums_files() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024);
        store.init().await.unwrap();

        store.store(&CacheKey::derive("a"), b"12345").await.unwrap();
        store.store(&CacheKey::derive("b"), b"1234567").await.unwrap();

        assert_eq!(store.total_size_bytes().await.unwrap(), 12);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_size, 12);
        assert_eq!(stats.limit, 1024);
    }

    #[tokio::test]
    async fn test_list_ignores_foreign_entries() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024);
        store.init().await.unwrap();

        std::fs::write(dir.path().join(".DS_Store"), b"junk").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let key = CacheKey::derive("https://x/a.png");
        store.store(&key, b"data").await.unwrap();

        let entries = store.list_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, key);
        assert_eq!(entries[0].size, 4);
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("never-created"), 1024);

        assert!(store.list_entries().await.unwrap().is_empty());
        assert_eq!(store.total_size_bytes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_without_directory_fails() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("never-created"), 1024);

        let result = store.store(&CacheKey::derive("a"), b"data").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_init_removes_interrupted_writes() {
        let dir = tempdir().unwrap();
        let stale = dir.path().join(format!("{}abc", TEMP_PREFIX));
        std::fs::write(&stale, b"partial").unwrap();

        let store = BlobStore::new(dir.path().to_path_buf(), 1024);
        store.init().await.unwrap();

        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_retrieve_refreshes_access_time() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024);
        store.init().await.unwrap();

        let old = whole_seconds_ago(30 * DAY);
        let key = store_with_access(&store, "https://x/a.png", b"data", old).await;

        store.retrieve(&key).await.unwrap();

        let entries = store.list_entries().await.unwrap();
        assert!(entries[0].last_access.unwrap() > old + Duration::days(29));
    }

    #[tokio::test]
    async fn test_evict_expired() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024);
        store.init().await.unwrap();

        let cutoff = whole_seconds_ago(10 * DAY);
        let stale = store_with_access(&store, "stale", b"0123456789", whole_seconds_ago(20 * DAY)).await;
        let boundary = store_with_access(&store, "boundary", b"01234", cutoff).await;
        let fresh = store_with_access(&store, "fresh", b"012", whole_seconds_ago(DAY)).await;

        let stats = store.evict_expired(cutoff).await.unwrap();
        assert_eq!(stats, SweepStats { removed: 1, freed_bytes: 10 });

        assert_eq!(store.retrieve(&stale).await.unwrap(), None);
        assert!(store.retrieve(&boundary).await.unwrap().is_some());
        assert!(store.retrieve(&fresh).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_downsize_removes_oldest_first() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024);
        store.init().await.unwrap();

        let keys = [
            store_with_access(&store, "k0", b"0123456789", whole_seconds_ago(400)).await,
            store_with_access(&store, "k1", b"0123456789", whole_seconds_ago(300)).await,
            store_with_access(&store, "k2", b"0123456789", whole_seconds_ago(200)).await,
            store_with_access(&store, "k3", b"0123456789", whole_seconds_ago(100)).await,
        ];

        let stats = store.downsize(25).await.unwrap();
        assert_eq!(stats, SweepStats { removed: 2, freed_bytes: 20 });

        let mut remaining: Vec<CacheKey> = store
            .list_entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        remaining.sort();
        let mut expected = vec![keys[2].clone(), keys[3].clone()];
        expected.sort();
        assert_eq!(remaining, expected);
    }

    #[tokio::test]
    async fn test_downsize_below_target_is_noop() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024);
        store.init().await.unwrap();

        store.store(&CacheKey::derive("a"), b"0123456789").await.unwrap();
        store.store(&CacheKey::derive("b"), b"0123456789").await.unwrap();

        let stats = store.downsize(21).await.unwrap();
        assert_eq!(stats, SweepStats::default());
        assert_eq!(store.total_size_bytes().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_downsize_breaks_ties_by_key() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024);
        store.init().await.unwrap();

        let at = whole_seconds_ago(100);
        let a = store_with_access(&store, "first", b"0123456789", at).await;
        let b = store_with_access(&store, "second", b"0123456789", at).await;
        let (lower, higher) = if a < b { (a, b) } else { (b, a) };

        let stats = store.downsize(15).await.unwrap();
        assert_eq!(stats.removed, 1);

        let remaining = store.list_entries().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].key, higher);
        assert_ne!(remaining[0].key, lower);
    }

    #[tokio::test]
    async fn test_downsize_large_store() {
        const MIB: u64 = 1024 * 1024;
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 64 * MIB);
        store.init().await.unwrap();

        // Sparse files keep the test fast while reporting their full length
        let mut keys = Vec::new();
        for i in 0..8 {
            let key = CacheKey::derive(&format!("https://x/{}.png", i));
            let path = dir.path().join(key.as_str());
            File::create(&path).unwrap().set_len(10 * MIB).unwrap();
            set_last_access(&path, whole_seconds_ago(1000 - i * 10));
            keys.push(key);
        }
        assert_eq!(store.total_size_bytes().await.unwrap(), 80 * MIB);

        let stats = store.downsize(64 * MIB).await.unwrap();
        assert_eq!(stats.removed, 2);
        assert_eq!(store.total_size_bytes().await.unwrap(), 60 * MIB);
        assert!(store.retrieve(&keys[0]).await.unwrap().is_none());
        assert!(store.retrieve(&keys[1]).await.unwrap().is_none());
    }
}
