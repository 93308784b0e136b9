//! Two-tier content cache
//!
//! Content is looked up in a cost-bounded in-memory LRU, then in a flat
//! directory on disk, and only then fetched over the network. Concurrent
//! requests for the same key share a single fetch. Disk sweeps run when the
//! host reports it is going to the background or shutting down.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use tiered_cache::{BytesDecoder, CacheConfig, CacheManager, Fetcher};
//! # async fn demo(fetcher: Arc<dyn Fetcher>) -> tiered_cache::Result<()> {
//! let cache = CacheManager::start(CacheConfig::default(), fetcher, BytesDecoder).await;
//! let bytes = cache.fetch("https://example.com/a.png", false).await?;
//! cache.on_terminate().await?;
//! # Ok(())
//! # }
//! ```

mod coalescer;
mod config;
mod error;
mod manager;
mod memory;
mod traits;
mod types;
mod worker;

pub use coalescer::{RequestCoalescer, Role};
pub use config::CacheConfig;
pub use error::{CacheError, DecodeError, FetchError, Result};
pub use manager::CacheManager;
pub use memory::{MemoryCache, MemoryStats};
pub use traits::{BytesDecoder, Decoder, Fetcher};
pub use types::{CacheStats, SweepReport};

pub use file_blob_cache::{BlobStore, CacheKey, DiskStats, KeyStrategy, SweepStats};
