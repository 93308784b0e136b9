//! Media Cache Proxy - image proxy backed by a memory + disk cache
//!
//! Images are fetched once, kept decoded in memory and raw on disk, and
//! served from the nearest tier on later requests.

mod decoder;
mod error;
mod server;
mod types;

use crate::decoder::ImageDecoder;
use crate::error::{MediaProxyError, Result};
use crate::server::{start_server, ServerState, SharedState};
use crate::types::ProxyConfig;
use blob_fetcher::HttpFetcher;
use std::path::PathBuf;
use std::sync::Arc;
use tiered_cache::{CacheConfig, CacheManager};
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("media_cache_proxy=info".parse()?)
        .add_directive("tiered_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Media Cache Proxy...");

    let config = load_config();
    info!("Port: {}", config.port);
    info!("Cache dir: {:?}", config.cache.cache_dir);
    info!(
        "Memory cache limit: {} MB",
        config.cache.memory_limit_bytes / (1024 * 1024)
    );
    info!(
        "Disk cache limit: {} MB",
        config.cache.disk_limit_bytes / (1024 * 1024)
    );
    info!("Disk cache TTL: {} seconds", config.cache.disk_ttl_secs);

    let fetcher = Arc::new(HttpFetcher::new()?);
    let cache = CacheManager::start(config.cache, fetcher, ImageDecoder).await;

    let state: SharedState = Arc::new(ServerState::new(cache));

    start_server(state.clone(), config.port, shutdown_signal())
        .await
        .map_err(|e| MediaProxyError::Config(format!("Server error: {}", e)))?;

    if let Err(e) = state.cache.on_terminate().await {
        warn!(error = %e, "Final disk sweep failed");
    }
    info!("Media Cache Proxy stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn load_config() -> ProxyConfig {
    let ProxyConfig {
        port: default_port,
        cache: defaults,
    } = ProxyConfig::default();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(default_port);

    let cache_dir = std::env::var("CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or(defaults.cache_dir);

    let memory_limit_bytes = env_u64("MEMORY_CACHE_LIMIT").unwrap_or(defaults.memory_limit_bytes);
    let disk_limit_bytes = env_u64("DISK_CACHE_LIMIT").unwrap_or(defaults.disk_limit_bytes);
    let disk_ttl_secs = env_u64("DISK_CACHE_TTL_SECS").unwrap_or(defaults.disk_ttl_secs);

    ProxyConfig {
        port,
        cache: CacheConfig {
            cache_dir,
            memory_limit_bytes,
            disk_limit_bytes,
            disk_ttl_secs,
            key_strategy: defaults.key_strategy,
        },
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok())
}
