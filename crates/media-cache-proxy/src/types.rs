//! Core types for the media cache proxy

use serde::{Deserialize, Serialize};
use tiered_cache::{CacheConfig, CacheStats};

/// Configuration for the media cache proxy
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    pub cache: CacheConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: 3002,
            cache: CacheConfig::default(),
        }
    }
}

/// Query string for `/image`
#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    pub url: String,
    #[serde(default)]
    pub ignore_cache: bool,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
