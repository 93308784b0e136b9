//! `reqwest`-backed [`Fetcher`]

use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tiered_cache::{FetchError, Fetcher};
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches payloads with a plain HTTP GET
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tiered-cache/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Connection failures and non-success statuses are transport errors; a
    /// body that breaks off mid-read is a body error.
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        debug!(url = %url, "Fetching blob");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, url = %url, "Failed to fetch blob");
            return Err(FetchError::Transport(format!("upstream returned status {}", status)));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?
            .to_vec();

        debug!(size = data.len(), url = %url, "Fetched blob");
        Ok(data)
    }
}
