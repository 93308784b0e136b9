//! Seams for the collaborators the cache does not own: the network and the
//! decoder.

use crate::error::{DecodeError, FetchError};
use async_trait::async_trait;
use std::sync::Arc;

/// Fetches the raw payload for an identifier
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, identifier: &str) -> Result<Vec<u8>, FetchError>;
}

/// Turns raw bytes into the content kept in memory
pub trait Decoder: Send + Sync + 'static {
    type Content: Clone + Send + Sync + 'static;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Content, DecodeError>;

    /// Memory cost charged against the memory tier's limit
    fn cost(&self, content: &Self::Content) -> u64;
}

/// Keeps payloads as shared bytes. Empty payloads are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesDecoder;

impl Decoder for BytesDecoder {
    type Content = Arc<[u8]>;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Content, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError("empty payload".to_string()));
        }
        Ok(Arc::from(bytes))
    }

    fn cost(&self, content: &Self::Content) -> u64 {
        content.len() as u64
    }
}
