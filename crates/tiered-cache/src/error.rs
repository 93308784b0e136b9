//! Error types for the tiered cache
//!
//! [`CacheError`] is what callers of `fetch` see. It is `Clone` because one
//! resolution fans out to every coalesced waiter.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The fetcher reported an error or produced no payload
    FetchFailed(String),
    /// The payload could not be read into memory
    PayloadUnreadable(String),
    /// Bytes could not be decoded into content
    DecodeFailed(String),
    /// The cache worker has shut down
    Closed,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::FetchFailed(msg) => write!(f, "Fetch failed: {}", msg),
            CacheError::PayloadUnreadable(msg) => write!(f, "Payload unreadable: {}", msg),
            CacheError::DecodeFailed(msg) => write!(f, "Decode failed: {}", msg),
            CacheError::Closed => write!(f, "Cache worker is not running"),
        }
    }
}

impl std::error::Error for CacheError {}

/// Errors reported by a [`Fetcher`](crate::Fetcher)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be completed (connection, status, missing payload)
    Transport(String),
    /// The response arrived but its body could not be read
    Body(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "Transport error: {}", msg),
            FetchError::Body(msg) => write!(f, "Body error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<FetchError> for CacheError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transport(msg) => CacheError::FetchFailed(msg),
            FetchError::Body(msg) => CacheError::PayloadUnreadable(msg),
        }
    }
}

/// Error reported by a [`Decoder`](crate::Decoder)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError(pub String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decode error: {}", self.0)
    }
}

impl std::error::Error for DecodeError {}

impl From<DecodeError> for CacheError {
    fn from(err: DecodeError) -> Self {
        CacheError::DecodeFailed(err.0)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
