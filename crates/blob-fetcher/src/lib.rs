//! HTTP blob fetcher
//!
//! Plugs a `reqwest` client into the tiered cache as its network tier.

pub mod error;
pub mod fetcher;

pub use error::{BlobFetcherError, Result};
pub use fetcher::HttpFetcher;
