//! Error types for the blob fetcher

use std::fmt;

#[derive(Debug)]
pub enum BlobFetcherError {
    Http(Box<reqwest::Error>),
}

impl fmt::Display for BlobFetcherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobFetcherError::Http(err) => write!(f, "HTTP client error: {}", err),
        }
    }
}

impl std::error::Error for BlobFetcherError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobFetcherError::Http(err) => Some(err.as_ref()),
        }
    }
}

impl From<reqwest::Error> for BlobFetcherError {
    fn from(err: reqwest::Error) -> Self {
        BlobFetcherError::Http(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, BlobFetcherError>;
