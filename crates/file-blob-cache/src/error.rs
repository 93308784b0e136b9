//! Error types for the blob store

use std::fmt;

#[derive(Debug)]
pub enum BlobStoreError {
    Io(Box<std::io::Error>),
    /// Blocking filesystem task was cancelled or panicked
    Task(String),
}

impl fmt::Display for BlobStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobStoreError::Io(err) => write!(f, "IO error: {}", err),
            BlobStoreError::Task(msg) => write!(f, "Blocking task failed: {}", msg),
        }
    }
}

impl std::error::Error for BlobStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobStoreError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BlobStoreError {
    fn from(err: std::io::Error) -> Self {
        BlobStoreError::Io(Box::new(err))
    }
}

impl From<tokio::task::JoinError> for BlobStoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        BlobStoreError::Task(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BlobStoreError>;
