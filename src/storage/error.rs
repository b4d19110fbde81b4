//! Storage error types

use thiserror::Error;

/// Errors that can occur while loading or saving the item snapshot
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Snapshot not found: {0}")]
    Missing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed snapshot: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Invalid record {key}: {reason}")]
    InvalidRecord { key: String, reason: String },
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
