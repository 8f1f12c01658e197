//! Error types for cifar-topk
//!
//! Every failure is deterministic for a given input: nothing here is
//! retried, callers get the error immediately.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// cifar-topk error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed selector call (length mismatch, oversized k under the strict policy,
    /// unsupported key column)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Binary record file or container content does not match the expected layout
    #[error("Format error: {0}")]
    Format(String),

    /// Conversion configuration rejected by validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error (Parquet/Arrow container)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
