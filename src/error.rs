//! Error types for price_sync

use thiserror::Error;

/// Catalog file load/save failures
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Reading or writing the snapshot file failed
    #[error("Catalog I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot content could not be (de)serialized
    #[error("Catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Peer sync failures
#[derive(Debug, Error)]
pub enum SyncError {
    /// Inbound listener could not be bound
    #[error("Failed to bind sync listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// Peer address did not resolve to any socket address
    #[error("Failed to resolve peer address {0}")]
    Resolve(String),
    /// Connection or write failure on the outbound channel
    #[error("Sync I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Message could not be encoded or decoded
    #[error("Malformed sync message: {0}")]
    Wire(#[from] serde_json::Error),
}

/// Baseline import failures
#[derive(Debug, Error)]
pub enum BaselineError {
    /// Seed file could not be read
    #[error("Baseline I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Seed file or API response could not be parsed
    #[error("Baseline parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Statistics API answered with an error status
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Statistics API answered but reported a failed request
    #[error("Statistics API request failed: {0}")]
    ApiStatus(String),
}

/// Unified error type for price_sync operations
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Baseline(#[from] BaselineError),
}

/// Result alias for price_sync operations
pub type Result<T> = std::result::Result<T, Error>;
