//! Error types for store operations.

use thiserror::Error;

/// Error type for persistent store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error while reading or writing a record.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized or deserialized.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
