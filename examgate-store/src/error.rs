//! Error types for the document store.

use crate::document::Collection;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored document that is not valid JSON.
    #[error("corrupt document {collection}/{key}: {source}")]
    Corrupt {
        collection: Collection,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A key that cannot address a document.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    /// Returns true for failures caused by connectivity rather than data.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }

    /// Returns true when the backend is healthy but a document is unreadable.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}
