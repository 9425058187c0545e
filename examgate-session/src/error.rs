//! Error types for the session layer.

use crate::auth::AuthError;
use crate::config::ConfigError;
use examgate_license::LicenseError;
use examgate_store::StoreError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur in session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Authentication provider error.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Document store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// License lookup error.
    #[error("license error: {0}")]
    License(#[from] LicenseError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error (device identity file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The orchestrator task is gone.
    #[error("channel closed")]
    ChannelClosed,
}

impl SessionError {
    /// Returns true for failures caused by connectivity rather than data.
    #[must_use]
    pub fn is_network(&self) -> bool {
        match self {
            Self::Auth(e) => e.is_network(),
            Self::Store(e) => e.is_network(),
            Self::License(e) => e.is_network(),
            _ => false,
        }
    }
}
