//! Error types for the licensing module.

use examgate_store::StoreError;
use thiserror::Error;

/// Licensing-specific errors.
///
/// Business outcomes (missing, expired or malformed licenses) are
/// `LicenseStatus` values, not errors. Only failures to reach the record
/// end up here.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The license store could not be read.
    #[error("license lookup failed: {0}")]
    Store(#[from] StoreError),
}

impl LicenseError {
    /// Returns true if the failure was a connectivity problem.
    #[must_use]
    pub fn is_network(&self) -> bool {
        match self {
            Self::Store(e) => e.is_network(),
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
