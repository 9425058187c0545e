//! The stored license document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of license, which decides how expiry is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LicenseKind {
    /// Short free trial; expiry derived from `createdAt`.
    Trial,
    /// Paid access until an explicit `expiresAt`.
    TimeLimited,
    /// Paid access that never expires.
    Perpetual,
}

impl LicenseKind {
    /// Returns true if this kind runs in restricted mode.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::Trial)
    }
}

/// A license record as stored in `licenses/{accountId}`.
///
/// Every timestamp is optional on the wire so that incomplete records
/// decode and can be reported as invalid instead of failing outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    /// License kind.
    pub kind: LicenseKind,
    /// Issuance instant. Required for trials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Explicit expiry. Required for time-limited licenses, ignored otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Email the license was issued to (informational).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Holder's display name (informational).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl License {
    fn with_kind(kind: LicenseKind) -> Self {
        Self {
            kind,
            created_at: None,
            expires_at: None,
            email: None,
            name: None,
        }
    }

    /// A trial issued at `created_at`.
    #[must_use]
    pub fn trial(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(created_at),
            ..Self::with_kind(LicenseKind::Trial)
        }
    }

    /// A paid license valid until `expires_at`.
    #[must_use]
    pub fn time_limited(expires_at: DateTime<Utc>) -> Self {
        Self {
            expires_at: Some(expires_at),
            ..Self::with_kind(LicenseKind::TimeLimited)
        }
    }

    /// A license that never expires.
    #[must_use]
    pub fn perpetual() -> Self {
        Self::with_kind(LicenseKind::Perpetual)
    }

    /// Sets the informational email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
