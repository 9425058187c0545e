//! License evaluation.
//!
//! Expiry rules:
//! - Perpetual: always valid
//! - TimeLimited: valid while `now <= expiresAt`
//! - Trial: valid while `now < createdAt + trial_duration`; the trial is
//!   over at the derived instant itself

use crate::error::LicenseResult;
use crate::record::{License, LicenseKind};
use crate::status::{InvalidReason, LicenseStatus, Remaining};
use chrono::{DateTime, Utc};
use examgate_store::{Collection, DocumentStore};
use examgate_types::{AccountId, to_chrono};
use std::time::Duration;
use tracing::{debug, warn};

/// Default trial length (3 days).
pub const DEFAULT_TRIAL_DURATION: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// Evaluates license records against the current time.
#[derive(Debug, Clone, Copy)]
pub struct LicenseEvaluator {
    trial_duration: Duration,
}

impl Default for LicenseEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_TRIAL_DURATION)
    }
}

impl LicenseEvaluator {
    /// Creates an evaluator with the given trial length.
    #[must_use]
    pub const fn new(trial_duration: Duration) -> Self {
        Self { trial_duration }
    }

    /// Returns the configured trial length.
    #[must_use]
    pub const fn trial_duration(&self) -> Duration {
        self.trial_duration
    }

    /// Derived expiry of a trial issued at `created_at`, or `None` when it
    /// falls outside the representable date range.
    #[must_use]
    pub fn trial_expiry(&self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        created_at.checked_add_signed(to_chrono(self.trial_duration))
    }

    /// Evaluates a license (or its absence) at `now`.
    #[must_use]
    pub fn evaluate(&self, license: Option<&License>, now: DateTime<Utc>) -> LicenseStatus {
        let Some(license) = license else {
            return LicenseStatus::Invalid(InvalidReason::NoLicense);
        };

        match license.kind {
            LicenseKind::Perpetual => LicenseStatus::ValidPerpetual,
            LicenseKind::Trial => {
                let Some(created_at) = license.created_at else {
                    return LicenseStatus::Invalid(InvalidReason::MisconfiguredTrial);
                };
                let Some(expires_at) = self.trial_expiry(created_at) else {
                    warn!(%created_at, "trial expiry out of range");
                    return LicenseStatus::Invalid(InvalidReason::MisconfiguredTrial);
                };
                if now >= expires_at {
                    LicenseStatus::ExpiredTrial {
                        expired_at: expires_at,
                    }
                } else {
                    LicenseStatus::ValidTrial(Remaining::until(expires_at, now))
                }
            }
            LicenseKind::TimeLimited => {
                let Some(expires_at) = license.expires_at else {
                    return LicenseStatus::Invalid(InvalidReason::MissingExpiry);
                };
                if now > expires_at {
                    LicenseStatus::Expired {
                        expired_at: expires_at,
                    }
                } else {
                    LicenseStatus::ValidTimeLimited(Remaining::until(expires_at, now))
                }
            }
        }
    }

    /// Reads `licenses/{account}` and evaluates it at `now`.
    ///
    /// A document that is not JSON, or does not decode as a license, is
    /// reported as `Invalid(Malformed)`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    pub async fn check(
        &self,
        store: &dyn DocumentStore,
        account: &AccountId,
        now: DateTime<Utc>,
    ) -> LicenseResult<LicenseStatus> {
        let document = match store.get(Collection::Licenses, account).await {
            Ok(document) => document,
            Err(e) if e.is_corrupt() => {
                warn!(%account, error = %e, "license record is not JSON");
                return Ok(LicenseStatus::Invalid(InvalidReason::Malformed));
            }
            Err(e) => return Err(e.into()),
        };
        let license = match document.map(serde_json::from_value::<License>) {
            None => None,
            Some(Ok(license)) => Some(license),
            Some(Err(e)) => {
                warn!(%account, error = %e, "license record does not decode");
                return Ok(LicenseStatus::Invalid(InvalidReason::Malformed));
            }
        };
        let status = self.evaluate(license.as_ref(), now);
        debug!(%account, ?status, "license evaluated");
        Ok(status)
    }
}

