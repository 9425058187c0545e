//! Outcome of evaluating a license.

use chrono::{DateTime, Utc};
use examgate_types::{ceil_div, format_date, millis_between};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const HOUR_MS: u64 = 60 * 60 * 1000;
const DAY_MS: u64 = 24 * HOUR_MS;

/// Time-limited plans within this many days of expiry get a warning badge.
const EXPIRING_SOON_DAYS: u64 = 7;
/// Trials within this many hours of expiry get a warning badge.
const TRIAL_EXPIRING_SOON_HOURS: u64 = 24;

/// Why a license does not grant access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InvalidReason {
    /// No record exists for the account.
    NoLicense,
    /// A trial without an issuance instant.
    MisconfiguredTrial,
    /// A time-limited license without an expiry.
    MissingExpiry,
    /// The record could not be decoded.
    Malformed,
}

impl InvalidReason {
    /// Text shown inline on the login surface.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoLicense => "You don't have an active license. Contact us to get access.",
            Self::MisconfiguredTrial => "There is a problem with your trial license. Contact us.",
            Self::MissingExpiry => "Your license has no expiry date configured. Contact us.",
            Self::Malformed => "Your license could not be read. Contact us.",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoLicense => "no license",
            Self::MisconfiguredTrial => "misconfigured trial",
            Self::MissingExpiry => "missing expiry",
            Self::Malformed => "malformed license",
        })
    }
}

/// Time left on a license, anchored to its absolute expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remaining {
    expires_at: DateTime<Utc>,
    millis: u64,
}

impl Remaining {
    /// Computes the time from `now` until `expires_at`, clamped at zero.
    #[must_use]
    pub fn until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            expires_at,
            millis: Self::millis_left(expires_at, now),
        }
    }

    fn millis_left(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
        u64::try_from(millis_between(now, expires_at)).unwrap_or(0)
    }

    /// The absolute expiry instant.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Milliseconds left at evaluation time.
    #[must_use]
    pub fn millis(&self) -> u64 {
        self.millis
    }

    /// Time left at evaluation time.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.millis)
    }

    /// Days left, rounded up.
    #[must_use]
    pub fn days_ceil(&self) -> u64 {
        ceil_div(self.millis, DAY_MS)
    }

    /// Hours left, rounded up.
    #[must_use]
    pub fn hours_ceil(&self) -> u64 {
        ceil_div(self.millis, HOUR_MS)
    }

    /// Milliseconds left at `now`, recomputed from the absolute expiry.
    #[must_use]
    pub fn millis_at(&self, now: DateTime<Utc>) -> u64 {
        Self::millis_left(self.expires_at, now)
    }
}

/// Short status text for the persistent status indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseBadge {
    /// Badge text.
    pub text: String,
    /// True when the license is close enough to expiry to highlight.
    pub expiring_soon: bool,
}

/// The current status of a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LicenseStatus {
    /// No usable license.
    Invalid(InvalidReason),
    /// A trial past its derived expiry.
    ExpiredTrial {
        /// When the trial ended.
        expired_at: DateTime<Utc>,
    },
    /// A time-limited license past its expiry.
    Expired {
        /// When the license ended.
        expired_at: DateTime<Utc>,
    },
    /// Never expires.
    ValidPerpetual,
    /// Trial still running.
    ValidTrial(Remaining),
    /// Paid license still running.
    ValidTimeLimited(Remaining),
}

impl LicenseStatus {
    /// Returns true if the license grants access.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            Self::ValidPerpetual | Self::ValidTrial(_) | Self::ValidTimeLimited(_)
        )
    }

    /// Returns true for either expired variant.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::ExpiredTrial { .. } | Self::Expired { .. })
    }

    /// Returns true if the license belongs to a trial (running or ended).
    #[must_use]
    pub fn is_trial(&self) -> bool {
        matches!(self, Self::ValidTrial(_) | Self::ExpiredTrial { .. })
    }

    /// Returns true if premium features must be gated off.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::ValidTrial(_))
    }

    /// Remaining time, for licenses that expire and are still valid.
    #[must_use]
    pub fn remaining(&self) -> Option<&Remaining> {
        match self {
            Self::ValidTrial(r) | Self::ValidTimeLimited(r) => Some(r),
            _ => None,
        }
    }

    /// Expiry instant, for expired licenses.
    #[must_use]
    pub fn expired_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::ExpiredTrial { expired_at } | Self::Expired { expired_at } => Some(*expired_at),
            _ => None,
        }
    }

    /// Expiry date formatted for display, for expired licenses.
    #[must_use]
    pub fn formatted_expiry(&self) -> Option<String> {
        self.expired_at().map(format_date)
    }

    /// Text to show the user when the license does not grant access.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Invalid(reason) => Some(reason.user_message().to_string()),
            Self::ExpiredTrial { expired_at } => Some(format!(
                "Your trial period ended on {}.",
                format_date(*expired_at)
            )),
            Self::Expired { expired_at } => Some(format!(
                "Your license expired on {}.",
                format_date(*expired_at)
            )),
            _ => None,
        }
    }

    /// Status-indicator badge for valid licenses.
    #[must_use]
    pub fn badge(&self) -> Option<LicenseBadge> {
        match self {
            Self::ValidPerpetual => Some(LicenseBadge {
                text: "Lifetime access".to_string(),
                expiring_soon: false,
            }),
            Self::ValidTrial(r) => {
                let hours = r.hours_ceil();
                Some(LicenseBadge {
                    text: format!("TRIAL · {hours}h left"),
                    expiring_soon: hours <= TRIAL_EXPIRING_SOON_HOURS,
                })
            }
            Self::ValidTimeLimited(r) => {
                let days = r.days_ceil();
                if days <= EXPIRING_SOON_DAYS {
                    Some(LicenseBadge {
                        text: format!("Expires in {days}d"),
                        expiring_soon: true,
                    })
                } else {
                    Some(LicenseBadge {
                        text: format!("Valid until {}", format_date(r.expires_at())),
                        expiring_soon: false,
                    })
                }
            }
            _ => None,
        }
    }
}
