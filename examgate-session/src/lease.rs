//! Single-device session lease.
//!
//! The lease lives in `sessions/{accountId}`. Ownership is decided with an
//! optimistic read-decide-write against a store that has no compare-and-swap:
//!
//! 1. read the current lease
//! 2. take it if it is absent, ours, or not renewed within the stale
//!    threshold; otherwise report contention
//! 3. write the new lease
//!
//! Two devices can pass step 2 at the same time and both write. The later
//! write wins and the other device finds out at its next renewal.

use crate::device::DeviceIdentity;
use chrono::{DateTime, Utc};
use examgate_store::{Collection, DocumentStore, StoreError, StoreResult, write_document};
use examgate_types::{Account, AccountId, Clock, DeviceId, millis_between};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The lease document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLease {
    pub owner_device_id: DeviceId,
    #[serde(default)]
    pub email: String,
    pub issued_at: DateTime<Utc>,
    /// A lease without a renewal time is treated as long abandoned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_renewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_label: Option<String>,
}

impl SessionLease {
    /// A fresh lease for `device`, issued and renewed at `now`.
    #[must_use]
    pub fn issue(device: &DeviceIdentity, email: &str, now: DateTime<Utc>) -> Self {
        Self {
            owner_device_id: device.id().clone(),
            email: email.to_string(),
            issued_at: now,
            last_renewed_at: Some(now),
            device_label: device.label().map(str::to_string),
        }
    }

    /// The same lease with its renewal time moved to `now`.
    #[must_use]
    pub fn renewed_at(mut self, now: DateTime<Utc>) -> Self {
        self.last_renewed_at = Some(now);
        self
    }

    #[must_use]
    pub fn is_owned_by(&self, device: &DeviceId) -> bool {
        &self.owner_device_id == device
    }

    /// Time since the last renewal. A renewal in the future counts as zero;
    /// a missing one as `None`.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        let renewed = self.last_renewed_at?;
        let ms = millis_between(renewed, now).max(0);
        Some(Duration::from_millis(u64::try_from(ms).unwrap_or(0)))
    }

    /// Time until the lease goes stale, zero if it already is.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>, stale_threshold: Duration) -> Duration {
        self.age_at(now)
            .map_or(Duration::ZERO, |age| stale_threshold.saturating_sub(age))
    }

    #[must_use]
    pub fn is_stale_at(&self, now: DateTime<Utc>, stale_threshold: Duration) -> bool {
        self.remaining_at(now, stale_threshold).is_zero()
    }
}

/// Progress of the most recent acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeasePhase {
    #[default]
    Idle,
    Checking,
    Acquired,
    Contended,
    Failed,
}

/// Result of [`LeaseManager::acquire_or_contend`].
#[derive(Debug)]
pub enum LeaseOutcome {
    /// The lease is now ours.
    Acquired(SessionLease),
    /// Another device holds a fresh lease.
    Contended {
        remaining: Duration,
        holder: SessionLease,
    },
    /// The store failed; nothing is known about the lease.
    Failed(StoreError),
}

/// How ownership was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LossReason {
    /// Another device wrote its own lease.
    TakenOver,
    /// The lease document was deleted.
    Removed,
}

impl LossReason {
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::TakenOver => "Your session was taken over by another device.",
            Self::Removed => "Your session was closed from another device.",
        }
    }
}

/// Result of [`LeaseManager::renew`].
#[derive(Debug)]
pub enum RenewOutcome {
    Renewed(SessionLease),
    Lost(LossReason),
    /// The store failed; ownership is unknown until the next renewal.
    Failed(StoreError),
}

/// Result of [`LeaseManager::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    NotOwner,
    Absent,
    /// The store failed; the error was logged.
    Failed,
}

/// Acquires, renews and releases leases against a document store.
pub struct LeaseManager {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    stale_threshold: Duration,
    phase: LeasePhase,
}

impl LeaseManager {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        stale_threshold: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            stale_threshold,
            phase: LeasePhase::Idle,
        }
    }

    #[must_use]
    pub fn phase(&self) -> LeasePhase {
        self.phase
    }

    #[must_use]
    pub fn stale_threshold(&self) -> Duration {
        self.stale_threshold
    }

    /// Reads the lease for `account`.
    ///
    /// A document that does not decode is logged and treated as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn inspect(&self, account: &AccountId) -> StoreResult<Option<SessionLease>> {
        let value = match self.store.get(Collection::Sessions, account).await {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(None),
            Err(e) if e.is_corrupt() => {
                warn!(%account, error = %e, "lease document is not JSON, treating as absent");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        match serde_json::from_value(value) {
            Ok(lease) => Ok(Some(lease)),
            Err(e) => {
                warn!(%account, error = %e, "lease document does not decode, treating as absent");
                Ok(None)
            }
        }
    }

    /// Takes the lease for `device`, or reports who holds it.
    pub async fn acquire_or_contend(
        &mut self,
        account: &Account,
        device: &DeviceIdentity,
    ) -> LeaseOutcome {
        self.phase = LeasePhase::Checking;
        let outcome = self.try_acquire(account, device).await;
        self.phase = match &outcome {
            LeaseOutcome::Acquired(_) => LeasePhase::Acquired,
            LeaseOutcome::Contended { .. } => LeasePhase::Contended,
            LeaseOutcome::Failed(_) => LeasePhase::Failed,
        };
        outcome
    }

    async fn try_acquire(&self, account: &Account, device: &DeviceIdentity) -> LeaseOutcome {
        let current = match self.inspect(&account.id).await {
            Ok(current) => current,
            Err(e) => {
                warn!(account = %account.id, error = %e, "lease read failed");
                return LeaseOutcome::Failed(e);
            }
        };

        let now = self.clock.now();
        if let Some(holder) = current {
            if !holder.is_owned_by(device.id()) {
                let remaining = holder.remaining_at(now, self.stale_threshold);
                if !remaining.is_zero() {
                    info!(
                        account = %account.id,
                        holder = %holder.owner_device_id,
                        remaining_ms = remaining.as_millis(),
                        "lease held by another device"
                    );
                    return LeaseOutcome::Contended { remaining, holder };
                }
                info!(
                    account = %account.id,
                    previous = %holder.owner_device_id,
                    "taking over stale lease"
                );
            }
        }

        let lease = SessionLease::issue(device, &account.email, now);
        match write_document(self.store.as_ref(), Collection::Sessions, &account.id, &lease).await
        {
            Ok(()) => {
                info!(account = %account.id, device = %device.id(), "lease acquired");
                LeaseOutcome::Acquired(lease)
            }
            Err(e) => {
                warn!(account = %account.id, error = %e, "lease write failed");
                LeaseOutcome::Failed(e)
            }
        }
    }

    /// Confirms ownership and moves `lastRenewedAt` to now.
    pub async fn renew(&self, account: &AccountId, device: &DeviceId) -> RenewOutcome {
        let lease = match self.inspect(account).await {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                info!(%account, "lease removed");
                return RenewOutcome::Lost(LossReason::Removed);
            }
            Err(e) => {
                warn!(%account, error = %e, "lease renewal read failed");
                return RenewOutcome::Failed(e);
            }
        };
        if !lease.is_owned_by(device) {
            info!(%account, owner = %lease.owner_device_id, "lease taken over");
            return RenewOutcome::Lost(LossReason::TakenOver);
        }

        let renewed = lease.renewed_at(self.clock.now());
        match write_document(self.store.as_ref(), Collection::Sessions, account, &renewed).await {
            Ok(()) => {
                debug!(%account, "lease renewed");
                RenewOutcome::Renewed(renewed)
            }
            Err(e) => {
                warn!(%account, error = %e, "lease renewal write failed");
                RenewOutcome::Failed(e)
            }
        }
    }

    /// Deletes the lease if `device` still owns it. Never fails.
    pub async fn release(&self, account: &AccountId, device: &DeviceId) -> ReleaseOutcome {
        let outcome = match self.inspect(account).await {
            Ok(None) => ReleaseOutcome::Absent,
            Ok(Some(lease)) if !lease.is_owned_by(device) => ReleaseOutcome::NotOwner,
            Ok(Some(_)) => match self.store.delete(Collection::Sessions, account).await {
                Ok(()) => ReleaseOutcome::Released,
                Err(e) => {
                    warn!(%account, error = %e, "lease delete failed");
                    ReleaseOutcome::Failed
                }
            },
            Err(e) => {
                warn!(%account, error = %e, "lease read before release failed");
                ReleaseOutcome::Failed
            }
        };
        debug!(%account, ?outcome, "lease release");
        outcome
    }
}
