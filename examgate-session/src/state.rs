//! In-memory state of one running client.

use crate::auth::Credentials;
use crate::countdown::ExpiryCountdown;
use crate::device::DeviceIdentity;
use crate::inactivity::{InactivityMonitor, InactivityStage};
use crate::lease::SessionLease;
use crate::timer::TimerHandle;
use chrono::{DateTime, Utc};
use examgate_license::LicenseStatus;
use examgate_types::{Account, DeviceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level state of the session orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrchestratorState {
    Unauthenticated,
    Authenticating,
    LeaseContended,
    Active,
    Terminating,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::LeaseContended => "lease-contended",
            Self::Active => "active",
            Self::Terminating => "terminating",
        })
    }
}

/// Everything that exists only while a session is live. Dropping it
/// cancels the heartbeat, the inactivity ladder and the expiry countdown.
#[derive(Debug)]
pub(crate) struct ActiveSession {
    pub account: Account,
    pub license: LicenseStatus,
    pub lease: SessionLease,
    pub heartbeat_epoch: u64,
    pub _heartbeat: TimerHandle,
    pub inactivity: InactivityMonitor,
    pub countdown: Option<ExpiryCountdown>,
    pub last_activity: DateTime<Utc>,
}

/// A login that will be retried once the contended lease goes stale.
#[derive(Debug)]
pub(crate) struct PendingRetry {
    pub credentials: Credentials,
    pub epoch: u64,
    pub _timer: TimerHandle,
}

/// Per-client state owned by the orchestrator.
#[derive(Debug)]
pub struct ClientSessionState {
    pub(crate) device: DeviceIdentity,
    pub(crate) state: OrchestratorState,
    pub(crate) login_visible: bool,
    pub(crate) active: Option<ActiveSession>,
    pub(crate) retry: Option<PendingRetry>,
}

impl ClientSessionState {
    /// Fresh state: unauthenticated with the login surface showing.
    #[must_use]
    pub fn new(device: DeviceIdentity) -> Self {
        Self {
            device,
            state: OrchestratorState::Unauthenticated,
            login_visible: true,
            active: None,
            retry: None,
        }
    }

    #[must_use]
    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    #[must_use]
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Drops the live session and any pending retry, cancelling their timers.
    pub(crate) fn clear(&mut self) {
        self.active = None;
        self.retry = None;
    }

    pub(crate) fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        let active = self.active.as_ref();
        SessionSnapshot {
            state: self.state,
            device_id: self.device.id().clone(),
            account: active.map(|a| a.account.clone()),
            license: active.map(|a| a.license.clone()),
            lease: active.map(|a| a.lease.clone()),
            restricted: active.is_some_and(|a| a.license.is_restricted()),
            inactivity: active.map(|a| a.inactivity.stage()),
            countdown: active
                .and_then(|a| a.countdown.as_ref())
                .filter(|c| c.is_visible())
                .map(|c| c.display_at(now)),
            last_activity: active.map(|a| a.last_activity),
            retry_pending: self.retry.is_some(),
            login_visible: self.login_visible,
        }
    }
}

/// Point-in-time view of a client, answered by `OrchestratorHandle::state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: OrchestratorState,
    pub device_id: DeviceId,
    pub account: Option<Account>,
    pub license: Option<LicenseStatus>,
    pub lease: Option<SessionLease>,
    pub restricted: bool,
    pub inactivity: Option<InactivityStage>,
    pub countdown: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
    pub retry_pending: bool,
    pub login_visible: bool,
}
