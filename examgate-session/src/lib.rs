//! Session lease and access-control engine for examgate.
//!
//! A client may hold at most one live session per account across devices,
//! and only while its license grants access. This crate wires the pieces
//! together:
//!
//! - **Lease**: optimistic single-owner lease in `sessions/{accountId}`,
//!   renewed by heartbeat and reclaimed by staleness
//! - **Inactivity**: staged idle warnings ending in a forced logout
//! - **Countdown**: live display of the time left on an expiring license
//! - **Orchestrator**: the actor that sequences login, contention, the
//!   active session and teardown
//!
//! # Example
//!
//! ```no_run
//! use examgate_session::{DeviceIdentity, SessionConfig, SessionOrchestrator, TokioClock};
//! use examgate_session::mock::MockAuthProvider;
//! use examgate_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn demo() -> examgate_session::SessionResult<()> {
//! let (handle, mut events) = SessionOrchestrator::spawn(
//!     SessionConfig::default(),
//!     Arc::new(MockAuthProvider::new()),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(TokioClock::new()),
//!     DeviceIdentity::generate(),
//! )?;
//! handle.submit_credentials("ana@example.com", "secret").await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod auth;
mod clock;
mod config;
mod countdown;
mod device;
mod error;
mod inactivity;
mod lease;
mod orchestrator;
mod state;
mod timer;

pub use auth::{AuthError, AuthProvider, AuthResult, AuthStateChange, Credentials, mock};
pub use clock::TokioClock;
pub use config::{ConfigError, MAX_TRIAL_DURATION_MS, SessionConfig};
pub use countdown::{
    CountdownUpdate, ExpiryCountdown, LICENSE_EXPIRED_MESSAGE, TRIAL_EXPIRED_MESSAGE,
    expiry_message, format_hms,
};
pub use device::{DeviceIdentity, host_label};
pub use error::{SessionError, SessionResult};
pub use inactivity::{
    ActivityKind, InactivityLadder, InactivityMonitor, InactivityNotice, InactivityStage,
    InactivityWarning,
};
pub use lease::{
    LeaseManager, LeaseOutcome, LeasePhase, LossReason, ReleaseOutcome, RenewOutcome,
    SessionLease,
};
pub use orchestrator::{
    LogoutReason, LoginStep, OrchestratorHandle, SessionCommand, SessionEvent,
    SessionOrchestrator,
};
pub use state::{ClientSessionState, OrchestratorState, SessionSnapshot};
pub use timer::{Signal, SignalSender, TimerHandle, next_epoch};
