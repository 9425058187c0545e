//! Shared fixtures for session tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use examgate_license::License;
use examgate_session::mock::MockAuthProvider;
use examgate_session::{
    DeviceIdentity, OrchestratorHandle, SessionConfig, SessionEvent, SessionLease,
    SessionOrchestrator, TokioClock,
};
use examgate_store::{Collection, MemoryStore};
use examgate_types::{Account, AccountId, DeviceId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const EMAIL: &str = "ana@example.com";
pub const PASSWORD: &str = "correct horse";

/// Longest a test waits (in virtual time) for an event.
const EVENT_DEADLINE: Duration = Duration::from_secs(6 * 3600);

/// Installs a log subscriber once; `RUST_LOG` controls the filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap()
}

pub fn account() -> AccountId {
    AccountId::parse("uid-ana").unwrap()
}

pub fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

pub fn seed_license(store: &MemoryStore, license: License) {
    store.seed(
        Collection::Licenses,
        &account(),
        serde_json::to_value(license).unwrap(),
    );
}

pub fn stored_lease(store: &MemoryStore) -> Option<SessionLease> {
    store
        .snapshot(Collection::Sessions, &account())
        .map(|v| serde_json::from_value(v).unwrap())
}

/// Writes a lease owned by some other device, renewed at `renewed_at`.
pub fn seed_foreign_lease(store: &MemoryStore, renewed_at: DateTime<Utc>) -> DeviceId {
    let other = DeviceIdentity::with_id(DeviceId::parse("dev_other").unwrap());
    let lease = SessionLease::issue(&other, EMAIL, renewed_at);
    store.seed(
        Collection::Sessions,
        &account(),
        serde_json::to_value(lease).unwrap(),
    );
    other.id().clone()
}

/// One simulated browser.
pub struct Client {
    pub handle: OrchestratorHandle,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub auth: MockAuthProvider,
    pub device: DeviceIdentity,
}

impl Client {
    pub fn spawn(store: &MemoryStore, clock: &TokioClock) -> Self {
        Self::spawn_with(store, clock, SessionConfig::default())
    }

    pub fn spawn_with(store: &MemoryStore, clock: &TokioClock, config: SessionConfig) -> Self {
        let auth = MockAuthProvider::new();
        auth.add_account(account(), EMAIL, PASSWORD);
        Self::spawn_with_auth(store, clock, config, auth)
    }

    /// A reloaded page: the provider already holds a saved sign-in when
    /// the orchestrator starts.
    pub fn spawn_signed_in(store: &MemoryStore, clock: &TokioClock) -> Self {
        let auth = MockAuthProvider::new();
        auth.add_account(account(), EMAIL, PASSWORD);
        auth.restore(Account::new(account(), EMAIL));
        Self::spawn_with_auth(store, clock, SessionConfig::default(), auth)
    }

    fn spawn_with_auth(
        store: &MemoryStore,
        clock: &TokioClock,
        config: SessionConfig,
        auth: MockAuthProvider,
    ) -> Self {
        init_tracing();
        let device = DeviceIdentity::generate().with_label("test-host");
        let (handle, events) = SessionOrchestrator::spawn(
            config,
            Arc::new(auth.clone()),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            device.clone(),
        )
        .unwrap();
        Self {
            handle,
            events,
            auth,
            device,
        }
    }

    /// Receives events until one matches, discarding the rest.
    pub async fn wait_for(&mut self, mut matches: impl FnMut(&SessionEvent) -> bool) -> SessionEvent {
        let search = async {
            loop {
                let event = self.events.recv().await.expect("event stream closed");
                if matches(&event) {
                    return event;
                }
            }
        };
        tokio::time::timeout(EVENT_DEADLINE, search)
            .await
            .expect("timed out waiting for event")
    }

    /// Submits the default credentials and waits for the session to go live.
    pub async fn login(&mut self) -> SessionEvent {
        self.handle.submit_credentials(EMAIL, PASSWORD).await.unwrap();
        self.wait_for(|e| matches!(e, SessionEvent::SessionLive { .. }))
            .await
    }

    /// Submits the default credentials and waits for the first outcome.
    pub async fn attempt_login(&mut self) -> SessionEvent {
        self.handle.submit_credentials(EMAIL, PASSWORD).await.unwrap();
        self.wait_for(is_login_outcome).await
    }

    /// Events already queued, without waiting.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

pub fn is_login_outcome(event: &SessionEvent) -> bool {
    matches!(
        event,
        SessionEvent::SessionLive { .. }
            | SessionEvent::LoginError { .. }
            | SessionEvent::ExpiryScreen { .. }
            | SessionEvent::LeaseContended { .. }
    )
}
