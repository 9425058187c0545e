//! The session orchestrator actor.
//!
//! One task owns all session state and processes, strictly one at a time:
//! - commands from the UI ([`OrchestratorHandle`])
//! - sign-in state changes from the [`AuthProvider`]
//! - timer signals (heartbeat, inactivity ladder, expiry countdown,
//!   contention retry)
//!
//! Everything the UI needs to render comes back as [`SessionEvent`]s.
//!
//! ```text
//! Unauthenticated --credentials--> Authenticating --valid + acquired--> Active
//!                                  Authenticating --invalid/error-----> Unauthenticated
//!                                  Authenticating --contended---------> LeaseContended
//! LeaseContended --retry--> Authenticating      --surface hidden--> Unauthenticated
//! Active --lost/expired/idle/logout/signed out--> Terminating --> Unauthenticated
//! ```

use crate::auth::{AuthProvider, AuthStateChange, Credentials};
use crate::config::SessionConfig;
use crate::countdown::{CountdownUpdate, ExpiryCountdown, expiry_message};
use crate::device::DeviceIdentity;
use crate::error::{SessionError, SessionResult};
use crate::inactivity::{ActivityKind, InactivityMonitor, InactivityNotice, InactivityWarning};
use crate::lease::{LeaseManager, LeaseOutcome, LossReason, RenewOutcome, SessionLease};
use crate::state::{ActiveSession, ClientSessionState, OrchestratorState, PendingRetry, SessionSnapshot};
use crate::timer::{Signal, SignalSender, TimerHandle, next_epoch};
use examgate_license::{LicenseBadge, LicenseEvaluator, LicenseStatus};
use examgate_store::DocumentStore;
use examgate_types::{Account, Clock, ceil_div};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 64;

const ACCESS_CHECK_FAILED: &str = "Could not verify your access. Check your connection and try again.";
const ALREADY_ACTIVE: &str = "There is already an active session on another device.";
const INACTIVITY_MESSAGE: &str = "Your session was closed due to inactivity.";
const SIGNED_OUT_MESSAGE: &str = "Your session was closed. Please log in again.";

/// Why an active session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogoutReason {
    UserRequested,
    TakenOver,
    RemovedElsewhere,
    Inactivity,
    LicenseExpired { trial: bool },
    SignedOutExternally,
}

impl LogoutReason {
    /// Message for a forced logout; `None` for a user-requested one.
    #[must_use]
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::UserRequested => None,
            Self::TakenOver => Some(LossReason::TakenOver.user_message()),
            Self::RemovedElsewhere => Some(LossReason::Removed.user_message()),
            Self::Inactivity => Some(INACTIVITY_MESSAGE),
            Self::LicenseExpired { trial } => Some(expiry_message(*trial)),
            Self::SignedOutExternally => Some(SIGNED_OUT_MESSAGE),
        }
    }
}

impl From<LossReason> for LogoutReason {
    fn from(reason: LossReason) -> Self {
        match reason {
            LossReason::TakenOver => Self::TakenOver,
            LossReason::Removed => Self::RemovedElsewhere,
        }
    }
}

/// Login progress shown under the login button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoginStep {
    VerifyingCredentials,
    CheckingLicense,
    CheckingSession,
}

/// Something the UI should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(OrchestratorState),
    Progress(LoginStep),
    /// Inline error on the login surface.
    LoginError { message: String },
    /// Dedicated "access expired" screen.
    ExpiryScreen { trial: bool, message: String },
    /// Another device holds the lease; a retry is scheduled.
    LeaseContended { seconds: u64, message: String },
    /// The session is live. `allowed_sections` is set in restricted mode.
    SessionLive {
        account: Account,
        restricted: bool,
        badge: Option<LicenseBadge>,
        allowed_sections: Option<Vec<String>>,
    },
    /// Expiry countdown text for the status indicator.
    Countdown { display: String },
    InactivityWarning(InactivityWarning),
    InactivityCountdown { seconds_left: u64 },
    WarningDismissed,
    /// The UI must clear its own progress and show `message`.
    ForceLogout { reason: LogoutReason, message: String },
    /// Restricted mode and session chrome must be removed.
    TornDown,
}

/// Commands accepted by the orchestrator.
#[derive(Debug)]
pub enum SessionCommand {
    SubmitCredentials(Credentials),
    Logout,
    Activity(ActivityKind),
    LoginSurfaceVisibility(bool),
    QueryState(oneshot::Sender<SessionSnapshot>),
    /// Stops the actor without releasing the lease, like closing the tab.
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle for sending commands to a running orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl OrchestratorHandle {
    async fn send(&self, command: SessionCommand) -> SessionResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    /// Submits the login form.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ChannelClosed` if the orchestrator has stopped.
    pub async fn submit_credentials(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> SessionResult<()> {
        self.send(SessionCommand::SubmitCredentials(Credentials::new(email, password)))
            .await
    }

    /// Ends the active session at the user's request.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ChannelClosed` if the orchestrator has stopped.
    pub async fn logout(&self) -> SessionResult<()> {
        self.send(SessionCommand::Logout).await
    }

    /// Reports local user activity.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ChannelClosed` if the orchestrator has stopped.
    pub async fn activity(&self, kind: ActivityKind) -> SessionResult<()> {
        self.send(SessionCommand::Activity(kind)).await
    }

    /// Reports whether the login surface is on screen.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ChannelClosed` if the orchestrator has stopped.
    pub async fn set_login_visible(&self, visible: bool) -> SessionResult<()> {
        self.send(SessionCommand::LoginSurfaceVisibility(visible))
            .await
    }

    /// Returns a snapshot taken after every earlier command was processed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ChannelClosed` if the orchestrator has stopped.
    pub async fn state(&self) -> SessionResult<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::QueryState(tx)).await?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Stops the orchestrator and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ChannelClosed` if it had already stopped.
    pub async fn shutdown(&self) -> SessionResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Shutdown(tx)).await?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }
}

/// How a login attempt started.
enum LoginEntry {
    Credentials(Credentials),
    /// The provider already had a signed-in user (reload).
    Restored(Account),
}

/// The session state machine. Start one with
/// [`spawn`](SessionOrchestrator::spawn).
pub struct SessionOrchestrator {
    config: SessionConfig,
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    evaluator: LicenseEvaluator,
    lease: LeaseManager,
    session: ClientSessionState,
    signals: SignalSender,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// Receivers the actor loop reads from.
struct Inboxes {
    commands: mpsc::Receiver<SessionCommand>,
    auth_changes: broadcast::Receiver<AuthStateChange>,
    signals: mpsc::UnboundedReceiver<Signal>,
}

impl SessionOrchestrator {
    /// Validates `config` and spawns the orchestrator task.
    ///
    /// Returns the command handle and the event stream.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if the configuration is invalid.
    pub fn spawn(
        config: SessionConfig,
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        device: DeviceIdentity,
    ) -> SessionResult<(OrchestratorHandle, mpsc::UnboundedReceiver<SessionEvent>)> {
        config.validate()?;
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (signals, signals_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let auth_changes = auth.subscribe();

        let orchestrator = Self {
            evaluator: LicenseEvaluator::new(config.trial_duration()),
            lease: LeaseManager::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                config.stale_threshold(),
            ),
            session: ClientSessionState::new(device),
            config,
            auth,
            store,
            clock,
            signals,
            events,
        };
        let inboxes = Inboxes {
            commands,
            auth_changes,
            signals: signals_rx,
        };
        tokio::spawn(orchestrator.run(inboxes));

        Ok((
            OrchestratorHandle {
                commands: commands_tx,
            },
            events_rx,
        ))
    }

    async fn run(mut self, mut inboxes: Inboxes) {
        info!(device = %self.session.device().id(), "session orchestrator started");
        if let Some(account) = self.auth.current_user() {
            info!(account = %account.id, "resuming signed-in user");
            self.authenticate(LoginEntry::Restored(account)).await;
        }
        let mut auth_open = true;
        loop {
            tokio::select! {
                command = inboxes.commands.recv() => {
                    let Some(command) = command else {
                        self.stop();
                        break;
                    };
                    if self.handle_command(command).await.is_break() {
                        break;
                    }
                }
                Some(signal) = inboxes.signals.recv() => self.handle_signal(signal).await,
                change = inboxes.auth_changes.recv(), if auth_open => match change {
                    Ok(change) => self.handle_auth_change(change).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth state notifications dropped");
                    }
                    Err(RecvError::Closed) => {
                        debug!("auth state stream closed");
                        auth_open = false;
                    }
                },
            }
        }
        info!("session orchestrator stopped");
    }

    // ── Inputs ───────────────────────────────────────────────────

    async fn handle_command(&mut self, command: SessionCommand) -> ControlFlow<()> {
        match command {
            SessionCommand::SubmitCredentials(credentials) => self.submit(credentials).await,
            SessionCommand::Logout => self.logout().await,
            SessionCommand::Activity(kind) => self.activity(kind),
            SessionCommand::LoginSurfaceVisibility(visible) => self.set_login_visible(visible),
            SessionCommand::QueryState(reply) => {
                let _ = reply.send(self.session.snapshot(self.clock.now()));
            }
            SessionCommand::Shutdown(ack) => {
                self.stop();
                let _ = ack.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Heartbeat { epoch } => self.heartbeat(epoch).await,
            Signal::Inactivity { .. } | Signal::InactivityTick { .. } => {
                self.inactivity(signal).await;
            }
            Signal::ExpiryTick { .. } => self.expiry_tick(signal).await,
            Signal::ContentionRetry { epoch } => self.retry(epoch).await,
        }
    }

    async fn handle_auth_change(&mut self, change: AuthStateChange) {
        match change {
            AuthStateChange::SignedIn(account) => {
                if self.session.state != OrchestratorState::Unauthenticated {
                    return;
                }
                let current = self.auth.current_user();
                if current.as_ref().map(|a| &a.id) != Some(&account.id) {
                    debug!(account = %account.id, "stale sign-in notification");
                    return;
                }
                info!(account = %account.id, "resuming signed-in user");
                self.authenticate(LoginEntry::Restored(account)).await;
            }
            AuthStateChange::SignedOut => {
                if self.session.state == OrchestratorState::Active
                    && self.auth.current_user().is_none()
                {
                    self.terminate(LogoutReason::SignedOutExternally).await;
                }
            }
        }
    }

    // ── Login ────────────────────────────────────────────────────

    async fn submit(&mut self, credentials: Credentials) {
        match self.session.state {
            OrchestratorState::Unauthenticated | OrchestratorState::LeaseContended => {}
            state => {
                debug!(%state, "credentials ignored");
                return;
            }
        }
        self.session.retry = None;
        if let Err(e) = credentials.validate() {
            self.login_failed(e.user_message());
            return;
        }
        self.authenticate(LoginEntry::Credentials(credentials)).await;
    }

    async fn authenticate(&mut self, entry: LoginEntry) {
        self.set_state(OrchestratorState::Authenticating);

        let account = match &entry {
            LoginEntry::Credentials(credentials) => {
                self.emit(SessionEvent::Progress(LoginStep::VerifyingCredentials));
                match self.auth.sign_in(credentials).await {
                    Ok(account) => account,
                    Err(e) => {
                        info!(email = credentials.email(), error = %e, "sign-in failed");
                        self.login_failed(e.user_message());
                        return;
                    }
                }
            }
            LoginEntry::Restored(account) => account.clone(),
        };

        self.emit(SessionEvent::Progress(LoginStep::CheckingLicense));
        let now = self.clock.now();
        let status = match self.evaluator.check(self.store.as_ref(), &account.id, now).await {
            Ok(status) => status,
            Err(e) => {
                warn!(account = %account.id, error = %e, "license check failed");
                self.sign_out_quietly().await;
                self.login_failed(ACCESS_CHECK_FAILED);
                return;
            }
        };
        if !status.is_valid() {
            self.reject_license(&account, &status).await;
            return;
        }

        self.emit(SessionEvent::Progress(LoginStep::CheckingSession));
        match self
            .lease
            .acquire_or_contend(&account, &self.session.device)
            .await
        {
            LeaseOutcome::Acquired(lease) => self.activate(account, status, lease),
            LeaseOutcome::Contended { remaining, .. } => {
                self.sign_out_quietly().await;
                match entry {
                    LoginEntry::Credentials(credentials) => self.contend(credentials, remaining),
                    LoginEntry::Restored(_) => self.login_failed(ALREADY_ACTIVE),
                }
            }
            LeaseOutcome::Failed(_) => {
                self.sign_out_quietly().await;
                self.login_failed(ACCESS_CHECK_FAILED);
            }
        }
    }

    async fn reject_license(&mut self, account: &Account, status: &LicenseStatus) {
        info!(account = %account.id, ?status, "license does not grant access");
        self.sign_out_quietly().await;
        self.set_state(OrchestratorState::Unauthenticated);
        let message = status.user_message().unwrap_or_default();
        if status.is_expired() {
            self.emit(SessionEvent::ExpiryScreen {
                trial: status.is_trial(),
                message,
            });
        } else {
            self.emit(SessionEvent::LoginError { message });
        }
    }

    fn contend(&mut self, credentials: Credentials, remaining: Duration) {
        let seconds = ceil_div(u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX), 1000);
        let message = format!(
            "There is an active session on another device. It will be released \
             automatically in {seconds} seconds, or log out manually from that device."
        );
        if !self.session.login_visible {
            self.login_failed(&message);
            return;
        }

        let epoch = next_epoch();
        let delay = remaining + self.config.contention_grace();
        info!(retry_in_ms = delay.as_millis(), "lease contended, retry scheduled");
        self.session.retry = Some(PendingRetry {
            credentials,
            epoch,
            _timer: TimerHandle::once(delay, self.signals.clone(), Signal::ContentionRetry { epoch }),
        });
        self.set_state(OrchestratorState::LeaseContended);
        self.emit(SessionEvent::LeaseContended { seconds, message });
    }

    async fn retry(&mut self, epoch: u64) {
        if self.session.state != OrchestratorState::LeaseContended {
            return;
        }
        let Some(retry) = self.session.retry.take_if(|r| r.epoch == epoch) else {
            return;
        };
        if !self.session.login_visible {
            self.set_state(OrchestratorState::Unauthenticated);
            return;
        }
        info!("retrying login after contention");
        self.authenticate(LoginEntry::Credentials(retry.credentials))
            .await;
    }

    fn set_login_visible(&mut self, visible: bool) {
        self.session.login_visible = visible;
        if !visible && self.session.retry.take().is_some() {
            info!("contention retry cancelled");
            if self.session.state == OrchestratorState::LeaseContended {
                self.set_state(OrchestratorState::Unauthenticated);
            }
        }
    }

    fn login_failed(&mut self, message: &str) {
        self.set_state(OrchestratorState::Unauthenticated);
        self.emit(SessionEvent::LoginError {
            message: message.to_string(),
        });
    }

    // ── Active session ───────────────────────────────────────────

    fn activate(&mut self, account: Account, license: LicenseStatus, lease: SessionLease) {
        let now = self.clock.now();
        let heartbeat_epoch = next_epoch();
        let heartbeat = TimerHandle::every(
            self.config.heartbeat_interval(),
            self.signals.clone(),
            Signal::Heartbeat {
                epoch: heartbeat_epoch,
            },
        );
        let inactivity =
            InactivityMonitor::start(self.config.inactivity_ladder(), self.signals.clone());
        let countdown = ExpiryCountdown::start(
            &license,
            now,
            self.config.countdown_window(),
            self.config.countdown_tick(),
            self.signals.clone(),
        );

        let restricted = license.is_restricted();
        let live = SessionEvent::SessionLive {
            account: account.clone(),
            restricted,
            badge: license.badge(),
            allowed_sections: restricted.then(|| self.config.restricted_sections.clone()),
        };
        let countdown_display = countdown
            .as_ref()
            .filter(|c| c.is_visible())
            .map(|c| c.display_at(now));

        info!(account = %account.id, restricted, "session active");
        self.session.active = Some(ActiveSession {
            account,
            license,
            lease,
            heartbeat_epoch,
            _heartbeat: heartbeat,
            inactivity,
            countdown,
            last_activity: now,
        });
        self.set_state(OrchestratorState::Active);
        self.emit(live);
        if let Some(display) = countdown_display {
            self.emit(SessionEvent::Countdown { display });
        }
    }

    async fn heartbeat(&mut self, epoch: u64) {
        let Some(active) = self
            .session
            .active
            .as_ref()
            .filter(|a| a.heartbeat_epoch == epoch)
        else {
            return;
        };
        let account = active.account.id.clone();
        match self.lease.renew(&account, self.session.device.id()).await {
            RenewOutcome::Renewed(lease) => {
                if let Some(active) = self.session.active.as_mut() {
                    active.lease = lease;
                }
            }
            RenewOutcome::Lost(reason) => self.terminate(reason.into()).await,
            RenewOutcome::Failed(_) => {}
        }
    }

    async fn inactivity(&mut self, signal: Signal) {
        let Some(active) = self.session.active.as_mut() else {
            return;
        };
        let Some(notice) = active.inactivity.handle(signal) else {
            return;
        };
        match notice {
            InactivityNotice::Warning(warning) => {
                self.emit(SessionEvent::InactivityWarning(warning));
            }
            InactivityNotice::CountdownTick { seconds_left } => {
                self.emit(SessionEvent::InactivityCountdown { seconds_left });
            }
            InactivityNotice::TimedOut => self.terminate(LogoutReason::Inactivity).await,
        }
    }

    async fn expiry_tick(&mut self, signal: Signal) {
        let now = self.clock.now();
        let Some(countdown) = self
            .session
            .active
            .as_mut()
            .and_then(|a| a.countdown.as_mut())
        else {
            return;
        };
        match countdown.handle(signal, now) {
            Some(CountdownUpdate::Tick { display, .. }) => {
                self.emit(SessionEvent::Countdown { display });
            }
            Some(CountdownUpdate::Expired { trial }) => {
                self.terminate(LogoutReason::LicenseExpired { trial }).await;
            }
            None => {}
        }
    }

    fn activity(&mut self, kind: ActivityKind) {
        let now = self.clock.now();
        let Some(active) = self.session.active.as_mut() else {
            return;
        };
        active.last_activity = now;
        if active.inactivity.record_activity(kind) {
            self.emit(SessionEvent::WarningDismissed);
        }
    }

    async fn logout(&mut self) {
        match self.session.state {
            OrchestratorState::Active => self.terminate(LogoutReason::UserRequested).await,
            OrchestratorState::LeaseContended => {
                self.session.retry = None;
                self.set_state(OrchestratorState::Unauthenticated);
            }
            state => debug!(%state, "logout ignored"),
        }
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Ends the active session. Local teardown always completes, whatever
    /// the store or provider do.
    async fn terminate(&mut self, reason: LogoutReason) {
        let Some(active) = self.session.active.take() else {
            return;
        };
        let account = active.account.clone();
        drop(active);
        self.session.retry = None;
        self.set_state(OrchestratorState::Terminating);
        info!(account = %account.id, ?reason, "ending session");

        if let Some(message) = reason.user_message() {
            self.emit(SessionEvent::ForceLogout {
                reason,
                message: message.to_string(),
            });
        }

        let outcome = self
            .lease
            .release(&account.id, self.session.device.id())
            .await;
        debug!(?outcome, "lease released during teardown");
        if reason != LogoutReason::SignedOutExternally {
            self.sign_out_quietly().await;
        }

        if let LogoutReason::LicenseExpired { trial } = reason {
            self.emit(SessionEvent::ExpiryScreen {
                trial,
                message: expiry_message(trial).to_string(),
            });
        }
        self.emit(SessionEvent::TornDown);
        self.set_state(OrchestratorState::Unauthenticated);
    }

    /// Drops every timer without touching the lease, so the lease goes
    /// stale on its own.
    fn stop(&mut self) {
        self.session.clear();
    }

    async fn sign_out_quietly(&self) {
        if let Err(e) = self.auth.sign_out().await {
            warn!(error = %e, "sign-out failed");
        }
    }

    // ── Output ───────────────────────────────────────────────────

    fn set_state(&mut self, state: OrchestratorState) {
        if self.session.state == state {
            return;
        }
        debug!(from = %self.session.state, to = %state, "state change");
        self.session.state = state;
        self.emit(SessionEvent::StateChanged(state));
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
