//! Authentication provider seam.

use async_trait::async_trait;
use examgate_types::Account;
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;

/// Result type for provider calls.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors reported by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("email or password missing")]
    MissingCredentials,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("too many requests")]
    TooManyRequests,

    #[error("network error: {0}")]
    Network(String),

    #[error("provider error: {0}")]
    Provider(String),
}

impl AuthError {
    /// Text shown inline on the login surface.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "Please enter your email and password.",
            Self::InvalidCredentials | Self::UserNotFound => "Incorrect email or password.",
            Self::TooManyRequests => "Too many attempts. Wait a few minutes.",
            Self::Network(_) => "Connection error. Check your internet.",
            Self::Provider(_) => "Could not sign in. Check your details.",
        }
    }

    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Email and password as typed on the login surface.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    /// Trims the email; the password is kept verbatim.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Rejects an empty email or password before any network call.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials`.
    pub fn validate(&self) -> AuthResult<()> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A change in the provider's signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStateChange {
    SignedIn(Account),
    SignedOut,
}

/// The external identity provider.
///
/// Implementations broadcast an [`AuthStateChange`] whenever the signed-in
/// user changes, including changes caused by this client's own calls.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Signs in and returns the account.
    async fn sign_in(&self, credentials: &Credentials) -> AuthResult<Account>;

    /// Signs the current user out.
    async fn sign_out(&self) -> AuthResult<()>;

    /// The currently signed-in account, if any.
    fn current_user(&self) -> Option<Account>;

    /// Subscribes to sign-in state changes.
    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange>;
}

/// In-memory provider for tests and simulations.
pub mod mock {
    use super::{AuthError, AuthProvider, AuthResult, AuthStateChange, Credentials};
    use async_trait::async_trait;
    use examgate_types::{Account, AccountId};
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex, MutexGuard};
    use tokio::sync::broadcast;

    #[derive(Default)]
    struct State {
        accounts: HashMap<String, (String, Account)>,
        current: Option<Account>,
        sign_in_failures: VecDeque<AuthError>,
        sign_out_failure: Option<AuthError>,
        sign_in_calls: u32,
        sign_out_calls: u32,
    }

    /// A provider backed by a fixed set of accounts.
    ///
    /// Each client should get its own instance: the signed-in user is
    /// per-client state.
    #[derive(Clone)]
    pub struct MockAuthProvider {
        state: Arc<Mutex<State>>,
        changes: broadcast::Sender<AuthStateChange>,
    }

    impl Default for MockAuthProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockAuthProvider {
        #[must_use]
        pub fn new() -> Self {
            let (changes, _) = broadcast::channel(64);
            Self {
                state: Arc::new(Mutex::new(State::default())),
                changes,
            }
        }

        /// Registers an account and returns it.
        pub fn add_account(&self, id: AccountId, email: &str, password: &str) -> Account {
            let account = Account::new(id, email);
            self.lock().accounts.insert(
                email.to_lowercase(),
                (password.to_string(), account.clone()),
            );
            account
        }

        /// Makes the next sign-in attempt fail with `error`. Calls queue up.
        pub fn fail_next_sign_in(&self, error: AuthError) {
            self.lock().sign_in_failures.push_back(error);
        }

        /// Makes every sign-out fail with `error` until cleared with `None`.
        pub fn fail_sign_out(&self, error: Option<AuthError>) {
            self.lock().sign_out_failure = error;
        }

        /// Signs the user out from outside this client, e.g. a revoked token.
        pub fn revoke(&self) {
            self.lock().current = None;
            let _ = self.changes.send(AuthStateChange::SignedOut);
        }

        /// Restores a persisted sign-in, as on a page reload.
        pub fn restore(&self, account: Account) {
            self.lock().current = Some(account.clone());
            let _ = self.changes.send(AuthStateChange::SignedIn(account));
        }

        #[must_use]
        pub fn sign_in_calls(&self) -> u32 {
            self.lock().sign_in_calls
        }

        #[must_use]
        pub fn sign_out_calls(&self) -> u32 {
            self.lock().sign_out_calls
        }

        fn lock(&self) -> MutexGuard<'_, State> {
            self.state.lock().unwrap_or_else(|e| e.into_inner())
        }
    }

    #[async_trait]
    impl AuthProvider for MockAuthProvider {
        async fn sign_in(&self, credentials: &Credentials) -> AuthResult<Account> {
            let account = {
                let mut state = self.lock();
                state.sign_in_calls += 1;
                if let Some(error) = state.sign_in_failures.pop_front() {
                    return Err(error);
                }
                let (password, account) = state
                    .accounts
                    .get(&credentials.email().to_lowercase())
                    .ok_or(AuthError::UserNotFound)?;
                if password != credentials.password() {
                    return Err(AuthError::InvalidCredentials);
                }
                let account = account.clone();
                state.current = Some(account.clone());
                account
            };
            let _ = self.changes.send(AuthStateChange::SignedIn(account.clone()));
            Ok(account)
        }

        async fn sign_out(&self) -> AuthResult<()> {
            {
                let mut state = self.lock();
                state.sign_out_calls += 1;
                if let Some(error) = state.sign_out_failure.clone() {
                    return Err(error);
                }
                state.current = None;
            }
            let _ = self.changes.send(AuthStateChange::SignedOut);
            Ok(())
        }

        fn current_user(&self) -> Option<Account> {
            self.lock().current.clone()
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
            self.changes.subscribe()
        }
    }
}
