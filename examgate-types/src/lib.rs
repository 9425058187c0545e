//! Core type definitions for examgate.
//!
//! This crate defines the small set of types shared by every other crate:
//! - Account and device identifiers
//! - The authenticated `Account` as reported by the identity provider
//! - The `Clock` abstraction over wall-clock time
//! - Date formatting and millisecond arithmetic helpers
//!
//! License records and session leases live in their own crates; nothing
//! here knows about storage or timers.

mod account;
mod clock;
mod ids;
mod timestamp;

pub use account::Account;
pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{AccountId, DeviceId};
pub use timestamp::{ceil_div, format_date, millis_between, to_chrono};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
