//! License records and access evaluation for examgate.
//!
//! This module handles:
//! - Decoding `licenses/{accountId}` documents
//! - Deriving expiry for trial, time-limited and perpetual licenses
//! - Remaining-time arithmetic for badges and countdowns
//!
//! # Design Principles
//!
//! - **Pure evaluation**: `LicenseEvaluator::evaluate` is a function of the
//!   record and the current instant, nothing else
//! - **Invalid, not fatal**: a missing, incomplete or undecodable record
//!   yields `LicenseStatus::Invalid`, never an error
//! - **Read-only**: records are issued elsewhere; this crate never writes
//!   them
//!
//! # Record Format
//!
//! ```json
//! { "kind": "timeLimited", "createdAt": "2026-01-01T00:00:00Z",
//!   "expiresAt": "2026-02-01T00:00:00Z", "email": "a@example.com" }
//! ```
//!
//! Trials never store `expiresAt`; it is `createdAt` plus the configured
//! trial duration.

mod error;
mod evaluator;
mod record;
mod status;

pub use error::{LicenseError, LicenseResult};
pub use evaluator::{DEFAULT_TRIAL_DURATION, LicenseEvaluator};
pub use record::{License, LicenseKind};
pub use status::{InvalidReason, LicenseBadge, LicenseStatus, Remaining};
