//! Identifier types used throughout examgate.
//!
//! Account ids are issued by the identity provider and are opaque to us.
//! They double as document keys, so they must be non-empty and free of
//! path separators.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix of every generated device identifier.
const DEVICE_PREFIX: &str = "dev_";

fn check_key(kind: &str, s: &str) -> Result<(), Error> {
    if s.trim().is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if s.contains(['/', '\\']) || s == "." || s == ".." {
        return Err(Error::InvalidId(format!(
            "{kind} contains a path separator: {s}"
        )));
    }
    Ok(())
}

/// Identifier of an account, assigned by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Parses an account id, rejecting values that cannot be used as a
    /// document key.
    pub fn parse(s: &str) -> Result<Self, Error> {
        check_key("account id", s)?;
        Ok(Self(s.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Opaque token identifying one client instance.
///
/// Carries no meaning beyond equality: a lease is owned by whichever
/// device id was written into it last.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Generates a fresh device id (`dev_` followed by a time-ordered UUID).
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{DEVICE_PREFIX}{}", Uuid::now_v7().simple()))
    }

    /// Wraps an existing device id string.
    pub fn parse(s: &str) -> Result<Self, Error> {
        check_key("device id", s)?;
        Ok(Self(s.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
