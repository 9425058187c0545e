//! Device identity used to prove lease ownership.
//!
//! An identity is generated once per profile and persisted so that a
//! restarted client recognises its own lease.

use crate::error::SessionResult;
use chrono::{DateTime, Utc};
use examgate_types::DeviceId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const IDENTITY_FILE: &str = "device.json";

/// This client's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    id: DeviceId,
    /// Host name, recorded in the lease for operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    created_at: DateTime<Utc>,
}

impl DeviceIdentity {
    /// Generates a new identity for this machine.
    #[must_use]
    pub fn generate() -> Self {
        Self::with_id(DeviceId::generate())
    }

    /// Wraps an existing id, labelled with this machine's host name.
    #[must_use]
    pub fn with_id(id: DeviceId) -> Self {
        Self {
            id,
            label: host_label(),
            created_at: Utc::now(),
        }
    }

    /// Replaces the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Loads the identity stored at `path`, or generates and stores one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded,
    /// or if a new identity cannot be written.
    pub fn load_or_create(path: &Path) -> SessionResult<Self> {
        if path.exists() {
            let bytes = std::fs::read(path)?;
            let identity: Self = serde_json::from_slice(&bytes)?;
            info!(device = %identity.id, path = %path.display(), "loaded device identity");
            return Ok(identity);
        }

        let identity = Self::generate();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(&identity)?)?;
        info!(device = %identity.id, path = %path.display(), "generated device identity");
        Ok(identity)
    }

    /// Default location of the identity file in the user's local data dir.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("examgate").join(IDENTITY_FILE))
    }
}

/// This machine's host name, if it can be read.
#[must_use]
pub fn host_label() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}
