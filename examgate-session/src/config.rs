//! Session timing configuration.

use crate::inactivity::InactivityLadder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;

/// Longest accepted trial (ten years).
pub const MAX_TRIAL_DURATION_MS: u64 = 3650 * DAY_MS;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Timing and gating knobs for the session engine.
///
/// All durations are in milliseconds. Missing fields in a config file keep
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// A lease not renewed for this long may be taken over (ms).
    pub stale_threshold_ms: u64,
    /// Lease renewal cadence while a session is active (ms).
    pub heartbeat_interval_ms: u64,
    /// Extra wait added to the contention retry (ms).
    pub contention_grace_ms: u64,
    /// Idle time before the first warning (ms).
    pub first_warning_ms: u64,
    /// Idle time before the second warning (ms).
    pub second_warning_ms: u64,
    /// Idle time before the visible final countdown (ms).
    pub final_countdown_ms: u64,
    /// Idle time before the forced logout (ms).
    pub inactivity_timeout_ms: u64,
    /// Remaining license time under which the expiry countdown is shown (ms).
    pub countdown_window_ms: u64,
    /// Expiry countdown refresh period (ms).
    pub countdown_tick_ms: u64,
    /// Trial length measured from the trial's `createdAt` (ms).
    pub trial_duration_ms: u64,
    /// Sections a restricted (trial) session may open.
    pub restricted_sections: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stale_threshold_ms: 120_000,
            heartbeat_interval_ms: 30_000,
            contention_grace_ms: 3_000,
            first_warning_ms: 20 * MINUTE_MS,
            second_warning_ms: 25 * MINUTE_MS,
            final_countdown_ms: 29 * MINUTE_MS,
            inactivity_timeout_ms: 30 * MINUTE_MS,
            countdown_window_ms: 24 * HOUR_MS,
            countdown_tick_ms: 1_000,
            trial_duration_ms: 3 * 24 * HOUR_MS,
            restricted_sections: vec!["iarsep2020".to_string(), "iaroct2020".to_string()],
        }
    }
}

impl SessionConfig {
    /// Loads a configuration file, filling absent fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// result fails [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every interval is positive, the trial length is bounded
    /// and the inactivity thresholds are strictly increasing.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("stale_threshold_ms", self.stale_threshold_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("first_warning_ms", self.first_warning_ms),
            ("countdown_tick_ms", self.countdown_tick_ms),
            ("trial_duration_ms", self.trial_duration_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }

        if self.trial_duration_ms > MAX_TRIAL_DURATION_MS {
            return Err(ConfigError::Invalid(format!(
                "trial_duration_ms ({}) must not exceed {MAX_TRIAL_DURATION_MS}",
                self.trial_duration_ms
            )));
        }

        let ladder = [
            ("first_warning_ms", self.first_warning_ms),
            ("second_warning_ms", self.second_warning_ms),
            ("final_countdown_ms", self.final_countdown_ms),
            ("inactivity_timeout_ms", self.inactivity_timeout_ms),
        ];
        for pair in ladder.windows(2) {
            let (lower_name, lower) = pair[0];
            let (upper_name, upper) = pair[1];
            if upper <= lower {
                return Err(ConfigError::Invalid(format!(
                    "{upper_name} ({upper}) must be greater than {lower_name} ({lower})"
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_millis(self.stale_threshold_ms)
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    #[must_use]
    pub fn contention_grace(&self) -> Duration {
        Duration::from_millis(self.contention_grace_ms)
    }

    #[must_use]
    pub fn countdown_window(&self) -> Duration {
        Duration::from_millis(self.countdown_window_ms)
    }

    #[must_use]
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    #[must_use]
    pub fn trial_duration(&self) -> Duration {
        Duration::from_millis(self.trial_duration_ms)
    }

    /// The inactivity thresholds as a ladder.
    #[must_use]
    pub fn inactivity_ladder(&self) -> InactivityLadder {
        InactivityLadder {
            first_warning: Duration::from_millis(self.first_warning_ms),
            second_warning: Duration::from_millis(self.second_warning_ms),
            final_countdown: Duration::from_millis(self.final_countdown_ms),
            timeout: Duration::from_millis(self.inactivity_timeout_ms),
        }
    }
}
