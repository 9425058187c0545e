//! A wall clock that follows the tokio timer.
//!
//! Inside a runtime with paused time, `tokio::time::advance` moves this
//! clock together with every scheduled timer, so expiry and staleness
//! decisions line up with timer firings.

use chrono::{DateTime, Utc};
use examgate_types::{Clock, to_chrono};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Wall-clock time derived from the tokio clock plus an adjustable skew.
#[derive(Clone)]
pub struct TokioClock {
    anchor: DateTime<Utc>,
    started: Instant,
    skew: Arc<Mutex<chrono::Duration>>,
}

impl TokioClock {
    /// Creates a clock anchored at the current system time.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Creates a clock that reads `anchor` now and advances with tokio time.
    #[must_use]
    pub fn starting_at(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            started: Instant::now(),
            skew: Arc::new(Mutex::new(chrono::Duration::zero())),
        }
    }

    /// Shifts the wall clock without moving tokio time, like a user
    /// changing the system clock or a laptop waking from sleep.
    pub fn jump(&self, by: chrono::Duration) {
        let mut skew = self.skew.lock().unwrap_or_else(|e| e.into_inner());
        *skew += by;
    }

    fn skew(&self) -> chrono::Duration {
        *self.skew.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        self.anchor + to_chrono(self.started.elapsed()) + self.skew()
    }
}

impl fmt::Debug for TokioClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioClock")
            .field("now", &self.now())
            .finish_non_exhaustive()
    }
}
