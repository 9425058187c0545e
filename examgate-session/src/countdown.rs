//! Live countdown to license expiry.
//!
//! Every tick recomputes the remaining time from the absolute expiry and
//! the wall clock, so a suspended process or a clock change never leaves
//! the display drifting.

use crate::timer::{Signal, SignalSender, TimerHandle, next_epoch};
use chrono::{DateTime, Utc};
use examgate_license::LicenseStatus;
use examgate_types::millis_between;
use std::time::Duration;
use tracing::{debug, info};

/// Expiry-screen copy for a trial.
pub const TRIAL_EXPIRED_MESSAGE: &str = "Your trial period has ended.";
/// Expiry-screen copy for a paid license.
pub const LICENSE_EXPIRED_MESSAGE: &str = "Your license has expired.";

/// Expiry-screen copy for either license family.
#[must_use]
pub fn expiry_message(trial: bool) -> &'static str {
    if trial {
        TRIAL_EXPIRED_MESSAGE
    } else {
        LICENSE_EXPIRED_MESSAGE
    }
}

/// Formats milliseconds as `HH:MM:SS`, truncating partial seconds.
///
/// Hours are not wrapped, so 30 hours prints as `30:00:00`.
#[must_use]
pub fn format_hms(millis: u64) -> String {
    let total = millis / 1000;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    format!("{h:02}:{m:02}:{s:02}")
}

/// Result of a countdown tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownUpdate {
    /// New text for the status indicator.
    Tick { display: String, remaining: Duration },
    /// Time is up; the session must end.
    Expired { trial: bool },
}

/// Countdown for one active session.
///
/// While more than the display window is left, a single timer waits for
/// the window to open; from then on the countdown ticks every period.
#[derive(Debug)]
pub struct ExpiryCountdown {
    expires_at: DateTime<Utc>,
    trial: bool,
    epoch: u64,
    window: Duration,
    period: Duration,
    tx: SignalSender,
    visible: bool,
    tick: Option<TimerHandle>,
}

impl ExpiryCountdown {
    /// Starts a countdown for a license that expires.
    ///
    /// Returns `None` for perpetual and invalid licenses. A license with
    /// more than `window` left gets a hidden countdown that shows up once
    /// the window opens.
    pub fn start(
        status: &LicenseStatus,
        now: DateTime<Utc>,
        window: Duration,
        tick: Duration,
        tx: SignalSender,
    ) -> Option<Self> {
        let remaining = status.remaining()?;
        let mut countdown = Self {
            expires_at: remaining.expires_at(),
            trial: status.is_trial(),
            epoch: next_epoch(),
            window,
            period: tick,
            tx,
            visible: false,
            tick: None,
        };
        countdown.schedule(countdown.remaining_at(now));
        Some(countdown)
    }

    fn schedule(&mut self, left: Duration) {
        let signal = Signal::ExpiryTick { epoch: self.epoch };
        if left <= self.window {
            debug!(remaining_ms = left.as_millis(), "expiry countdown started");
            self.visible = true;
            self.tick = Some(TimerHandle::every(self.period, self.tx.clone(), signal));
        } else {
            let wait = left - self.window;
            debug!(wait_ms = wait.as_millis(), "expiry countdown armed");
            self.visible = false;
            self.tick = Some(TimerHandle::once(wait, self.tx.clone(), signal));
        }
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    #[must_use]
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// True until the countdown expires or is stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.tick.is_some()
    }

    /// True while the countdown is inside its window and should be shown.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible && self.is_running()
    }

    /// Time left at `now`, clamped at zero.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        let ms = millis_between(now, self.expires_at);
        Duration::from_millis(u64::try_from(ms).unwrap_or(0))
    }

    /// Display text at `now`.
    #[must_use]
    pub fn display_at(&self, now: DateTime<Utc>) -> String {
        let ms = u64::try_from(self.remaining_at(now).as_millis()).unwrap_or(u64::MAX);
        format_hms(ms)
    }

    /// Applies a tick at `now`. Stops itself once time is up.
    ///
    /// A hidden countdown whose window has opened starts ticking and
    /// reports its first display; one that woke early re-arms quietly.
    pub fn handle(&mut self, signal: Signal, now: DateTime<Utc>) -> Option<CountdownUpdate> {
        if !matches!(signal, Signal::ExpiryTick { epoch } if epoch == self.epoch) || !self.is_running()
        {
            return None;
        }
        let remaining = self.remaining_at(now);
        if remaining.is_zero() {
            self.tick = None;
            info!(expires_at = %self.expires_at, trial = self.trial, "license expired during session");
            return Some(CountdownUpdate::Expired { trial: self.trial });
        }
        if !self.visible {
            self.schedule(remaining);
            if !self.visible {
                return None;
            }
        }
        Some(CountdownUpdate::Tick {
            display: self.display_at(now),
            remaining,
        })
    }

    /// Cancels the tick.
    pub fn stop(&mut self) {
        self.tick = None;
    }
}
