//! Idle detection with staged warnings.
//!
//! The ladder runs relative to the last activity event:
//!
//! ```text
//! Quiet --first_warning--> Warned1 --second_warning--> Warned2
//!       --final_countdown--> FinalCountdown (visible per-second counter)
//!       --timeout--> LoggedOut
//! ```
//!
//! Any activity before `LoggedOut` returns to `Quiet` and re-arms every
//! timer from scratch. `LoggedOut` is reached at most once per monitor.

use crate::timer::{Signal, SignalSender, TimerHandle, next_epoch};
use examgate_types::ceil_div;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Where an idle episode currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InactivityStage {
    Quiet,
    Warned1,
    Warned2,
    FinalCountdown,
    LoggedOut,
}

impl InactivityStage {
    /// Returns true while a warning is on screen.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Warned1 | Self::Warned2 | Self::FinalCountdown)
    }
}

/// Local input that counts as user activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    PointerMove,
    KeyPress,
    Click,
    Touch,
    Scroll,
    /// The "keep using" button on a warning.
    KeepUsing,
}

/// Idle thresholds, each measured from the last activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityLadder {
    pub first_warning: Duration,
    pub second_warning: Duration,
    pub final_countdown: Duration,
    pub timeout: Duration,
}

impl InactivityLadder {
    /// Length of the visible final countdown, in whole seconds.
    #[must_use]
    pub fn countdown_seconds(&self) -> u64 {
        self.timeout.saturating_sub(self.final_countdown).as_secs()
    }

    fn steps(&self) -> [(Duration, InactivityStage); 4] {
        [
            (self.first_warning, InactivityStage::Warned1),
            (self.second_warning, InactivityStage::Warned2),
            (self.final_countdown, InactivityStage::FinalCountdown),
            (self.timeout, InactivityStage::LoggedOut),
        ]
    }

    fn warning(&self, stage: InactivityStage) -> Option<InactivityWarning> {
        let minutes = |d: Duration| d.as_secs() / 60;
        let minutes_left = |at: Duration| ceil_div(self.timeout.saturating_sub(at).as_secs(), 60);
        let warning = match stage {
            InactivityStage::Warned1 => InactivityWarning {
                stage,
                title: "Inactivity detected".to_string(),
                message: format!(
                    "You have been inactive for {} minutes. Your session will close \
                     automatically in {} minutes unless you do something.",
                    minutes(self.first_warning),
                    minutes_left(self.first_warning)
                ),
                countdown_seconds: None,
            },
            InactivityStage::Warned2 => InactivityWarning {
                stage,
                title: "Session about to close".to_string(),
                message: format!(
                    "You have been inactive for {} minutes. Your session will close in {} minutes.",
                    minutes(self.second_warning),
                    minutes_left(self.second_warning)
                ),
                countdown_seconds: None,
            },
            InactivityStage::FinalCountdown => InactivityWarning {
                stage,
                title: "Closing session".to_string(),
                message: "Your session will close due to inactivity in:".to_string(),
                countdown_seconds: Some(self.countdown_seconds()),
            },
            InactivityStage::Quiet | InactivityStage::LoggedOut => return None,
        };
        Some(warning)
    }
}

/// A warning to put on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InactivityWarning {
    pub stage: InactivityStage,
    pub title: String,
    pub message: String,
    /// Starting value of the visible counter, for the final warning.
    pub countdown_seconds: Option<u64>,
}

/// What the monitor wants the session to do after a timer fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InactivityNotice {
    Warning(InactivityWarning),
    CountdownTick { seconds_left: u64 },
    TimedOut,
}

/// Per-session idle state machine. Owns all of its timers.
#[derive(Debug)]
pub struct InactivityMonitor {
    ladder: InactivityLadder,
    tx: SignalSender,
    epoch: u64,
    stage: InactivityStage,
    last_activity: Instant,
    stage_timers: Vec<TimerHandle>,
    tick: Option<TimerHandle>,
    seconds_left: u64,
}

impl InactivityMonitor {
    /// Starts a fresh ladder from now.
    pub fn start(ladder: InactivityLadder, tx: SignalSender) -> Self {
        let mut monitor = Self {
            ladder,
            tx,
            epoch: 0,
            stage: InactivityStage::Quiet,
            last_activity: Instant::now(),
            stage_timers: Vec::new(),
            tick: None,
            seconds_left: 0,
        };
        monitor.arm();
        monitor
    }

    #[must_use]
    pub fn stage(&self) -> InactivityStage {
        self.stage
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Time since the last activity event.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Resets the ladder. Returns true if a visible warning was dismissed.
    pub fn record_activity(&mut self, kind: ActivityKind) -> bool {
        if self.stage == InactivityStage::LoggedOut {
            return false;
        }
        let dismissed = self.stage.is_warning();
        if dismissed {
            debug!(?kind, stage = ?self.stage, "inactivity warning dismissed");
        }
        self.stage = InactivityStage::Quiet;
        self.last_activity = Instant::now();
        self.arm();
        dismissed
    }

    /// Applies a timer signal. Signals from an older epoch are ignored.
    pub fn handle(&mut self, signal: Signal) -> Option<InactivityNotice> {
        if signal.epoch() != self.epoch || self.stage == InactivityStage::LoggedOut {
            return None;
        }
        match signal {
            Signal::Inactivity { stage, .. } => self.advance_to(stage),
            Signal::InactivityTick { .. } => self.countdown_tick(),
            _ => None,
        }
    }

    /// Cancels every pending timer without changing the stage.
    pub fn stop(&mut self) {
        self.stage_timers.clear();
        self.tick = None;
    }

    fn arm(&mut self) {
        self.stop();
        self.epoch = next_epoch();
        let epoch = self.epoch;
        self.stage_timers = self
            .ladder
            .steps()
            .into_iter()
            .map(|(delay, stage)| {
                TimerHandle::once(delay, self.tx.clone(), Signal::Inactivity { epoch, stage })
            })
            .collect();
    }

    fn advance_to(&mut self, stage: InactivityStage) -> Option<InactivityNotice> {
        self.stage = stage;
        match stage {
            InactivityStage::LoggedOut => {
                info!(idle_ms = self.idle_for().as_millis(), "inactivity timeout");
                self.stop();
                Some(InactivityNotice::TimedOut)
            }
            InactivityStage::FinalCountdown => {
                self.seconds_left = self.ladder.countdown_seconds();
                self.tick = Some(TimerHandle::every(
                    COUNTDOWN_TICK,
                    self.tx.clone(),
                    Signal::InactivityTick { epoch: self.epoch },
                ));
                debug!(seconds = self.seconds_left, "inactivity final countdown");
                self.ladder.warning(stage).map(InactivityNotice::Warning)
            }
            InactivityStage::Warned1 | InactivityStage::Warned2 => {
                debug!(?stage, "inactivity warning");
                self.ladder.warning(stage).map(InactivityNotice::Warning)
            }
            InactivityStage::Quiet => None,
        }
    }

    fn countdown_tick(&mut self) -> Option<InactivityNotice> {
        if self.stage != InactivityStage::FinalCountdown || self.seconds_left == 0 {
            return None;
        }
        self.seconds_left -= 1;
        if self.seconds_left == 0 {
            self.tick = None;
        }
        Some(InactivityNotice::CountdownTick {
            seconds_left: self.seconds_left,
        })
    }
}
