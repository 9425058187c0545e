//! Cancellable timers that post signals into an actor inbox.
//!
//! A timer never touches session state itself. It sends a [`Signal`]
//! tagged with the epoch of the machine instance that scheduled it; the
//! receiver drops signals whose epoch is no longer current. Dropping a
//! [`TimerHandle`] aborts the task, so a machine cancels its timers by
//! dropping the handles it owns.

use crate::inactivity::InactivityStage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// Returns a process-wide unique epoch.
pub fn next_epoch() -> u64 {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

/// Sender half of a signal inbox.
pub type SignalSender = mpsc::UnboundedSender<Signal>;

/// A timer firing, delivered to the owning state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The inactivity ladder reached `stage`.
    Inactivity { epoch: u64, stage: InactivityStage },
    /// One second of the final inactivity countdown elapsed.
    InactivityTick { epoch: u64 },
    /// Expiry countdown refresh.
    ExpiryTick { epoch: u64 },
    /// Lease renewal is due.
    Heartbeat { epoch: u64 },
    /// The contention retry wait is over.
    ContentionRetry { epoch: u64 },
}

impl Signal {
    /// The epoch the signal was scheduled under.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        match self {
            Self::Inactivity { epoch, .. }
            | Self::InactivityTick { epoch }
            | Self::ExpiryTick { epoch }
            | Self::Heartbeat { epoch }
            | Self::ContentionRetry { epoch } => *epoch,
        }
    }
}

/// Owns a scheduled timer task. Dropping the handle cancels it.
#[derive(Debug)]
#[must_use = "dropping a TimerHandle cancels the timer"]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Sends `signal` once after `delay`.
    pub fn once(delay: Duration, tx: SignalSender, signal: Signal) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(signal);
        });
        Self { task }
    }

    /// Sends `signal` every `period`, starting one period from now, until
    /// the handle is dropped or the inbox closes.
    pub fn every(period: Duration, tx: SignalSender, signal: Signal) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(signal).is_err() {
                    break;
                }
            }
        });
        Self { task }
    }

    /// Returns true once the task has completed or been aborted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
