mod common;

use common::minutes;
use examgate_session::{
    ActivityKind, InactivityLadder, InactivityMonitor, InactivityNotice, InactivityStage,
    SessionConfig, Signal,
};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

fn ladder() -> InactivityLadder {
    SessionConfig::default().inactivity_ladder()
}

/// Feeds timer signals to the monitor until `deadline`, collecting the
/// notices it produces and the elapsed time of each.
async fn pump_until(
    monitor: &mut InactivityMonitor,
    rx: &mut mpsc::UnboundedReceiver<Signal>,
    start: Instant,
    deadline: Instant,
) -> Vec<(Duration, InactivityNotice)> {
    let mut out = Vec::new();
    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            biased;
            Some(signal) = rx.recv() => {
                if let Some(notice) = monitor.handle(signal) {
                    out.push((start.elapsed(), notice));
                }
            }
            () = &mut sleep => break,
        }
    }
    out
}

fn stages(notices: &[(Duration, InactivityNotice)]) -> Vec<(Duration, InactivityStage)> {
    notices
        .iter()
        .filter_map(|(at, notice)| match notice {
            InactivityNotice::Warning(w) => Some((*at, w.stage)),
            InactivityNotice::TimedOut => Some((*at, InactivityStage::LoggedOut)),
            InactivityNotice::CountdownTick { .. } => None,
        })
        .collect()
}

// ── Ladder ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn ladder_fires_each_stage_once_on_schedule() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let start = Instant::now();
    let mut monitor = InactivityMonitor::start(ladder(), tx);
    assert_eq!(monitor.stage(), InactivityStage::Quiet);

    let notices = pump_until(&mut monitor, &mut rx, start, start + minutes(120)).await;
    assert_eq!(
        stages(&notices),
        vec![
            (minutes(20), InactivityStage::Warned1),
            (minutes(25), InactivityStage::Warned2),
            (minutes(29), InactivityStage::FinalCountdown),
            (minutes(30), InactivityStage::LoggedOut),
        ]
    );
    assert_eq!(monitor.stage(), InactivityStage::LoggedOut);
}

#[tokio::test(start_paused = true)]
async fn final_countdown_ticks_each_second() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let start = Instant::now();
    let mut monitor = InactivityMonitor::start(ladder(), tx);

    let notices = pump_until(&mut monitor, &mut rx, start, start + minutes(31)).await;
    let ticks: Vec<u64> = notices
        .iter()
        .filter_map(|(_, n)| match n {
            InactivityNotice::CountdownTick { seconds_left } => Some(*seconds_left),
            _ => None,
        })
        .collect();
    // the last tick may race the timeout at the same instant
    assert!(ticks.len() >= 59 && ticks.len() <= 60, "{} ticks", ticks.len());
    assert_eq!(ticks[0], 59);
    assert!(ticks.windows(2).all(|w| w[1] == w[0] - 1));

    let final_warning = notices.iter().find_map(|(_, n)| match n {
        InactivityNotice::Warning(w) if w.stage == InactivityStage::FinalCountdown => Some(w),
        _ => None,
    });
    assert_eq!(final_warning.unwrap().countdown_seconds, Some(60));
}

#[tokio::test(start_paused = true)]
async fn warning_copy_states_remaining_minutes() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let start = Instant::now();
    let mut monitor = InactivityMonitor::start(ladder(), tx);

    let notices = pump_until(&mut monitor, &mut rx, start, start + minutes(26)).await;
    let messages: Vec<String> = notices
        .into_iter()
        .filter_map(|(_, n)| match n {
            InactivityNotice::Warning(w) => Some(w.message),
            _ => None,
        })
        .collect();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("inactive for 20 minutes"));
    assert!(messages[0].contains("in 10 minutes"));
    assert!(messages[1].contains("inactive for 25 minutes"));
    assert!(messages[1].contains("in 5 minutes"));
}

// ── Activity ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn activity_at_24_minutes_restarts_ladder() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let start = Instant::now();
    let mut monitor = InactivityMonitor::start(ladder(), tx);

    let before = pump_until(&mut monitor, &mut rx, start, start + minutes(24)).await;
    assert_eq!(stages(&before), vec![(minutes(20), InactivityStage::Warned1)]);

    assert!(monitor.record_activity(ActivityKind::PointerMove));
    assert_eq!(monitor.stage(), InactivityStage::Quiet);

    let quiet = pump_until(
        &mut monitor,
        &mut rx,
        start,
        start + minutes(44) - Duration::from_secs(1),
    )
    .await;
    assert!(quiet.is_empty(), "unexpected notices: {quiet:?}");

    let after = pump_until(&mut monitor, &mut rx, start, start + minutes(45)).await;
    assert_eq!(stages(&after), vec![(minutes(44), InactivityStage::Warned1)]);
}

#[tokio::test(start_paused = true)]
async fn activity_mid_countdown_dismisses_and_resets() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let start = Instant::now();
    let mut monitor = InactivityMonitor::start(ladder(), tx);

    pump_until(&mut monitor, &mut rx, start, start + minutes(29) + Duration::from_secs(30)).await;
    assert_eq!(monitor.stage(), InactivityStage::FinalCountdown);

    assert!(monitor.record_activity(ActivityKind::KeepUsing));
    let after = pump_until(&mut monitor, &mut rx, start, start + minutes(49)).await;
    assert!(after.is_empty(), "unexpected notices: {after:?}");
    assert_eq!(monitor.stage(), InactivityStage::Quiet);
}

#[tokio::test(start_paused = true)]
async fn activity_while_quiet_reports_nothing_dismissed() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut monitor = InactivityMonitor::start(ladder(), tx);
    let epoch = monitor.epoch();
    assert!(!monitor.record_activity(ActivityKind::KeyPress));
    assert_ne!(monitor.epoch(), epoch);
}

#[tokio::test(start_paused = true)]
async fn stale_epoch_signals_are_ignored() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut monitor = InactivityMonitor::start(ladder(), tx);
    let old = monitor.epoch();
    monitor.record_activity(ActivityKind::Scroll);

    let stale = Signal::Inactivity {
        epoch: old,
        stage: InactivityStage::LoggedOut,
    };
    assert!(monitor.handle(stale).is_none());
    assert_eq!(monitor.stage(), InactivityStage::Quiet);
}

#[tokio::test(start_paused = true)]
async fn logged_out_is_terminal() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let start = Instant::now();
    let mut monitor = InactivityMonitor::start(ladder(), tx);
    pump_until(&mut monitor, &mut rx, start, start + minutes(31)).await;
    assert_eq!(monitor.stage(), InactivityStage::LoggedOut);

    assert!(!monitor.record_activity(ActivityKind::Click));
    assert_eq!(monitor.stage(), InactivityStage::LoggedOut);
    let timeout_again = Signal::Inactivity {
        epoch: monitor.epoch(),
        stage: InactivityStage::LoggedOut,
    };
    assert!(monitor.handle(timeout_again).is_none());

    let later = pump_until(&mut monitor, &mut rx, start, start + minutes(120)).await;
    assert!(later.is_empty());
}

#[test]
fn custom_ladder_countdown_length() {
    let ladder = InactivityLadder {
        first_warning: Duration::from_secs(60),
        second_warning: Duration::from_secs(120),
        final_countdown: Duration::from_secs(150),
        timeout: Duration::from_secs(180),
    };
    assert_eq!(ladder.countdown_seconds(), 30);
}
