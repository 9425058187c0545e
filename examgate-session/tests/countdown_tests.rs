mod common;

use chrono::Duration as ChronoDuration;
use common::t0;
use examgate_license::{License, LicenseEvaluator, LicenseStatus, Remaining};
use examgate_session::{
    CountdownUpdate, ExpiryCountdown, LICENSE_EXPIRED_MESSAGE, Signal, TRIAL_EXPIRED_MESSAGE,
    expiry_message, format_hms,
};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::sync::mpsc;

const DAY: Duration = Duration::from_secs(24 * 3600);
const TICK: Duration = Duration::from_secs(1);

fn time_limited(left: ChronoDuration) -> LicenseStatus {
    LicenseStatus::ValidTimeLimited(Remaining::until(t0() + left, t0()))
}

// ── Formatting ───────────────────────────────────────────────────

#[test]
fn format_hms_pads_and_truncates() {
    assert_eq!(format_hms(0), "00:00:00");
    assert_eq!(format_hms(999), "00:00:00");
    assert_eq!(format_hms(90_000), "00:01:30");
    assert_eq!(format_hms(3_661_000), "01:01:01");
    assert_eq!(format_hms(86_399_999), "23:59:59");
}

#[test]
fn format_hms_does_not_wrap_hours() {
    assert_eq!(format_hms(30 * 3_600_000), "30:00:00");
}

#[test]
fn expiry_copy_per_family() {
    assert_eq!(expiry_message(true), TRIAL_EXPIRED_MESSAGE);
    assert_eq!(expiry_message(false), LICENSE_EXPIRED_MESSAGE);
}

// ── Start conditions ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn hidden_outside_window_until_it_opens() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let status = time_limited(ChronoDuration::hours(25));
    let mut countdown = ExpiryCountdown::start(&status, t0(), DAY, TICK, tx).unwrap();
    assert!(countdown.is_running());
    assert!(!countdown.is_visible());

    let start = tokio::time::Instant::now();
    let signal = rx.recv().await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(3600));
    let opened = t0() + ChronoDuration::hours(1);
    assert_eq!(
        countdown.handle(signal, opened),
        Some(CountdownUpdate::Tick {
            display: "24:00:00".to_string(),
            remaining: DAY,
        })
    );
    assert!(countdown.is_visible());

    let signal = rx.recv().await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(3601));
    assert!(matches!(
        countdown.handle(signal, opened + ChronoDuration::seconds(1)),
        Some(CountdownUpdate::Tick { ref display, .. }) if display == "23:59:59"
    ));
}

#[tokio::test(start_paused = true)]
async fn early_wake_rearms_quietly() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let status = time_limited(ChronoDuration::hours(25));
    let mut countdown = ExpiryCountdown::start(&status, t0(), DAY, TICK, tx).unwrap();

    let signal = rx.recv().await.unwrap();
    // the wall clock was set back half an hour while waiting
    let behind = t0() + ChronoDuration::minutes(30);
    assert_eq!(countdown.handle(signal, behind), None);
    assert!(countdown.is_running());
    assert!(!countdown.is_visible());

    let start = tokio::time::Instant::now();
    let signal = rx.recv().await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(1800));
    assert!(countdown.handle(signal, t0() + ChronoDuration::hours(1)).is_some());
    assert!(countdown.is_visible());
}

#[tokio::test(start_paused = true)]
async fn started_at_window_edge() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let status = time_limited(ChronoDuration::hours(24));
    let countdown = ExpiryCountdown::start(&status, t0(), DAY, TICK, tx).unwrap();
    assert!(countdown.is_visible());
    assert!(!countdown.is_trial());
    assert_eq!(countdown.display_at(t0()), "24:00:00");
}

#[tokio::test(start_paused = true)]
async fn not_started_for_perpetual_or_invalid() {
    let (tx, _rx) = mpsc::unbounded_channel();
    assert!(
        ExpiryCountdown::start(&LicenseStatus::ValidPerpetual, t0(), DAY, TICK, tx.clone())
            .is_none()
    );
    let expired = LicenseStatus::Expired { expired_at: t0() };
    assert!(ExpiryCountdown::start(&expired, t0(), DAY, TICK, tx).is_none());
}

#[tokio::test(start_paused = true)]
async fn trial_countdown_is_flagged_as_trial() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let created = t0() - ChronoDuration::days(3) + ChronoDuration::hours(2);
    let status = LicenseEvaluator::default().evaluate(Some(&License::trial(created)), t0());
    let countdown = ExpiryCountdown::start(&status, t0(), DAY, TICK, tx).unwrap();
    assert!(countdown.is_trial());
    assert_eq!(countdown.expires_at(), t0() + ChronoDuration::hours(2));
    assert_eq!(countdown.display_at(t0()), "02:00:00");
}

// ── Ticking ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn ticks_until_expiry_then_stops() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let status = time_limited(ChronoDuration::seconds(3));
    let mut countdown = ExpiryCountdown::start(&status, t0(), DAY, TICK, tx).unwrap();

    let mut updates = Vec::new();
    for second in 1..=3 {
        let signal = rx.recv().await.unwrap();
        let now = t0() + ChronoDuration::seconds(second);
        updates.push(countdown.handle(signal, now).unwrap());
    }
    assert_eq!(
        updates,
        vec![
            CountdownUpdate::Tick {
                display: "00:00:02".to_string(),
                remaining: Duration::from_secs(2),
            },
            CountdownUpdate::Tick {
                display: "00:00:01".to_string(),
                remaining: Duration::from_secs(1),
            },
            CountdownUpdate::Expired { trial: false },
        ]
    );
    assert!(!countdown.is_running());

    // no further ticks are produced or honoured
    let late = Signal::ExpiryTick { epoch: 0 };
    assert!(countdown.handle(late, t0() + ChronoDuration::seconds(4)).is_none());
}

#[tokio::test(start_paused = true)]
async fn recomputes_from_absolute_expiry_after_clock_jump() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let status = time_limited(ChronoDuration::hours(2));
    let mut countdown = ExpiryCountdown::start(&status, t0(), DAY, TICK, tx).unwrap();

    let signal = rx.recv().await.unwrap();
    // the process slept for an hour between ticks
    let now = t0() + ChronoDuration::minutes(61);
    match countdown.handle(signal, now).unwrap() {
        CountdownUpdate::Tick { display, remaining } => {
            assert_eq!(display, "00:59:00");
            assert_eq!(remaining, Duration::from_secs(59 * 60));
        }
        other => panic!("expected a tick, got {other:?}"),
    }

    let signal = rx.recv().await.unwrap();
    let past_expiry = t0() + ChronoDuration::hours(3);
    assert_eq!(
        countdown.handle(signal, past_expiry),
        Some(CountdownUpdate::Expired { trial: false })
    );
}

#[tokio::test(start_paused = true)]
async fn signals_for_other_machines_are_ignored() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let status = time_limited(ChronoDuration::hours(1));
    let mut countdown = ExpiryCountdown::start(&status, t0(), DAY, TICK, tx).unwrap();
    assert!(countdown.handle(Signal::Heartbeat { epoch: 0 }, t0()).is_none());
    assert!(countdown.handle(Signal::ExpiryTick { epoch: 0 }, t0()).is_none());
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_ticks() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let status = time_limited(ChronoDuration::hours(1));
    let mut countdown = ExpiryCountdown::start(&status, t0(), DAY, TICK, tx).unwrap();
    countdown.stop();
    assert!(!countdown.is_running());

    let waited = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
    assert!(waited.is_err(), "tick arrived after stop");
}
