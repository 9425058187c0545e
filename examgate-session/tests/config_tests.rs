use examgate_session::{ConfigError, MAX_TRIAL_DURATION_MS, SessionConfig};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::time::Duration;

#[test]
fn defaults() {
    let config = SessionConfig::default();
    assert_eq!(config.stale_threshold(), Duration::from_secs(120));
    assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
    assert_eq!(config.contention_grace(), Duration::from_secs(3));
    assert_eq!(config.countdown_window(), Duration::from_secs(24 * 3600));
    assert_eq!(config.countdown_tick(), Duration::from_secs(1));
    assert_eq!(config.trial_duration(), Duration::from_secs(3 * 24 * 3600));
    assert_eq!(config.restricted_sections, vec!["iarsep2020", "iaroct2020"]);
    config.validate().unwrap();
}

#[test]
fn ladder_from_defaults() {
    let ladder = SessionConfig::default().inactivity_ladder();
    assert_eq!(ladder.first_warning, Duration::from_secs(20 * 60));
    assert_eq!(ladder.second_warning, Duration::from_secs(25 * 60));
    assert_eq!(ladder.final_countdown, Duration::from_secs(29 * 60));
    assert_eq!(ladder.timeout, Duration::from_secs(30 * 60));
    assert_eq!(ladder.countdown_seconds(), 60);
}

#[test]
fn rejects_zero_interval() {
    let config = SessionConfig {
        heartbeat_interval_ms: 0,
        ..Default::default()
    };
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("heartbeat_interval_ms")));
}

#[test]
fn rejects_oversized_trial() {
    let config: SessionConfig =
        serde_json::from_str(r#"{"trial_duration_ms": 9000000000000000}"#).unwrap();
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("trial_duration_ms")));

    let longest = SessionConfig {
        trial_duration_ms: MAX_TRIAL_DURATION_MS,
        ..Default::default()
    };
    assert!(longest.validate().is_ok());
}

#[test]
fn rejects_unordered_ladder() {
    let config = SessionConfig {
        second_warning_ms: 19 * 60 * 1000,
        ..Default::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("second_warning_ms"));
}

#[test]
fn load_partial_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "stale_threshold_ms": 60000, "restricted_sections": ["a"] }}"#).unwrap();

    let config = SessionConfig::load(file.path()).unwrap();
    assert_eq!(config.stale_threshold_ms, 60_000);
    assert_eq!(config.restricted_sections, vec!["a"]);
    assert_eq!(config.heartbeat_interval_ms, 30_000);
}

#[test]
fn load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = SessionConfig::load(&dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn load_invalid_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();
    let err = SessionConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn load_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "inactivity_timeout_ms": 1000 }}"#).unwrap();
    let err = SessionConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn serde_roundtrip_keeps_fields() {
    let config = SessionConfig {
        contention_grace_ms: 5_000,
        ..Default::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let parsed: SessionConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}
