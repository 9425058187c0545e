use examgate_types::{AccountId, DeviceId};
use std::collections::HashSet;
use std::str::FromStr;

// ── AccountId ────────────────────────────────────────────────────

#[test]
fn account_id_parse_and_display() {
    let id = AccountId::parse("uid-4f2a").unwrap();
    assert_eq!(id.as_str(), "uid-4f2a");
    assert_eq!(id.to_string(), "uid-4f2a");
}

#[test]
fn account_id_from_str() {
    let id: AccountId = AccountId::from_str("abc").unwrap();
    assert_eq!(id, AccountId::parse("abc").unwrap());
}

#[test]
fn account_id_rejects_empty() {
    assert!(AccountId::parse("").is_err());
    assert!(AccountId::parse("   ").is_err());
}

#[test]
fn account_id_rejects_path_separators() {
    assert!(AccountId::parse("a/b").is_err());
    assert!(AccountId::parse("a\\b").is_err());
    assert!(AccountId::parse("..").is_err());
}

#[test]
fn account_id_serde_is_transparent() {
    let id = AccountId::parse("user-1").unwrap();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, r#""user-1""#);
    let parsed: AccountId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

// ── DeviceId ─────────────────────────────────────────────────────

#[test]
fn device_id_generate_has_prefix() {
    let id = DeviceId::generate();
    assert!(id.as_str().starts_with("dev_"));
    assert!(id.as_str().len() > 4);
}

#[test]
fn device_id_generate_is_unique() {
    let ids: HashSet<DeviceId> = (0..64).map(|_| DeviceId::generate()).collect();
    assert_eq!(ids.len(), 64);
}

#[test]
fn device_id_parse_roundtrip() {
    let id = DeviceId::generate();
    let parsed = DeviceId::parse(id.as_str()).unwrap();
    assert_eq!(parsed, id);
    assert_eq!(DeviceId::from_str(&id.to_string()).unwrap(), id);
}

#[test]
fn device_id_parse_invalid() {
    assert!(DeviceId::parse("").is_err());
    assert!(DeviceId::parse("x/y").is_err());
}
