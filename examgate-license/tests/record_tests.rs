mod common;

use common::{days, t0};
use examgate_license::{
    InvalidReason, License, LicenseEvaluator, LicenseKind, LicenseStatus,
};
use examgate_store::{Collection, JsonDirStore, MemoryStore};
use examgate_types::AccountId;
use pretty_assertions::assert_eq;
use serde_json::json;

fn account() -> AccountId {
    AccountId::parse("uid-1").unwrap()
}

// ── Wire format ──────────────────────────────────────────────────

#[test]
fn decodes_camel_case_document() {
    let license: License = serde_json::from_value(json!({
        "kind": "timeLimited",
        "createdAt": "2026-05-01T00:00:00Z",
        "expiresAt": "2026-06-01T00:00:00Z",
        "email": "a@example.com",
        "name": "Ana"
    }))
    .unwrap();
    assert_eq!(license.kind, LicenseKind::TimeLimited);
    assert!(license.created_at.is_some());
    assert!(license.expires_at.is_some());
    assert_eq!(license.email.as_deref(), Some("a@example.com"));
}

#[test]
fn missing_optional_fields_decode() {
    let license: License = serde_json::from_value(json!({ "kind": "trial" })).unwrap();
    assert_eq!(license.kind, LicenseKind::Trial);
    assert!(license.created_at.is_none());
}

#[test]
fn encode_skips_absent_fields() {
    let value = serde_json::to_value(License::perpetual()).unwrap();
    assert_eq!(value, json!({ "kind": "perpetual" }));
}

#[test]
fn with_email_sets_email() {
    let license = License::trial(t0()).with_email("b@example.com");
    assert_eq!(license.email.as_deref(), Some("b@example.com"));
}

// ── Store-backed check ───────────────────────────────────────────

#[tokio::test]
async fn check_reads_from_store() {
    let store = MemoryStore::new();
    store.seed(
        Collection::Licenses,
        &account(),
        serde_json::to_value(License::time_limited(t0() + days(10))).unwrap(),
    );
    let status = LicenseEvaluator::default()
        .check(&store, &account(), t0())
        .await
        .unwrap();
    assert!(matches!(status, LicenseStatus::ValidTimeLimited(_)));
}

#[tokio::test]
async fn check_missing_document() {
    let store = MemoryStore::new();
    let status = LicenseEvaluator::default()
        .check(&store, &account(), t0())
        .await
        .unwrap();
    assert_eq!(status, LicenseStatus::Invalid(InvalidReason::NoLicense));
}

#[tokio::test]
async fn check_undecodable_document_is_malformed() {
    let store = MemoryStore::new();
    store.seed(Collection::Licenses, &account(), json!({ "kind": "lifetime" }));
    let status = LicenseEvaluator::default()
        .check(&store, &account(), t0())
        .await
        .unwrap();
    assert_eq!(status, LicenseStatus::Invalid(InvalidReason::Malformed));
}

#[tokio::test]
async fn check_non_json_file_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirStore::open(dir.path()).unwrap();
    std::fs::write(
        store.document_path(Collection::Licenses, &account()),
        b"kind=perpetual",
    )
    .unwrap();
    let status = LicenseEvaluator::default()
        .check(&store, &account(), t0())
        .await
        .unwrap();
    assert_eq!(status, LicenseStatus::Invalid(InvalidReason::Malformed));
}

#[tokio::test]
async fn check_propagates_store_failure() {
    let store = MemoryStore::new();
    store.set_offline(true);
    let err = LicenseEvaluator::default()
        .check(&store, &account(), t0())
        .await
        .unwrap_err();
    assert!(err.is_network());
    assert!(format!("{err}").contains("license lookup failed"));
}
