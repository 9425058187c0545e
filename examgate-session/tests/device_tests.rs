use examgate_session::DeviceIdentity;
use examgate_types::DeviceId;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[test]
fn generated_ids_are_unique() {
    let a = DeviceIdentity::generate();
    let b = DeviceIdentity::generate();
    assert_ne!(a.id(), b.id());
    assert!(a.id().as_str().starts_with("dev_"));
}

#[test]
fn label_can_be_overridden() {
    let identity = DeviceIdentity::with_id(DeviceId::parse("dev_x").unwrap()).with_label("lab-3");
    assert_eq!(identity.label(), Some("lab-3"));
    assert_eq!(identity.id().as_str(), "dev_x");
}

#[test]
fn load_or_create_persists_identity() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("profile").join("device.json");

    let first = DeviceIdentity::load_or_create(&path).unwrap();
    assert!(path.exists());
    let second = DeviceIdentity::load_or_create(&path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn stored_file_is_camel_case_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("device.json");
    let identity = DeviceIdentity::load_or_create(&path).unwrap();

    let value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(value["id"], identity.id().as_str());
    assert!(value.get("createdAt").is_some());
}

#[test]
fn corrupt_identity_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("device.json");
    std::fs::write(&path, b"not json").unwrap();

    let err = DeviceIdentity::load_or_create(&path).unwrap_err();
    assert!(err.to_string().contains("serialization"), "{err}");
}

#[test]
fn default_path_lives_under_examgate() {
    if let Some(path) = DeviceIdentity::default_path() {
        assert!(path.ends_with("examgate/device.json"));
    }
}
