use std::sync::Arc;
use veil_license::{DeviceIdentity, DeviceInfo, MachineIdentifier, NoPlatformIdentifier, PlatformIdentifier};
use veil_storage::{KeyValueStore, MemoryStore, keys};
use veil_types::{DeviceId, IdentityProvider};

struct FixedPlatform(&'static str);

impl PlatformIdentifier for FixedPlatform {
    fn platform_id(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

fn identity(platform: impl PlatformIdentifier + 'static) -> (DeviceIdentity, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let identity = DeviceIdentity::new(store.clone(), Arc::new(platform));
    (identity, store)
}

// ── DeviceInfo ────────────────────────────────────────────────────

#[test]
fn device_info_collection() {
    let info = DeviceInfo::collect();
    assert!(!info.os_name.is_empty());
    assert!(!info.arch.is_empty());
    assert!(!info.hostname.is_empty());
    assert!(info.model().contains(&info.arch));
}

#[test]
fn machine_identifier_is_stable() {
    let a = MachineIdentifier.platform_id();
    let b = MachineIdentifier.platform_id();
    assert_eq!(a, b);
    if let Some(id) = a {
        assert_eq!(id.len(), 36);
        assert_eq!(id, id.to_uppercase());
    }
}

// ── Resolution order ──────────────────────────────────────────────

#[test]
fn canonical_key_wins() {
    let (identity, store) = identity(FixedPlatform("PLATFORM"));
    store.set_string(keys::DEVICE_ID, "CANONICAL").unwrap();
    store.set_string(keys::LEGACY_DEVICE_ID, "LEGACY").unwrap();
    assert_eq!(identity.resolve().unwrap().as_str(), "CANONICAL");
}

#[test]
fn legacy_key_is_migrated() {
    let (identity, store) = identity(FixedPlatform("PLATFORM"));
    store.set_string(keys::LEGACY_DEVICE_ID, "LEGACY").unwrap();
    assert_eq!(identity.resolve().unwrap().as_str(), "LEGACY");
    assert_eq!(store.get_string(keys::DEVICE_ID).unwrap().as_deref(), Some("LEGACY"));
}

#[test]
fn platform_identifier_is_persisted() {
    let (identity, store) = identity(FixedPlatform("PLATFORM-ID"));
    assert_eq!(identity.resolve().unwrap().as_str(), "PLATFORM-ID");
    assert_eq!(store.get_string(keys::DEVICE_ID).unwrap().as_deref(), Some("PLATFORM-ID"));
}

#[test]
fn generated_identifier_is_persisted_once() {
    let (identity, store) = identity(NoPlatformIdentifier);
    let first = identity.resolve().unwrap();
    let second = identity.resolve().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.as_str().len(), 36);
    assert_eq!(store.get_string(keys::DEVICE_ID).unwrap().as_deref(), Some(first.as_str()));
}

#[test]
fn blank_stored_value_is_ignored() {
    let (identity, store) = identity(FixedPlatform("PLATFORM"));
    store.set_string(keys::DEVICE_ID, "  ").unwrap();
    assert_eq!(identity.resolve().unwrap().as_str(), "PLATFORM");
}

#[test]
fn identity_provider_matches_resolve() {
    let (identity, _) = identity(NoPlatformIdentifier);
    assert_eq!(identity.device_id(), identity.resolve().unwrap());
}

// ── Custom identifiers ────────────────────────────────────────────

#[test]
fn save_custom_overrides_and_sets_both_keys() {
    let (identity, store) = identity(FixedPlatform("PLATFORM"));
    identity.resolve().unwrap();
    assert!(!identity.has_custom().unwrap());

    identity.save_custom(&DeviceId::new("MY-UDID").unwrap()).unwrap();
    assert!(identity.has_custom().unwrap());
    assert_eq!(identity.resolve().unwrap().as_str(), "MY-UDID");
    assert_eq!(store.get_string(keys::LEGACY_DEVICE_ID).unwrap().as_deref(), Some("MY-UDID"));
}

#[test]
fn clear_custom_falls_back_to_platform() {
    let (identity, _) = identity(FixedPlatform("PLATFORM"));
    identity.save_custom(&DeviceId::new("MY-UDID").unwrap()).unwrap();
    identity.clear_custom().unwrap();
    assert!(!identity.has_custom().unwrap());
    assert_eq!(identity.resolve().unwrap().as_str(), "PLATFORM");
}
