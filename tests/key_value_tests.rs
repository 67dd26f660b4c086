//! Integration tests for the on-disk key-value store.

use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;
use trackkit::{KeyValueStore, StorageKey};

fn create_store() -> (KeyValueStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = KeyValueStore::new(dir.path()).unwrap();
    (store, dir)
}

// ============================================================================
// Typed accessors
// ============================================================================

#[test]
fn test_string_round_trip_uses_fixed_file_name() {
    let (store, dir) = create_store();

    store.set_string(StorageKey::DistinctId, "user-1");

    assert_eq!(store.get_string(StorageKey::DistinctId).as_deref(), Some("user-1"));
    assert!(dir.path().join("trackkit.distinctId").exists());
}

#[test]
fn test_number_and_bool_round_trips() {
    let (store, _dir) = create_store();

    store.set_number(StorageKey::SessionLastTimestamp, 1722600000.25);
    store.set_bool(StorageKey::OptOut, false);

    assert_eq!(
        store.get_number(StorageKey::SessionLastTimestamp),
        Some(1722600000.25)
    );
    assert_eq!(store.get_bool(StorageKey::OptOut), Some(false));
}

#[test]
fn test_dict_and_array_round_trips() {
    let (store, _dir) = create_store();

    let mut props = HashMap::new();
    props.insert("plan".to_string(), serde_json::json!("premium"));
    props.insert("seats".to_string(), serde_json::json!(4));
    store.set_dict(StorageKey::RegisteredProperties, &props);

    let read = store.get_dict(StorageKey::RegisteredProperties).unwrap();
    assert_eq!(read.get("plan"), Some(&serde_json::json!("premium")));
    assert_eq!(read.get("seats"), Some(&serde_json::json!(4)));

    let items = vec![serde_json::json!("a"), serde_json::json!(1)];
    store.set_array(StorageKey::Groups, &items);
    assert_eq!(store.get_array(StorageKey::Groups).unwrap(), items);
}

#[test]
fn test_type_mismatch_reads_as_absent() {
    let (store, _dir) = create_store();

    store.set_string(StorageKey::SessionId, "sess-1");

    assert!(store.get_number(StorageKey::SessionId).is_none());
    assert!(store.get_bool(StorageKey::SessionId).is_none());
    assert!(store.get_array(StorageKey::SessionId).is_none());
}

// ============================================================================
// On-disk shapes
// ============================================================================

#[test]
fn test_legacy_wrapped_scalar_accepted() {
    let (store, dir) = create_store();

    fs::write(
        dir.path().join("trackkit.anonymousId"),
        br#"{"trackkit.anonymousId": "anon-7"}"#,
    )
    .unwrap();
    fs::write(dir.path().join("trackkit.optOut"), br#"{"trackkit.optOut": true}"#).unwrap();

    assert_eq!(store.get_string(StorageKey::AnonymousId).as_deref(), Some("anon-7"));
    assert_eq!(store.get_bool(StorageKey::OptOut), Some(true));
}

#[test]
fn test_modern_writes_are_bare_scalars() {
    let (store, dir) = create_store();

    store.set_string(StorageKey::DistinctId, "user-1");

    let raw = fs::read_to_string(dir.path().join("trackkit.distinctId")).unwrap();
    assert_eq!(raw, "\"user-1\"");
}

#[test]
fn test_truncated_file_reads_as_absent() {
    let (store, dir) = create_store();

    fs::write(dir.path().join("trackkit.groups"), b"{\"company\":").unwrap();

    assert!(store.get_dict(StorageKey::Groups).is_none());
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_remove_then_reset() {
    let (store, _dir) = create_store();

    store.set_string(StorageKey::DistinctId, "user-1");
    store.set_bool(StorageKey::OptOut, true);

    store.remove(StorageKey::DistinctId);
    assert!(store.get_string(StorageKey::DistinctId).is_none());
    assert_eq!(store.get_bool(StorageKey::OptOut), Some(true));

    store.reset();
    assert!(store.get_bool(StorageKey::OptOut).is_none());
    assert!(store.root().exists());
}

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = KeyValueStore::new(dir.path()).unwrap();
        store.set_string(StorageKey::DistinctId, "user-1");
    }

    let reopened = KeyValueStore::new(dir.path()).unwrap();
    assert_eq!(reopened.get_string(StorageKey::DistinctId).as_deref(), Some("user-1"));
}

#[test]
fn test_queue_dir_defaults_under_root_and_persists() {
    let (store, dir) = create_store();

    let queue_dir = store.queue_dir();
    assert_eq!(queue_dir, dir.path().join("queue"));
    assert_eq!(
        store.get_string(StorageKey::QueueFolder).as_deref(),
        Some(queue_dir.to_string_lossy().as_ref())
    );

    // An explicit pointer wins.
    store.set_string(StorageKey::QueueFolder, "/tmp/elsewhere");
    assert_eq!(store.queue_dir(), std::path::PathBuf::from("/tmp/elsewhere"));
}
