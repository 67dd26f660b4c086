//! Typed on-disk key-value store backing identity and flag state.
//!
//! One JSON file per key under a caller-owned root directory. Scalars are
//! written as bare JSON values; readers also accept the legacy shape where a
//! scalar is wrapped in a one-entry object keyed by the key's own file name.
//! An unparseable file reads as absent.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ErrorCode, Result, TrackKitError};

/// The closed set of persisted keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    DistinctId,
    AnonymousId,
    QueueFolder,
    EnabledFlags,
    EnabledFlagPayloads,
    Groups,
    SessionId,
    SessionLastTimestamp,
    RegisteredProperties,
    OptOut,
}

impl StorageKey {
    pub const ALL: [StorageKey; 10] = [
        StorageKey::DistinctId,
        StorageKey::AnonymousId,
        StorageKey::QueueFolder,
        StorageKey::EnabledFlags,
        StorageKey::EnabledFlagPayloads,
        StorageKey::Groups,
        StorageKey::SessionId,
        StorageKey::SessionLastTimestamp,
        StorageKey::RegisteredProperties,
        StorageKey::OptOut,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            StorageKey::DistinctId => "trackkit.distinctId",
            StorageKey::AnonymousId => "trackkit.anonymousId",
            StorageKey::QueueFolder => "trackkit.queueFolder",
            StorageKey::EnabledFlags => "trackkit.enabledFeatureFlags",
            StorageKey::EnabledFlagPayloads => "trackkit.enabledFeatureFlagPayloads",
            StorageKey::Groups => "trackkit.groups",
            StorageKey::SessionId => "trackkit.sessionId",
            StorageKey::SessionLastTimestamp => "trackkit.sessionLastTimestamp",
            StorageKey::RegisteredProperties => "trackkit.registeredProperties",
            StorageKey::OptOut => "trackkit.optOut",
        }
    }
}

/// File-per-key JSON store.
///
/// The root directory must be owned by exactly one instance. Read errors
/// surface as absent values; write errors are logged and swallowed.
pub struct KeyValueStore {
    root: PathBuf,
}

impl KeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            TrackKitError::with_source(
                ErrorCode::StorageCreateError,
                format!("failed to create storage directory: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for the event queue, resolved from the queue-folder key.
    ///
    /// Defaults to `<root>/queue`, persisting the default on first use.
    pub fn queue_dir(&self) -> PathBuf {
        if let Some(path) = self.get_string(StorageKey::QueueFolder) {
            return PathBuf::from(path);
        }
        let dir = self.root.join("queue");
        self.set_string(StorageKey::QueueFolder, &dir.to_string_lossy());
        dir
    }

    pub fn get_string(&self, key: StorageKey) -> Option<String> {
        self.scalar(key)?.as_str().map(str::to_owned)
    }

    pub fn set_string(&self, key: StorageKey, value: &str) {
        self.write_value(key, Value::String(value.to_owned()));
    }

    pub fn get_number(&self, key: StorageKey) -> Option<f64> {
        self.scalar(key)?.as_f64()
    }

    pub fn set_number(&self, key: StorageKey, value: f64) {
        match serde_json::Number::from_f64(value) {
            Some(number) => self.write_value(key, Value::Number(number)),
            None => tracing::warn!(key = key.file_name(), "refusing to store non-finite number"),
        }
    }

    pub fn get_bool(&self, key: StorageKey) -> Option<bool> {
        self.scalar(key)?.as_bool()
    }

    pub fn set_bool(&self, key: StorageKey, value: bool) {
        self.write_value(key, Value::Bool(value));
    }

    pub fn get_dict(&self, key: StorageKey) -> Option<HashMap<String, Value>> {
        match self.read_value(key)? {
            Value::Object(map) => Some(map.into_iter().collect()),
            _ => None,
        }
    }

    pub fn set_dict(&self, key: StorageKey, dict: &HashMap<String, Value>) {
        self.write_value(key, Value::Object(dict.clone().into_iter().collect()));
    }

    pub fn get_array(&self, key: StorageKey) -> Option<Vec<Value>> {
        match self.read_value(key)? {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn set_array(&self, key: StorageKey, items: &[Value]) {
        self.write_value(key, Value::Array(items.to_vec()));
    }

    pub fn remove(&self, key: StorageKey) {
        let path = self.path(key);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove {}: {}", path.display(), e);
            }
        }
    }

    /// Wipe every key and recreate the root directory.
    pub fn reset(&self) {
        if let Err(e) = fs::remove_dir_all(&self.root) {
            tracing::warn!("failed to reset storage {}: {}", self.root.display(), e);
        }
        if let Err(e) = fs::create_dir_all(&self.root) {
            tracing::warn!(
                "failed to recreate storage {}: {}",
                self.root.display(),
                e
            );
        }
    }

    fn path(&self, key: StorageKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    fn read_value(&self, key: StorageKey) -> Option<Value> {
        let bytes = fs::read(self.path(key)).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Scalar read accepting both the bare shape and the legacy one-entry
    /// object `{ "<file name>": value }`.
    fn scalar(&self, key: StorageKey) -> Option<Value> {
        let value = self.read_value(key)?;
        if let Value::Object(map) = &value {
            if map.len() == 1 {
                if let Some(inner) = map.get(key.file_name()) {
                    return Some(inner.clone());
                }
            }
        }
        Some(value)
    }

    /// Materialize the full payload, write it to a temp file, then rename
    /// into place. Readers never observe a partial file.
    fn write_value(&self, key: StorageKey, value: Value) {
        let payload = match serde_json::to_vec(&value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = key.file_name(), "failed to serialize value: {}", e);
                return;
            }
        };

        let path = self.path(key);
        let tmp = self.root.join(format!("{}.tmp", key.file_name()));

        if let Err(e) = fs::write(&tmp, &payload) {
            tracing::warn!("failed to write {}: {}", tmp.display(), e);
            return;
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            tracing::warn!("failed to replace {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_store() -> (KeyValueStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = KeyValueStore::new(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn test_scalar_round_trips() {
        let (store, _dir) = create_store();

        store.set_string(StorageKey::DistinctId, "user-1");
        store.set_number(StorageKey::SessionLastTimestamp, 1700000000.5);
        store.set_bool(StorageKey::OptOut, true);

        assert_eq!(store.get_string(StorageKey::DistinctId).as_deref(), Some("user-1"));
        assert_eq!(
            store.get_number(StorageKey::SessionLastTimestamp),
            Some(1700000000.5)
        );
        assert_eq!(store.get_bool(StorageKey::OptOut), Some(true));
    }

    #[test]
    fn test_legacy_object_shape_accepted() {
        let (store, dir) = create_store();

        fs::write(
            dir.path().join(StorageKey::DistinctId.file_name()),
            br#"{"trackkit.distinctId": "legacy-user"}"#,
        )
        .unwrap();

        assert_eq!(
            store.get_string(StorageKey::DistinctId).as_deref(),
            Some("legacy-user")
        );
    }

    #[test]
    fn test_unparseable_file_reads_as_absent() {
        let (store, dir) = create_store();

        fs::write(dir.path().join(StorageKey::Groups.file_name()), b"{truncated").unwrap();

        assert!(store.get_dict(StorageKey::Groups).is_none());
    }

    #[test]
    fn test_dict_round_trip() {
        let (store, _dir) = create_store();

        let mut groups = HashMap::new();
        groups.insert("company".to_string(), serde_json::json!("acme"));
        store.set_dict(StorageKey::Groups, &groups);

        let read = store.get_dict(StorageKey::Groups).unwrap();
        assert_eq!(read.get("company"), Some(&serde_json::json!("acme")));
    }

    #[test]
    fn test_remove_and_reset() {
        let (store, _dir) = create_store();

        store.set_string(StorageKey::DistinctId, "user-1");
        store.remove(StorageKey::DistinctId);
        assert!(store.get_string(StorageKey::DistinctId).is_none());

        // Removing an absent key is a no-op.
        store.remove(StorageKey::DistinctId);

        store.set_bool(StorageKey::OptOut, true);
        store.set_string(StorageKey::SessionId, "sess-1");
        store.reset();

        assert!(store.get_bool(StorageKey::OptOut).is_none());
        assert!(store.get_string(StorageKey::SessionId).is_none());
        assert!(store.root().exists());
    }

    #[test]
    fn test_queue_dir_persists_default() {
        let (store, dir) = create_store();

        let queue_dir = store.queue_dir();
        assert_eq!(queue_dir, dir.path().join("queue"));

        // Second call reads the persisted pointer.
        assert_eq!(store.queue_dir(), queue_dir);
        assert!(store.get_string(StorageKey::QueueFolder).is_some());
    }
}
