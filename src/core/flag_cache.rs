//! Cache of remotely computed feature flags.
//!
//! Holds the last known flag and payload maps, warm-started from disk, and
//! refreshes them through a single-flight call to the decide endpoint. When
//! the server reports it could only compute a subset of flags, the new maps
//! are merged over the cached ones instead of replacing them, so previously
//! known flags survive partial outages.

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::key_value::{KeyValueStore, StorageKey};
use crate::net::{DecideEndpoint, DecideRequest};
use crate::types::FlagValue;

/// Result of a [`FlagCache::load`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The cache was updated; carries the full post-update maps.
    Loaded {
        flags: HashMap<String, FlagValue>,
        payloads: HashMap<String, FlagValue>,
    },
    /// Transport failure or malformed response; the cache is unchanged.
    Failed,
    /// Another load is already in flight; nothing was done.
    InFlight,
}

/// Flags and payloads always update together.
#[derive(Default)]
struct FlagPair {
    flags: HashMap<String, FlagValue>,
    payloads: HashMap<String, FlagValue>,
}

pub struct FlagCache {
    store: Arc<KeyValueStore>,
    endpoint: Arc<dyn DecideEndpoint>,
    cached: RwLock<FlagPair>,
    is_loading: Mutex<bool>,
    updates: broadcast::Sender<()>,
}

impl FlagCache {
    /// Create a cache over `store`, warm-starting from the persisted maps.
    pub fn new(store: Arc<KeyValueStore>, endpoint: Arc<dyn DecideEndpoint>) -> Self {
        let flags = Self::read_persisted(&store, StorageKey::EnabledFlags);
        let payloads = Self::read_persisted(&store, StorageKey::EnabledFlagPayloads);
        let (updates, _) = broadcast::channel(16);

        Self {
            store,
            endpoint,
            cached: RwLock::new(FlagPair { flags, payloads }),
            is_loading: Mutex::new(false),
            updates,
        }
    }

    fn read_persisted(store: &KeyValueStore, key: StorageKey) -> HashMap<String, FlagValue> {
        store
            .get_dict(key)
            .map(|dict| {
                dict.into_iter()
                    .map(|(k, v)| (k, FlagValue::from(v)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Refresh the cache from the decide endpoint.
    ///
    /// At most one load is in flight per cache; a concurrent call returns
    /// [`LoadOutcome::InFlight`] immediately. On success both maps update as
    /// a pair, the update is persisted, and subscribers are notified.
    pub async fn load(&self, request: DecideRequest) -> LoadOutcome {
        {
            let mut loading = self.is_loading.lock();
            if *loading {
                tracing::debug!("decide request already in flight, skipping");
                return LoadOutcome::InFlight;
            }
            *loading = true;
        }

        let outcome = self.load_inner(request).await;
        *self.is_loading.lock() = false;
        outcome
    }

    async fn load_inner(&self, request: DecideRequest) -> LoadOutcome {
        let response = match self.endpoint.decide(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("decide request failed: {}", e);
                return LoadOutcome::Failed;
            }
        };

        let Some(new_flags) = parse_flag_object(response.get("featureFlags")) else {
            tracing::warn!("decide response missing featureFlags object");
            return LoadOutcome::Failed;
        };
        let Some(new_payloads) = parse_flag_object(response.get("featureFlagPayloads")) else {
            tracing::warn!("decide response missing featureFlagPayloads object");
            return LoadOutcome::Failed;
        };

        let partial = response
            .get("errorsWhileComputingFlags")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let (flags, payloads) = {
            let mut cached = self.cached.write();
            if partial {
                // The server computed only a subset; keep what we already
                // know and let new values win on collision.
                cached.flags.extend(new_flags);
                cached.payloads.extend(new_payloads);
            } else {
                cached.flags = new_flags;
                cached.payloads = new_payloads;
            }
            (cached.flags.clone(), cached.payloads.clone())
        };

        self.persist(&flags, &payloads);

        tracing::debug!(count = flags.len(), partial, "feature flags updated");
        let _ = self.updates.send(());

        LoadOutcome::Loaded { flags, payloads }
    }

    fn persist(&self, flags: &HashMap<String, FlagValue>, payloads: &HashMap<String, FlagValue>) {
        let to_dict = |map: &HashMap<String, FlagValue>| -> HashMap<String, Value> {
            map.iter()
                .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or(Value::Null)))
                .collect()
        };
        self.store.set_dict(StorageKey::EnabledFlags, &to_dict(flags));
        self.store
            .set_dict(StorageKey::EnabledFlagPayloads, &to_dict(payloads));
    }

    /// False iff the flag is absent or explicitly boolean false; any other
    /// present value (string variants included) is enabled.
    pub fn is_enabled(&self, key: &str) -> bool {
        match self.cached.read().flags.get(key) {
            None => false,
            Some(FlagValue::Bool(enabled)) => *enabled,
            Some(_) => true,
        }
    }

    /// Raw stored value for a flag.
    pub fn get(&self, key: &str) -> Option<FlagValue> {
        self.cached.read().flags.get(key).cloned()
    }

    /// Stored payload for a flag.
    ///
    /// Payloads arrive as raw strings and are parsed as JSON lazily here,
    /// allowing top-level scalars; a string that is not JSON is returned
    /// as-is.
    pub fn get_payload(&self, key: &str) -> Option<FlagValue> {
        let stored = self.cached.read().payloads.get(key).cloned()?;
        Some(match stored {
            FlagValue::String(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(parsed) => FlagValue::from(parsed),
                Err(_) => FlagValue::String(raw),
            },
            other => other,
        })
    }

    /// Snapshot of the current flag map.
    pub fn get_all(&self) -> HashMap<String, FlagValue> {
        self.cached.read().flags.clone()
    }

    /// Notified after every successful cache update.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.updates.subscribe()
    }
}

fn parse_flag_object(value: Option<&Value>) -> Option<HashMap<String, FlagValue>> {
    let object = value?.as_object()?;
    Some(
        object
            .iter()
            .map(|(k, v)| (k.clone(), FlagValue::from(v.clone())))
            .collect(),
    )
}
