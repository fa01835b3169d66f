//! Key/value storage for session markers
//!
//! Two scopes exist: a durable store that survives restarts and an ephemeral
//! store that lives as long as the current session. Callers pick a store by
//! scope and never branch on the backing implementation.

use crate::error::{ArmoryError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Storage keys shared by both scopes
pub mod keys {
    pub const AUTH_STATE: &str = "auth_state";
    pub const AUTH_TIME: &str = "auth_time";
    pub const STORAGE_TYPE: &str = "storage_type";
    pub const OAUTH_STATE: &str = "oauth_state";
    pub const SESSION_ID: &str = "session_id";
    /// Older name for the session id; read and cleared, never written
    pub const SID: &str = "sid";
    pub const LAST_CHARACTER: &str = "last_character";

    /// Value of `auth_state` while a session is live
    pub const AUTHENTICATED: &str = "authenticated";

    /// Markers describing a session, excluding the transient OAuth state
    pub const SESSION_MARKERS: [&str; 5] = [AUTH_STATE, AUTH_TIME, STORAGE_TYPE, SESSION_ID, SID];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    /// Survives restarts
    Durable,
    /// Cleared when the session ends
    Ephemeral,
}

impl StorageScope {
    /// Value written under `storage_type`
    pub fn marker(&self) -> &'static str {
        match self {
            StorageScope::Durable => "local",
            StorageScope::Ephemeral => "session",
        }
    }

    pub fn from_persistent(persistent: bool) -> Self {
        if persistent {
            StorageScope::Durable
        } else {
            StorageScope::Ephemeral
        }
    }

    pub fn other(&self) -> Self {
        match self {
            StorageScope::Durable => StorageScope::Ephemeral,
            StorageScope::Ephemeral => StorageScope::Durable,
        }
    }
}

/// String key/value store. Last write wins; no cross-process coordination.
pub trait KeyValueStore: Send + Sync {
    fn scope(&self) -> StorageScope;

    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Read a JSON-encoded value. Undecodable values are reported, not dropped.
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn write_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    store.set(key, &serde_json::to_string(value)?)
}

/// In-process store, used for the ephemeral scope
#[derive(Debug)]
pub struct MemoryStore {
    scope: StorageScope,
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new(scope: StorageScope) -> Self {
        Self {
            scope,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ephemeral() -> Self {
        Self::new(StorageScope::Ephemeral)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| ArmoryError::Storage("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn scope(&self) -> StorageScope {
        self.scope
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::ephemeral();
        assert_eq!(store.scope(), StorageScope::Ephemeral);
        assert_eq!(store.get(keys::AUTH_STATE).unwrap(), None);

        store.set(keys::AUTH_STATE, keys::AUTHENTICATED).unwrap();
        store.set(keys::AUTH_STATE, "other").unwrap();
        assert_eq!(store.get(keys::AUTH_STATE).unwrap().as_deref(), Some("other"));

        store.set(keys::SESSION_ID, "abc").unwrap();
        store.remove_all(&keys::SESSION_MARKERS).unwrap();
        assert_eq!(store.get(keys::AUTH_STATE).unwrap(), None);
        assert_eq!(store.get(keys::SESSION_ID).unwrap(), None);
    }

    #[test]
    fn test_json_values() {
        let store = MemoryStore::new(StorageScope::Durable);
        let character = crate::models::LastCharacter { realm: "draenor".into(), name: "thrall".into() };

        write_json(&store, keys::LAST_CHARACTER, &character).unwrap();
        let read: Option<crate::models::LastCharacter> = read_json(&store, keys::LAST_CHARACTER).unwrap();
        assert_eq!(read, Some(character));

        store.set(keys::LAST_CHARACTER, "not json").unwrap();
        assert!(read_json::<crate::models::LastCharacter>(&store, keys::LAST_CHARACTER).is_err());
    }

    #[test]
    fn test_scope_markers() {
        assert_eq!(StorageScope::Durable.marker(), "local");
        assert_eq!(StorageScope::Ephemeral.marker(), "session");
        assert_eq!(StorageScope::from_persistent(true), StorageScope::Durable);
        assert_eq!(StorageScope::Durable.other(), StorageScope::Ephemeral);
    }
}
