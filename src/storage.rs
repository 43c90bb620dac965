//! Preference persistence
//!
//! The host supplies a small key-value store holding the last-used
//! backend and network across reloads. The contract is best-effort:
//! absence is `None`, writes that fail are silently dropped by the
//! implementation, and no operation here can error.

use std::collections::HashMap;
use std::sync::Mutex;

/// Key holding the last connected backend identity.
pub const BACKEND_KEY: &str = "wallet.backend";
/// Key holding the active network.
pub const NETWORK_KEY: &str = "wallet.network";

/// Best-effort string preference store (localStorage-shaped).
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory store for tests and hosts without persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.map.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.map.lock().unwrap().insert(key.into(), value.into());
    }

    fn remove(&self, key: &str) {
        self.map.lock().unwrap().remove(key);
    }
}
