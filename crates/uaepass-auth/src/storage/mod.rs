//! Key/value storage backends and the two stores built on them.
//!
//! [`Storage`] mirrors the Web Storage API: string keys, string values,
//! synchronous access. The [`EphemeralStore`] keeps `state` and the code
//! verifier across the provider redirect; the [`SessionStore`] keeps tokens
//! and profile according to the configured [`PersistenceMode`].
//!
//! [`PersistenceMode`]: crate::config::PersistenceMode

mod ephemeral;
mod file;
mod session;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub use ephemeral::{EphemeralStore, RedirectRecord};
pub use file::FileStorage;
pub use session::SessionStore;

use crate::error::{Error, Result};

/// Prefix applied to every key written by this crate.
pub const KEY_PREFIX: &str = "uae-pass:";

/// Returns the namespaced key for `name`.
#[must_use]
pub fn namespaced(name: &str) -> String {
    format!("{KEY_PREFIX}{name}")
}

/// String key/value storage.
///
/// Implement this to back the stores with browser storage, a database or
/// anything else that survives the redirect round trip.
pub trait Storage: Send + Sync {
    /// Reads a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// In-process storage. Lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty storage behind an `Arc`.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns all stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .items
            .lock()
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| Error::Storage("memory storage lock poisoned".into()))
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// The two storage areas a host provides.
#[derive(Clone)]
pub struct StorageBackends {
    /// Survives navigation but not a new browser session.
    pub session: Arc<dyn Storage>,
    /// Survives new browser sessions.
    pub durable: Arc<dyn Storage>,
}

impl StorageBackends {
    /// Creates backends from explicit implementations.
    #[must_use]
    pub fn new(session: Arc<dyn Storage>, durable: Arc<dyn Storage>) -> Self {
        Self { session, durable }
    }
}

impl Default for StorageBackends {
    fn default() -> Self {
        Self {
            session: MemoryStorage::shared(),
            durable: MemoryStorage::shared(),
        }
    }
}

impl std::fmt::Debug for StorageBackends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageBackends").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("k").unwrap(), None);

        storage.set_item("k", "v1").unwrap();
        storage.set_item("k", "v2").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v2"));

        storage.remove_item("k").unwrap();
        storage.remove_item("k").unwrap();
        assert_eq!(storage.get_item("k").unwrap(), None);
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn test_namespaced_keys() {
        assert_eq!(namespaced("tokens"), "uae-pass:tokens");
        assert_eq!(namespaced("code_verifier"), "uae-pass:code_verifier");
    }
}
