//! Longer-lived persistence of tokens and profile.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{Storage, StorageBackends, namespaced};
use crate::config::PersistenceMode;
use crate::error::Result;
use crate::profile::Profile;
use crate::token::Tokens;

const TOKENS_KEY: &str = "tokens";
const PROFILE_KEY: &str = "profile";

/// Persists [`Tokens`] and [`Profile`] according to a [`PersistenceMode`].
///
/// With [`PersistenceMode::None`] every save is a no-op and every load is
/// absent.
#[derive(Clone)]
pub struct SessionStore {
    mode: PersistenceMode,
    backends: StorageBackends,
}

impl SessionStore {
    /// Creates a session store.
    #[must_use]
    pub const fn new(mode: PersistenceMode, backends: StorageBackends) -> Self {
        Self { mode, backends }
    }

    /// Configured persistence mode.
    #[must_use]
    pub const fn mode(&self) -> PersistenceMode {
        self.mode
    }

    fn active(&self) -> Option<&Arc<dyn Storage>> {
        match self.mode {
            PersistenceMode::None => None,
            PersistenceMode::SessionScoped => Some(&self.backends.session),
            PersistenceMode::DurableScoped => Some(&self.backends.durable),
        }
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let Some(storage) = self.active() else {
            return Ok(());
        };
        storage.set_item(&namespaced(name), &serde_json::to_string(value)?)?;
        debug!(key = name, mode = %self.mode, "persisted");
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let Some(storage) = self.active() else {
            return Ok(None);
        };
        let Some(raw) = storage.get_item(&namespaced(name))? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = name, error = %e, "discarding corrupt persisted value");
                Ok(None)
            }
        }
    }

    /// Persists tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the backend write fails.
    pub fn save_tokens(&self, tokens: &Tokens) -> Result<()> {
        self.save(TOKENS_KEY, tokens)
    }

    /// Loads tokens. Corrupt data loads as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn load_tokens(&self) -> Result<Option<Tokens>> {
        self.load(TOKENS_KEY)
    }

    /// Persists the profile.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the backend write fails.
    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        self.save(PROFILE_KEY, profile)
    }

    /// Loads the profile. Corrupt data loads as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn load_profile(&self) -> Result<Option<Profile>> {
        self.load(PROFILE_KEY)
    }

    /// Removes the persisted profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn clear_profile(&self) -> Result<()> {
        match self.active() {
            Some(storage) => storage.remove_item(&namespaced(PROFILE_KEY)),
            None => Ok(()),
        }
    }

    /// Removes tokens and profile from every backend, whatever the mode.
    ///
    /// Data written under a previous configuration is removed too.
    ///
    /// # Errors
    ///
    /// Returns the first backend error; all removals are still attempted.
    pub fn clear_all(&self) -> Result<()> {
        let mut result = Ok(());
        for storage in [&self.backends.session, &self.backends.durable] {
            for name in [TOKENS_KEY, PROFILE_KEY] {
                if let Err(e) = storage.remove_item(&namespaced(name)) {
                    warn!(key = name, error = %e, "failed to clear persisted value");
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
