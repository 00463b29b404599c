//! Cross-redirect storage for `state` and the code verifier.

use std::fmt;
use std::sync::Arc;

use super::{Storage, namespaced};
use crate::error::Result;

const STATE_KEY: &str = "state";
const VERIFIER_KEY: &str = "code_verifier";

/// Values bound to one authorization attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct RedirectRecord {
    /// Expected `state` on the callback.
    pub state: String,
    /// PKCE verifier for the token exchange.
    pub code_verifier: String,
}

impl RedirectRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(state: impl Into<String>, code_verifier: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            code_verifier: code_verifier.into(),
        }
    }
}

impl fmt::Debug for RedirectRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectRecord")
            .field("state", &self.state)
            .field("code_verifier", &"<redacted>")
            .finish()
    }
}

/// Holds one [`RedirectRecord`] in session-scoped storage.
///
/// Written once by `login`, consumed once by callback handling.
#[derive(Clone)]
pub struct EphemeralStore {
    storage: Arc<dyn Storage>,
}

impl EphemeralStore {
    /// Creates a store over the given (session-scoped) storage.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Writes the record, replacing any previous attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn put(&self, record: &RedirectRecord) -> Result<()> {
        self.storage.set_item(&namespaced(STATE_KEY), &record.state)?;
        self.storage
            .set_item(&namespaced(VERIFIER_KEY), &record.code_verifier)?;
        Ok(())
    }

    /// Reads the record. Absent unless both values are present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn get(&self) -> Result<Option<RedirectRecord>> {
        let state = self.storage.get_item(&namespaced(STATE_KEY))?;
        let verifier = self.storage.get_item(&namespaced(VERIFIER_KEY))?;
        Ok(match (state, verifier) {
            (Some(state), Some(code_verifier)) if !state.is_empty() => Some(RedirectRecord {
                state,
                code_verifier,
            }),
            _ => None,
        })
    }

    /// Reads the record and clears the store.
    ///
    /// The store is cleared even when the read fails.
    ///
    /// # Errors
    ///
    /// Returns the read error, or the clear error if the read succeeded.
    pub fn take(&self) -> Result<Option<RedirectRecord>> {
        let record = self.get();
        let cleared = self.clear();
        let record = record?;
        cleared?;
        Ok(record)
    }

    /// Removes both values. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn clear(&self) -> Result<()> {
        let state = self.storage.remove_item(&namespaced(STATE_KEY));
        let verifier = self.storage.remove_item(&namespaced(VERIFIER_KEY));
        state.and(verifier)
    }
}

impl fmt::Debug for EphemeralStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralStore").finish_non_exhaustive()
    }
}
