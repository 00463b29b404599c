//! Observable authentication state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AuthFailure;
use crate::profile::Profile;
use crate::token::Tokens;

/// Lifecycle of one [`AuthService`](super::AuthService).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthStatus {
    /// No session and no attempt in progress.
    #[default]
    Idle,
    /// Sent to the provider's authorize page.
    Authorizing,
    /// Callback accepted, token exchange in flight.
    ExchangingToken,
    /// Tokens held.
    Authenticated,
    /// Last attempt failed. Terminal until `reset_error` or `login`.
    Error,
    /// Session ended by `logout`.
    LoggedOut,
}

impl AuthStatus {
    /// Kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Authorizing => "authorizing",
            Self::ExchangingToken => "exchanging-token",
            Self::Authenticated => "authenticated",
            Self::Error => "error",
            Self::LoggedOut => "logged-out",
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of status, tokens, profile and error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    /// Current status.
    pub status: AuthStatus,
    /// Tokens, present only while authenticated.
    pub tokens: Option<Tokens>,
    /// Profile, if one was fetched or restored.
    pub profile: Option<Profile>,
    /// Failure of the last attempt.
    pub error: Option<AuthFailure>,
}

impl AuthState {
    /// Authenticated state restored from persisted data.
    #[must_use]
    pub const fn restored(tokens: Tokens, profile: Option<Profile>) -> Self {
        Self {
            status: AuthStatus::Authenticated,
            tokens: Some(tokens),
            profile,
            error: None,
        }
    }

    /// Returns `true` when authenticated with tokens held.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.status, AuthStatus::Authenticated) && self.tokens.is_some()
    }
}
