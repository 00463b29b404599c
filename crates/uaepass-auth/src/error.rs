//! Error types for UAE PASS authentication.

use serde::{Deserialize, Serialize};

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No secure random source is reachable and the policy forbids a fallback.
    #[error("Secure random source unavailable: {0}")]
    CryptoUnavailable(String),

    /// There is no navigable context to send the user agent to.
    #[error("Window is not available to redirect")]
    NavigationUnavailable,

    /// The provider redirected back with an `error` parameter.
    #[error("{}", provider_message(.error, .description.as_deref()))]
    Provider {
        /// Error code (e.g., `access_denied`).
        error: String,
        /// Decoded `error_description`, if any.
        description: Option<String>,
    },

    /// Callback `state` is missing or does not match the stored one.
    #[error("Security check failed: state mismatch")]
    StateMismatch,

    /// Token exchange returned a non-success status or no access token.
    #[error("Failed to obtain access token: {0}")]
    TokenExchangeFailed(String),

    /// Profile fetch failed. Never fatal to an authenticated session.
    #[error("Failed to fetch user profile: {0}")]
    ProfileFetchFailed(String),

    /// Callback URL was empty or could not be parsed.
    #[error("No URL context available to handle callback: {0}")]
    InvalidCallbackUrl(String),

    /// Another callback is already being handled by this instance.
    #[error("A callback is already being handled")]
    CallbackInProgress,

    /// Storage backend failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn provider_message(error: &str, description: Option<&str>) -> String {
    match description {
        Some(description) if !description.is_empty() => format!("{error}: {description}"),
        _ => error.to_string(),
    }
}

impl Error {
    /// Creates a provider error from the callback's `error` and `error_description`.
    #[must_use]
    pub fn provider(error: impl Into<String>, description: Option<String>) -> Self {
        Self::Provider {
            error: error.into(),
            description,
        }
    }

    /// Maps this error onto the failure taxonomy surfaced by the state machine.
    ///
    /// Returns `None` for ambient errors (storage, JSON, configuration) that
    /// never reach the observable state.
    #[must_use]
    pub const fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::CryptoUnavailable(_) => Some(FailureKind::CryptoUnavailable),
            Self::NavigationUnavailable => Some(FailureKind::NavigationUnavailable),
            Self::Provider { .. } => Some(FailureKind::ProviderError),
            Self::StateMismatch => Some(FailureKind::StateMismatch),
            Self::TokenExchangeFailed(_) => Some(FailureKind::TokenExchangeFailed),
            Self::ProfileFetchFailed(_) => Some(FailureKind::ProfileFetchFailed),
            Self::InvalidCallbackUrl(_) => Some(FailureKind::InvalidCallback),
            Self::CallbackInProgress
            | Self::Storage(_)
            | Self::Json(_)
            | Self::Url(_)
            | Self::InvalidConfig(_) => None,
        }
    }
}

/// Closed set of failure kinds an authentication attempt can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No secure random source; login cannot proceed.
    CryptoUnavailable,
    /// No navigable context for the redirect.
    NavigationUnavailable,
    /// Provider returned an `error` parameter.
    ProviderError,
    /// Possible CSRF or replayed callback.
    StateMismatch,
    /// Token endpoint failed or returned no access token.
    TokenExchangeFailed,
    /// Profile endpoint failed. Logged only.
    ProfileFetchFailed,
    /// Callback URL missing or malformed.
    InvalidCallback,
}

/// Failure recorded on the state machine: a kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFailure {
    /// Failure kind.
    pub kind: FailureKind,
    /// Human-readable message.
    pub message: String,
}

impl AuthFailure {
    /// Builds a failure record from an error, if the error belongs to the taxonomy.
    #[must_use]
    pub fn from_error(error: &Error) -> Option<Self> {
        error.kind().map(|kind| Self {
            kind,
            message: error.to_string(),
        })
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
