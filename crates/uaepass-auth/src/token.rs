//! Token set returned by the UAE PASS token endpoint.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Seconds before actual expiry at which a token is treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Tokens obtained from a successful authorization code exchange.
///
/// Immutable once received. Unknown provider fields are kept in `extra`
/// and written back verbatim when persisted.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Tokens {
    /// Access token string.
    #[serde(default)]
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Lifetime in seconds, relative to `received_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Scope granted by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// `OpenID` Connect ID token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// When the exchange completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    /// Any other fields the provider returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tokens {
    /// Creates a token set holding only an access token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: None,
            expires_in: None,
            refresh_token: None,
            scope: None,
            id_token: None,
            received_at: None,
            extra: Map::new(),
        }
    }

    /// Sets the token type.
    #[must_use]
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    /// Sets the lifetime in seconds.
    #[must_use]
    pub const fn with_expires_in(mut self, secs: u64) -> Self {
        self.expires_in = Some(secs);
        self
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Stamps the receive time.
    #[must_use]
    pub const fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    /// Returns `true` if the response carried a usable access token.
    #[must_use]
    pub fn has_access_token(&self) -> bool {
        !self.access_token.trim().is_empty()
    }

    /// Absolute expiry, when both lifetime and receive time are known.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.expires_in?).ok()?;
        self.received_at?
            .checked_add_signed(Duration::seconds(secs))
    }

    /// Checks if the token is expired (with 60 second buffer).
    ///
    /// Tokens without a known expiry are never considered expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at()
            .is_some_and(|exp| Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS) >= exp)
    }

    /// Returns true if the token can be used to restore a session.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.has_access_token() && !self.is_expired()
    }
}

impl fmt::Debug for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokens")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("scope", &self.scope)
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("received_at", &self.received_at)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// `OAuth2` error body (`{error, error_description}`).
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,
    /// Error description.
    #[serde(default)]
    pub error_description: Option<String>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) if !description.is_empty() => {
                write!(f, "{}: {description}", self.error)
            }
            _ => f.write_str(&self.error),
        }
    }
}
