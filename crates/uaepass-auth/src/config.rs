//! Caller-supplied configuration.
//!
//! A [`Config`] is built once through [`ConfigBuilder`] and never mutated
//! afterwards. Everything the authentication flow needs to know about the
//! relying party (client id, redirect URIs, proxy endpoints, persistence
//! policy) lives here.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Default requested scope.
pub const DEFAULT_SCOPE: &str = "urn:uae:digitalid:profile:general";

/// Default UI language.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Default timeout applied to token exchange and profile fetch.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

const PRODUCTION_BASE_URL: &str = "https://id.uaepass.ae";
const STAGING_BASE_URL: &str = "https://stg-id.uaepass.ae";

/// Provider environment, selecting the base URL of every endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Staging (`stg-id.uaepass.ae`).
    #[default]
    Staging,
    /// Production (`id.uaepass.ae`).
    Production,
}

impl Environment {
    /// Returns the base URL for this environment.
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Staging => STAGING_BASE_URL,
            Self::Production => PRODUCTION_BASE_URL,
        }
    }

    /// Maps the legacy `isProduction` flag.
    #[must_use]
    pub const fn from_production_flag(is_production: bool) -> Self {
        if is_production {
            Self::Production
        } else {
            Self::Staging
        }
    }
}

/// Authentication context reference sent as `acr_values`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acr {
    /// Browser login (the default for web applications).
    #[default]
    Web,
    /// Login through the UAE PASS app on the same device.
    MobileOnDevice,
}

impl Acr {
    /// Returns the provider-defined ACR value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Web => "urn:safelayer:tws:policies:authentication:level:low",
            Self::MobileOnDevice => "urn:digitalid:authentication:flow:mobileondevice",
        }
    }
}

/// Where tokens and profile are persisted between page loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PersistenceMode {
    /// Nothing is persisted; a reload starts from `idle`.
    #[default]
    None,
    /// Persisted for the lifetime of the browser session.
    SessionScoped,
    /// Persisted across browser sessions.
    DurableScoped,
}

impl PersistenceMode {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SessionScoped => "session-scoped",
            Self::DurableScoped => "durable-scoped",
        }
    }
}

impl FromStr for PersistenceMode {
    type Err = Error;

    /// Accepts canonical names plus the legacy `session` / `local` spellings.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "session" | "session-scoped" | "session_scoped" => Ok(Self::SessionScoped),
            "local" | "durable" | "durable-scoped" | "durable_scoped" => Ok(Self::DurableScoped),
            other => Err(Error::InvalidConfig(format!(
                "unknown persistence mode: {other}"
            ))),
        }
    }
}

impl TryFrom<String> for PersistenceMode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PersistenceMode> for String {
    fn from(mode: PersistenceMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when the operating system's secure random source fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomPolicy {
    /// Refuse to generate state or verifiers (`CryptoUnavailable`).
    #[default]
    FailClosed,
    /// Fall back to a time-seeded generator and log a reduced-security warning.
    AllowInsecureFallback,
}

/// UAE PASS client configuration.
///
/// Deserialization also accepts the legacy boolean `isProduction` key. It
/// selects the environment only when `environment` itself is absent.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ConfigRepr")]
pub struct Config {
    /// Client ID issued by UAE PASS.
    pub client_id: String,
    /// Redirect URI registered with the provider.
    pub redirect_uri: Url,
    /// Post-logout redirect URI. Defaults to `redirect_uri`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_redirect_uri: Option<Url>,
    /// Provider environment.
    pub environment: Environment,
    /// Replaces the environment base URL (sandbox or test server).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url_override: Option<Url>,
    /// Requested scope.
    pub scope: String,
    /// Client secret. Only sent on direct (non-proxied) token exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Backend endpoint that performs the token exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_proxy_url: Option<Url>,
    /// Backend endpoint that fetches the profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info_proxy_url: Option<Url>,
    /// Timeout for token exchange and profile fetch.
    #[serde(with = "duration_ms", rename = "requestTimeoutMs")]
    pub request_timeout: Duration,
    /// Persistence of tokens and profile.
    #[serde(rename = "storage")]
    pub persistence: PersistenceMode,
    /// UI language code sent as `ui_locales`.
    pub language: String,
    /// Assurance level sent as `acr_values`.
    pub acr: Acr,
    /// Behavior when no secure random source exists.
    pub random_policy: RandomPolicy,
}

/// On-disk shape of [`Config`], including legacy keys.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigRepr {
    client_id: String,
    redirect_uri: Url,
    #[serde(default)]
    logout_redirect_uri: Option<Url>,
    #[serde(default)]
    environment: Option<Environment>,
    #[serde(default)]
    is_production: Option<bool>,
    #[serde(default)]
    base_url_override: Option<Url>,
    #[serde(default = "default_scope")]
    scope: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    token_proxy_url: Option<Url>,
    #[serde(default)]
    user_info_proxy_url: Option<Url>,
    #[serde(default = "default_timeout", with = "duration_ms", rename = "requestTimeoutMs")]
    request_timeout: Duration,
    #[serde(default, rename = "storage")]
    persistence: PersistenceMode,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    acr: Acr,
    #[serde(default)]
    random_policy: RandomPolicy,
}

impl From<ConfigRepr> for Config {
    fn from(repr: ConfigRepr) -> Self {
        let environment = repr
            .environment
            .or_else(|| repr.is_production.map(Environment::from_production_flag))
            .unwrap_or_default();

        Self {
            client_id: repr.client_id,
            redirect_uri: repr.redirect_uri,
            logout_redirect_uri: repr.logout_redirect_uri,
            environment,
            base_url_override: repr.base_url_override,
            scope: repr.scope,
            client_secret: repr.client_secret,
            token_proxy_url: repr.token_proxy_url,
            user_info_proxy_url: repr.user_info_proxy_url,
            request_timeout: repr.request_timeout,
            persistence: repr.persistence,
            language: repr.language,
            acr: repr.acr,
            random_policy: repr.random_policy,
        }
    }
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

const fn default_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("environment", &self.environment)
            .field("scope", &self.scope)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("token_proxy_url", &self.token_proxy_url.as_ref().map(Url::as_str))
            .field(
                "user_info_proxy_url",
                &self.user_info_proxy_url.as_ref().map(Url::as_str),
            )
            .field("request_timeout", &self.request_timeout)
            .field("persistence", &self.persistence)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(client_id, redirect_uri)
    }

    /// Base URL of the provider, honoring the override.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment URL cannot be parsed.
    pub fn base_url(&self) -> Result<Url> {
        match &self.base_url_override {
            Some(url) => Ok(url.clone()),
            None => Ok(Url::parse(self.environment.base_url())?),
        }
    }

    /// Joins an `/idshub/...` path onto the provider base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting URL is invalid.
    pub fn endpoint(&self, name: &str) -> Result<Url> {
        let base = self.base_url()?;
        let base = base.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/idshub/{name}"))?)
    }

    /// Redirect used after logout.
    #[must_use]
    pub fn effective_logout_redirect(&self) -> &Url {
        self.logout_redirect_uri.as_ref().unwrap_or(&self.redirect_uri)
    }

    /// Checks the invariants [`ConfigBuilder::build`] enforces.
    ///
    /// Configurations loaded through serde skip the builder, so callers
    /// should validate them explicitly.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::InvalidConfig("client_id is empty".into()));
        }
        if self.scope.trim().is_empty() {
            return Err(Error::InvalidConfig("scope is empty".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfig("request timeout must be positive".into()));
        }
        if self.redirect_uri.cannot_be_a_base() {
            return Err(Error::InvalidConfig("redirect_uri is not absolute".into()));
        }
        Ok(())
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    client_id: String,
    redirect_uri: String,
    logout_redirect_uri: Option<String>,
    environment: Environment,
    base_url_override: Option<String>,
    scope: String,
    client_secret: Option<String>,
    token_proxy_url: Option<String>,
    user_info_proxy_url: Option<String>,
    request_timeout: Duration,
    persistence: PersistenceMode,
    language: String,
    acr: Acr,
    random_policy: RandomPolicy,
}

impl ConfigBuilder {
    /// Creates a new builder with the required fields.
    #[must_use]
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            logout_redirect_uri: None,
            environment: Environment::default(),
            base_url_override: None,
            scope: DEFAULT_SCOPE.to_string(),
            client_secret: None,
            token_proxy_url: None,
            user_info_proxy_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            persistence: PersistenceMode::default(),
            language: DEFAULT_LANGUAGE.to_string(),
            acr: Acr::default(),
            random_policy: RandomPolicy::default(),
        }
    }

    /// Sets the post-logout redirect URI.
    #[must_use]
    pub fn logout_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.logout_redirect_uri = Some(uri.into());
        self
    }

    /// Sets the provider environment.
    #[must_use]
    pub const fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Points every endpoint at a different base URL.
    #[must_use]
    pub fn base_url_override(mut self, url: impl Into<String>) -> Self {
        self.base_url_override = Some(url.into());
        self
    }

    /// Sets the requested scope.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Sets the client secret (direct exchange only).
    #[must_use]
    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Routes token exchange through a backend proxy.
    #[must_use]
    pub fn token_proxy_url(mut self, url: impl Into<String>) -> Self {
        self.token_proxy_url = Some(url.into());
        self
    }

    /// Routes profile fetch through a backend proxy.
    #[must_use]
    pub fn user_info_proxy_url(mut self, url: impl Into<String>) -> Self {
        self.user_info_proxy_url = Some(url.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the persistence mode.
    #[must_use]
    pub const fn persistence(mut self, mode: PersistenceMode) -> Self {
        self.persistence = mode;
        self
    }

    /// Sets the UI language code.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Sets the ACR value.
    #[must_use]
    pub const fn acr(mut self, acr: Acr) -> Self {
        self.acr = acr;
        self
    }

    /// Sets the random source policy.
    #[must_use]
    pub const fn random_policy(mut self, policy: RandomPolicy) -> Self {
        self.random_policy = policy;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL does not parse or a required field is empty.
    pub fn build(self) -> Result<Config> {
        let parse = |field: &str, value: &str| {
            Url::parse(value).map_err(|e| Error::InvalidConfig(format!("{field}: {e}")))
        };

        let config = Config {
            client_id: self.client_id,
            redirect_uri: parse("redirect_uri", &self.redirect_uri)?,
            logout_redirect_uri: self
                .logout_redirect_uri
                .as_deref()
                .map(|u| parse("logout_redirect_uri", u))
                .transpose()?,
            environment: self.environment,
            base_url_override: self
                .base_url_override
                .as_deref()
                .map(|u| parse("base_url_override", u))
                .transpose()?,
            scope: self.scope,
            client_secret: self.client_secret,
            token_proxy_url: self
                .token_proxy_url
                .as_deref()
                .map(|u| parse("token_proxy_url", u))
                .transpose()?,
            user_info_proxy_url: self
                .user_info_proxy_url
                .as_deref()
                .map(|u| parse("user_info_proxy_url", u))
                .transpose()?,
            request_timeout: self.request_timeout,
            persistence: self.persistence,
            language: self.language,
            acr: self.acr,
            random_policy: self.random_policy,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = Config::builder("client", "https://app.example.com/callback")
            .build()
            .unwrap();

        assert_eq!(config.scope, DEFAULT_SCOPE);
        assert_eq!(config.language, "en");
        assert_eq!(config.environment, Environment::Staging);
        assert_eq!(config.persistence, PersistenceMode::None);
        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert_eq!(config.random_policy, RandomPolicy::FailClosed);
        assert_eq!(
            config.effective_logout_redirect().as_str(),
            "https://app.example.com/callback"
        );
    }

    #[test]
    fn test_builder_rejects_bad_input() {
        assert!(Config::builder("", "https://app.example.com/cb").build().is_err());
        assert!(Config::builder("client", "not a url").build().is_err());
        assert!(
            Config::builder("client", "https://app.example.com/cb")
                .token_proxy_url("::nope")
                .build()
                .is_err()
        );
        assert!(
            Config::builder("client", "https://app.example.com/cb")
                .request_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_endpoints_per_environment() {
        let staging = Config::builder("c", "https://app.example.com/cb").build().unwrap();
        assert_eq!(
            staging.endpoint("token").unwrap().as_str(),
            "https://stg-id.uaepass.ae/idshub/token"
        );

        let production = Config::builder("c", "https://app.example.com/cb")
            .environment(Environment::Production)
            .build()
            .unwrap();
        assert_eq!(
            production.endpoint("authorize").unwrap().as_str(),
            "https://id.uaepass.ae/idshub/authorize"
        );

        let custom = Config::builder("c", "https://app.example.com/cb")
            .base_url_override("http://127.0.0.1:9999/")
            .build()
            .unwrap();
        assert_eq!(
            custom.endpoint("userinfo").unwrap().as_str(),
            "http://127.0.0.1:9999/idshub/userinfo"
        );
    }

    #[test]
    fn test_persistence_mode_legacy_strings() {
        assert_eq!("none".parse::<PersistenceMode>().unwrap(), PersistenceMode::None);
        assert_eq!(
            "session".parse::<PersistenceMode>().unwrap(),
            PersistenceMode::SessionScoped
        );
        assert_eq!(
            "LOCAL".parse::<PersistenceMode>().unwrap(),
            PersistenceMode::DurableScoped
        );
        assert_eq!(
            "durable-scoped".parse::<PersistenceMode>().unwrap(),
            PersistenceMode::DurableScoped
        );
        assert!("cookie".parse::<PersistenceMode>().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "clientId": "sandbox_stage",
            "redirectUri": "http://localhost:4200/callback",
            "environment": "staging",
            "tokenProxyUrl": "http://localhost:3001/api/uae-pass/token",
            "requestTimeoutMs": 5000,
            "storage": "local"
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.client_id, "sandbox_stage");
        assert_eq!(config.persistence, PersistenceMode::DurableScoped);
        assert_eq!(config.request_timeout, Duration::from_millis(5000));
        assert_eq!(config.scope, DEFAULT_SCOPE);
        assert!(config.token_proxy_url.is_some());
        assert!(config.user_info_proxy_url.is_none());

        let legacy: Config = serde_json::from_str(
            r#"{"clientId":"c","redirectUri":"http://localhost/cb","isProduction":true}"#,
        )
        .unwrap();
        assert_eq!(legacy.environment, Environment::Production);

        let legacy: Config = serde_json::from_str(
            r#"{"clientId":"c","redirectUri":"http://localhost/cb","isProduction":false}"#,
        )
        .unwrap();
        assert_eq!(legacy.environment, Environment::Staging);
    }

    #[test]
    fn test_environment_key_overrides_production_flag() {
        let config: Config = serde_json::from_str(
            r#"{
                "clientId": "c",
                "redirectUri": "http://localhost/cb",
                "environment": "staging",
                "isProduction": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.environment, Environment::Staging);
    }

    #[test]
    fn test_serialized_config_reads_back() {
        let config = Config::builder("c", "https://app.example.com/cb")
            .environment(Environment::Production)
            .request_timeout(Duration::from_millis(1500))
            .build()
            .unwrap();

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("isProduction"));

        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.environment, Environment::Production);
        assert_eq!(back.request_timeout, Duration::from_millis(1500));
        assert_eq!(back.persistence, config.persistence);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::builder("c", "https://app.example.com/cb")
            .client_secret("super-secret")
            .build()
            .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
