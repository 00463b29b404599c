//! UAE PASS endpoints: authorize and logout URLs, token exchange, profile fetch.
//!
//! Token exchange and profile fetch either go straight to the provider or
//! through a caller-operated proxy that holds the client secret. The choice
//! is made once, in [`IdentityProviderClient::from_config`], by picking a
//! [`TokenExchanger`] and a [`ProfileFetcher`] implementation.

mod exchange;
mod userinfo;

use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use url::Url;

pub use exchange::{DirectExchanger, ProxiedExchanger, TokenExchanger};
pub use userinfo::{DirectProfileFetcher, ProfileFetcher, ProxiedProfileFetcher};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::pkce::CHALLENGE_METHOD;
use crate::profile::Profile;
use crate::token::Tokens;

/// Builds the authorize URL for one attempt.
///
/// Parameters are always emitted in the same order with the same keys.
///
/// # Errors
///
/// Returns an error if the provider base URL is invalid.
pub fn build_authorize_url(config: &Config, state: &str, code_challenge: &str) -> Result<Url> {
    let mut url = config.endpoint("authorize")?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("scope", &config.scope)
        .append_pair("state", state)
        .append_pair("redirect_uri", config.redirect_uri.as_str())
        .append_pair("ui_locales", &config.language)
        .append_pair("acr_values", config.acr.as_str())
        .append_pair("code_challenge", code_challenge)
        .append_pair("code_challenge_method", CHALLENGE_METHOD);
    Ok(url)
}

/// Builds the provider logout URL.
///
/// # Errors
///
/// Returns an error if the provider base URL is invalid.
pub fn logout_url(config: &Config) -> Result<Url> {
    let mut url = config.endpoint("logout")?;
    url.query_pairs_mut()
        .append_pair("redirect_uri", config.effective_logout_redirect().as_str());
    Ok(url)
}

/// Builds the HTTP client shared by the strategies.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client(config: &Config) -> Result<Client> {
    Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))
}

/// Token exchange and profile fetch, with the transport strategy fixed at construction.
#[derive(Clone)]
pub struct IdentityProviderClient {
    exchanger: Arc<dyn TokenExchanger>,
    fetcher: Arc<dyn ProfileFetcher>,
}

impl IdentityProviderClient {
    /// Creates a client from explicit strategies.
    #[must_use]
    pub fn new(exchanger: Arc<dyn TokenExchanger>, fetcher: Arc<dyn ProfileFetcher>) -> Self {
        Self { exchanger, fetcher }
    }

    /// Selects proxied or direct strategies from the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or an endpoint URL cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = http_client(config)?;

        let exchanger: Arc<dyn TokenExchanger> = match &config.token_proxy_url {
            Some(url) => Arc::new(ProxiedExchanger::new(http.clone(), url.clone(), config)),
            None => Arc::new(DirectExchanger::new(http.clone(), config)?),
        };

        let fetcher: Arc<dyn ProfileFetcher> = match &config.user_info_proxy_url {
            Some(url) => Arc::new(ProxiedProfileFetcher::new(http, url.clone())),
            None => Arc::new(DirectProfileFetcher::new(http, config)?),
        };

        Ok(Self { exchanger, fetcher })
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenExchangeFailed`] on transport failure, timeout,
    /// non-success status, or a response without an access token.
    pub async fn exchange_token(&self, code: &str, code_verifier: &str) -> Result<Tokens> {
        self.exchanger.exchange(code, code_verifier).await
    }

    /// Fetches the user profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProfileFetchFailed`] on transport failure, timeout,
    /// non-success status or an unparseable body.
    pub async fn fetch_user_info(&self, access_token: &str) -> Result<Option<Profile>> {
        self.fetcher.fetch(access_token).await
    }
}

impl fmt::Debug for IdentityProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityProviderClient")
            .field("exchanger", &self.exchanger.name())
            .field("fetcher", &self.fetcher.name())
            .finish()
    }
}

/// Describes a transport failure without leaking request bodies.
fn transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}
