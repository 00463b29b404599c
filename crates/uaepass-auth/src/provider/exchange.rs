//! Authorization code exchange strategies.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response};
use serde::Serialize;
use url::Url;

use super::transport_error;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::token::{ErrorResponse, Tokens};

/// Exchanges an authorization code and verifier for tokens.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Performs the exchange.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenExchangeFailed`] if the exchange does not yield an access token.
    async fn exchange(&self, code: &str, code_verifier: &str) -> Result<Tokens>;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Body posted to the token proxy.
#[derive(Serialize)]
struct ProxyTokenRequest<'a> {
    code: &'a str,
    redirect_uri: &'a str,
    code_verifier: &'a str,
}

/// Posts `{code, redirect_uri, code_verifier}` as JSON to a backend proxy.
#[derive(Debug, Clone)]
pub struct ProxiedExchanger {
    http: Client,
    url: Url,
    redirect_uri: String,
}

impl ProxiedExchanger {
    /// Creates a proxied exchanger.
    #[must_use]
    pub fn new(http: Client, url: Url, config: &Config) -> Self {
        Self {
            http,
            url,
            redirect_uri: config.redirect_uri.to_string(),
        }
    }
}

#[async_trait]
impl TokenExchanger for ProxiedExchanger {
    async fn exchange(&self, code: &str, code_verifier: &str) -> Result<Tokens> {
        tracing::debug!(url = %self.url, "exchanging code through proxy");
        let body = ProxyTokenRequest {
            code,
            redirect_uri: &self.redirect_uri,
            code_verifier,
        };
        let response = self.http.post(self.url.clone()).json(&body).send().await;
        read_token_response(response).await
    }

    fn name(&self) -> &'static str {
        "proxied"
    }
}

/// Posts a form-encoded `authorization_code` grant to the provider token endpoint.
#[derive(Clone)]
pub struct DirectExchanger {
    http: Client,
    token_url: Url,
    client_id: String,
    redirect_uri: String,
    client_secret: Option<String>,
}

impl DirectExchanger {
    /// Creates a direct exchanger for the configured environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the token endpoint URL is invalid.
    pub fn new(http: Client, config: &Config) -> Result<Self> {
        Ok(Self {
            http,
            token_url: config.endpoint("token")?,
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.to_string(),
            client_secret: config.client_secret.clone(),
        })
    }
}

impl std::fmt::Debug for DirectExchanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectExchanger")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("has_client_secret", &self.client_secret.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenExchanger for DirectExchanger {
    async fn exchange(&self, code: &str, code_verifier: &str) -> Result<Tokens> {
        tracing::debug!(url = %self.token_url, "exchanging code with provider");
        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("client_id", &self.client_id),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
            ("code_verifier", code_verifier),
        ];

        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret));
        }

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await;
        read_token_response(response).await
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

async fn read_token_response(
    response: std::result::Result<Response, reqwest::Error>,
) -> Result<Tokens> {
    let response = response.map_err(|e| Error::TokenExchangeFailed(transport_error(&e)))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::TokenExchangeFailed(transport_error(&e)))?;

    let provider_error = || serde_json::from_str::<ErrorResponse>(&body).ok();

    if !status.is_success() {
        return Err(Error::TokenExchangeFailed(match provider_error() {
            Some(err) => format!("HTTP {status}: {err}"),
            None => format!("HTTP {status}"),
        }));
    }

    let tokens: Tokens = serde_json::from_str(&body)
        .map_err(|e| Error::TokenExchangeFailed(format!("invalid token response: {e}")))?;

    if !tokens.has_access_token() {
        return Err(Error::TokenExchangeFailed(match provider_error() {
            Some(err) => format!("no access token in response ({err})"),
            None => "no access token in response".to_string(),
        }));
    }

    Ok(tokens.with_received_at(Utc::now()))
}
