//! Profile fetch strategies.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use url::Url;

use super::transport_error;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::profile::Profile;

/// Fetches the user profile for an access token.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    /// Fetches the profile. `Ok(None)` means the endpoint answered with no profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProfileFetchFailed`] on transport failure, timeout,
    /// non-success status or an unparseable body.
    async fn fetch(&self, access_token: &str) -> Result<Option<Profile>>;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "custom"
    }
}

#[derive(Serialize)]
struct ProxyUserInfoRequest<'a> {
    token: &'a str,
}

/// Posts `{token}` as JSON to a backend proxy.
#[derive(Debug, Clone)]
pub struct ProxiedProfileFetcher {
    http: Client,
    url: Url,
}

impl ProxiedProfileFetcher {
    /// Creates a proxied fetcher.
    #[must_use]
    pub const fn new(http: Client, url: Url) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl ProfileFetcher for ProxiedProfileFetcher {
    async fn fetch(&self, access_token: &str) -> Result<Option<Profile>> {
        tracing::debug!(url = %self.url, "fetching profile through proxy");
        let response = self
            .http
            .post(self.url.clone())
            .json(&ProxyUserInfoRequest {
                token: access_token,
            })
            .send()
            .await;
        read_profile_response(response).await
    }

    fn name(&self) -> &'static str {
        "proxied"
    }
}

/// Calls the provider userinfo endpoint with a bearer token.
#[derive(Debug, Clone)]
pub struct DirectProfileFetcher {
    http: Client,
    userinfo_url: Url,
}

impl DirectProfileFetcher {
    /// Creates a direct fetcher for the configured environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the userinfo endpoint URL is invalid.
    pub fn new(http: Client, config: &Config) -> Result<Self> {
        Ok(Self {
            http,
            userinfo_url: config.endpoint("userinfo")?,
        })
    }
}

#[async_trait]
impl ProfileFetcher for DirectProfileFetcher {
    async fn fetch(&self, access_token: &str) -> Result<Option<Profile>> {
        tracing::debug!(url = %self.userinfo_url, "fetching profile from provider");
        let response = self
            .http
            .get(self.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await;
        read_profile_response(response).await
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

async fn read_profile_response(
    response: std::result::Result<Response, reqwest::Error>,
) -> Result<Option<Profile>> {
    let response = response.map_err(|e| Error::ProfileFetchFailed(transport_error(&e)))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::ProfileFetchFailed(format!("HTTP {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::ProfileFetchFailed(transport_error(&e)))?;
    if body.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str::<Option<Profile>>(&body)
        .map_err(|e| Error::ProfileFetchFailed(format!("invalid profile response: {e}")))
}
