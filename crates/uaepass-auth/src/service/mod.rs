//! Authentication state machine.
//!
//! [`AuthService`] is the single writer of status, tokens, profile and error.
//! Callers drive it through [`AuthService::login`],
//! [`AuthService::handle_callback`], [`AuthService::logout`] and
//! [`AuthService::reset_error`], and observe it through the read-only
//! accessors or a [`watch`] subscription.

mod navigator;
mod state;

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use url::Url;

pub use navigator::Navigator;
pub use state::{AuthState, AuthStatus};

use crate::config::Config;
use crate::error::{AuthFailure, Error, Result};
use crate::pkce::RandomGenerator;
use crate::profile::Profile;
use crate::provider::{self, IdentityProviderClient};
use crate::storage::{EphemeralStore, RedirectRecord, SessionStore, StorageBackends};
use crate::token::Tokens;

/// Query parameters the callback handler consumes.
#[derive(Debug, Default)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackParams {
    /// First non-empty occurrence of each parameter, percent-decoded once.
    fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            let slot = match &*key {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

/// Builder for [`AuthService`].
pub struct AuthServiceBuilder {
    config: Config,
    storage: Option<StorageBackends>,
    navigator: Option<Arc<dyn Navigator>>,
    identity_provider: Option<IdentityProviderClient>,
}

impl AuthServiceBuilder {
    /// Creates a builder. Without further calls the service uses in-memory
    /// storage, has no navigator and picks its HTTP strategies from `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            storage: None,
            navigator: None,
            identity_provider: None,
        }
    }

    /// Sets the session-scoped and durable storage backends.
    #[must_use]
    pub fn storage(mut self, storage: StorageBackends) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the navigator used for the authorize and logout redirects.
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Replaces the configuration-selected token exchange and profile fetch.
    #[must_use]
    pub fn identity_provider(mut self, client: IdentityProviderClient) -> Self {
        self.identity_provider = Some(client);
        self
    }

    /// Builds the service and restores any persisted session.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn build(self) -> Result<AuthService> {
        self.config.validate()?;

        let provider = match self.identity_provider {
            Some(client) => client,
            None => IdentityProviderClient::from_config(&self.config)?,
        };
        let backends = self.storage.unwrap_or_default();
        let ephemeral = EphemeralStore::new(Arc::clone(&backends.session));
        let sessions = SessionStore::new(self.config.persistence, backends);
        let initial = restore(&sessions);

        debug!(
            status = %initial.status,
            persistence = %self.config.persistence,
            provider = ?provider,
            "auth service ready"
        );

        let (state, _) = watch::channel(initial);
        Ok(AuthService {
            random: RandomGenerator::new(self.config.random_policy),
            config: self.config,
            provider,
            sessions,
            ephemeral,
            navigator: self.navigator,
            state,
            callback_guard: Mutex::new(()),
        })
    }
}

impl fmt::Debug for AuthServiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthServiceBuilder")
            .field("config", &self.config)
            .field("has_storage", &self.storage.is_some())
            .field("has_navigator", &self.navigator.is_some())
            .field("identity_provider", &self.identity_provider)
            .finish()
    }
}

/// Loads a persisted session. Expired or empty tokens are removed.
fn restore(sessions: &SessionStore) -> AuthState {
    let tokens = match sessions.load_tokens() {
        Ok(Some(tokens)) => tokens,
        Ok(None) => return AuthState::default(),
        Err(e) => {
            warn!(error = %e, "failed to read persisted session");
            return AuthState::default();
        }
    };

    if !tokens.is_valid() {
        info!("persisted session expired, discarding");
        if let Err(e) = sessions.clear_all() {
            warn!(error = %e, "failed to discard expired session");
        }
        return AuthState::default();
    }

    let profile = sessions.load_profile().unwrap_or_else(|e| {
        warn!(error = %e, "failed to read persisted profile");
        None
    });
    info!("restored persisted session");
    AuthState::restored(tokens, profile)
}

/// UAE PASS authentication state machine.
///
/// One instance per user session. Every mutation goes through the methods
/// below; the state is observable through [`AuthService::subscribe`].
pub struct AuthService {
    config: Config,
    provider: IdentityProviderClient,
    sessions: SessionStore,
    ephemeral: EphemeralStore,
    navigator: Option<Arc<dyn Navigator>>,
    random: RandomGenerator,
    state: watch::Sender<AuthState>,
    callback_guard: Mutex<()>,
}

impl AuthService {
    /// Creates a builder.
    #[must_use]
    pub const fn builder(config: Config) -> AuthServiceBuilder {
        AuthServiceBuilder::new(config)
    }

    /// Creates a service with in-memory storage, no navigator and
    /// configuration-selected HTTP strategies.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Configuration this service was built with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Snapshot of the whole state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.state.borrow().status
    }

    /// Current tokens.
    #[must_use]
    pub fn tokens(&self) -> Option<Tokens> {
        self.state.borrow().tokens.clone()
    }

    /// Current profile.
    #[must_use]
    pub fn profile(&self) -> Option<Profile> {
        self.state.borrow().profile.clone()
    }

    /// Failure of the last attempt.
    #[must_use]
    pub fn error(&self) -> Option<AuthFailure> {
        self.state.borrow().error.clone()
    }

    /// Returns `true` when authenticated with tokens held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Provider logout URL for this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider base URL is invalid.
    pub fn logout_url(&self) -> Result<Url> {
        provider::logout_url(&self.config)
    }

    /// Generates a fresh state and PKCE pair, records them for the callback
    /// and returns the authorize URL. Does not navigate or change status.
    ///
    /// Any previous attempt's record is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CryptoUnavailable`] if no secure random source is
    /// available under [`RandomPolicy::FailClosed`](crate::RandomPolicy::FailClosed),
    /// or a storage error if the record cannot be written.
    pub fn begin_authorization(&self) -> Result<Url> {
        let state = self.random.generate_state()?;
        let pkce = self.random.generate_pkce_pair()?;
        let url = provider::build_authorize_url(&self.config, &state, &pkce.code_challenge)?;
        self.ephemeral
            .put(&RedirectRecord::new(state, pkce.code_verifier))?;
        debug!(url = %url, "authorization attempt prepared");
        Ok(url)
    }

    /// Starts a login: moves to `authorizing`, prepares the attempt and
    /// navigates to the authorize page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CryptoUnavailable`] or
    /// [`Error::NavigationUnavailable`] after recording the failure in the
    /// state. Storage errors are returned with the previous status restored.
    pub fn login(&self) -> Result<()> {
        let previous = self.state.borrow().status;
        self.state.send_modify(|s| {
            s.status = AuthStatus::Authorizing;
            s.error = None;
        });
        debug!("login started");

        let url = match self.begin_authorization() {
            Ok(url) => url,
            Err(e) => {
                if e.kind().is_some() {
                    self.fail(&e);
                } else {
                    warn!(error = %e, "failed to prepare authorization attempt");
                    self.state.send_modify(|s| s.status = previous);
                }
                return Err(e);
            }
        };

        let navigated = match &self.navigator {
            Some(navigator) => navigator.navigate(&url).map_err(|e| {
                warn!(error = %e, "navigator failed");
                Error::NavigationUnavailable
            }),
            None => Err(Error::NavigationUnavailable),
        };

        if let Err(e) = navigated {
            self.clear_ephemeral();
            self.fail(&e);
            return Err(e);
        }

        info!("redirected to UAE PASS authorize page");
        Ok(())
    }

    /// Handles the redirect back from the provider.
    ///
    /// `url` may be absolute or relative to the configured redirect URI. A URL
    /// carrying neither `code` nor `error` is ignored.
    ///
    /// `error` is checked before `code`: when a URL carries both, the call
    /// fails with [`Error::Provider`] and the code is never exchanged. A
    /// `code` is only considered when no `error` parameter is present.
    ///
    /// The recorded attempt is consumed before the token exchange starts, so
    /// a callback can never be replayed.
    ///
    /// A profile fetch failure is logged and leaves the session authenticated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CallbackInProgress`] without touching state if another
    /// callback is being handled. Every other error is also recorded in the
    /// state: [`Error::InvalidCallbackUrl`], [`Error::Provider`],
    /// [`Error::StateMismatch`] or [`Error::TokenExchangeFailed`].
    pub async fn handle_callback(&self, url: &str) -> Result<()> {
        let Ok(_guard) = self.callback_guard.try_lock() else {
            warn!("callback already in progress, rejecting concurrent call");
            return Err(Error::CallbackInProgress);
        };

        let url = match self.parse_callback_url(url) {
            Ok(url) => url,
            Err(e) => {
                self.clear_ephemeral();
                self.fail(&e);
                return Err(e);
            }
        };
        let params = CallbackParams::from_url(&url);

        if let Some(error) = params.error {
            self.clear_ephemeral();
            let e = Error::provider(error, params.error_description);
            warn!(error = %e, "provider returned an error");
            self.fail(&e);
            return Err(e);
        }

        let Some(code) = params.code else {
            debug!("URL carries no authorization response, ignoring");
            return Ok(());
        };

        let record = self.ephemeral.take().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read authorization attempt");
            None
        });
        let record = match record {
            Some(record) if params.state.as_deref() == Some(record.state.as_str()) => record,
            _ => {
                warn!("callback state does not match the recorded attempt");
                self.fail(&Error::StateMismatch);
                return Err(Error::StateMismatch);
            }
        };

        self.state.send_modify(|s| {
            s.status = AuthStatus::ExchangingToken;
            s.error = None;
        });
        debug!("exchanging authorization code");

        let tokens = match self
            .provider
            .exchange_token(&code, &record.code_verifier)
            .await
        {
            Ok(tokens) => tokens,
            Err(e) => {
                let e = match e {
                    e @ Error::TokenExchangeFailed(_) => e,
                    other => Error::TokenExchangeFailed(other.to_string()),
                };
                if self.status() == AuthStatus::ExchangingToken {
                    warn!(error = %e, "token exchange failed");
                    self.fail(&e);
                }
                return Err(e);
            }
        };

        if self.status() != AuthStatus::ExchangingToken {
            debug!("attempt superseded during token exchange, discarding tokens");
            return Ok(());
        }

        self.accept_tokens(&tokens);
        self.load_profile(&tokens).await;
        Ok(())
    }

    /// Ends the session: clears memory, persisted session data and any
    /// pending attempt, then navigates to the provider logout page if a
    /// navigator is set.
    ///
    /// # Errors
    ///
    /// Returns the first storage error. All steps run regardless.
    pub fn logout(&self) -> Result<()> {
        self.state.send_replace(AuthState {
            status: AuthStatus::LoggedOut,
            ..AuthState::default()
        });

        let cleared = self.sessions.clear_all();
        let ephemeral = self.ephemeral.clear();
        info!("logged out");

        if let Some(navigator) = &self.navigator {
            match self.logout_url() {
                Ok(url) => {
                    if let Err(e) = navigator.navigate(&url) {
                        warn!(error = %e, "failed to open provider logout page");
                    }
                }
                Err(e) => warn!(error = %e, "failed to build provider logout URL"),
            }
        } else {
            debug!("no navigator, skipping provider logout page");
        }

        cleared.and(ephemeral)
    }

    /// Clears the error. An `error` status reverts to `idle`; any other
    /// status, tokens and profile are left alone.
    pub fn reset_error(&self) {
        self.state.send_if_modified(|s| {
            let had_error = s.error.take().is_some();
            if s.status == AuthStatus::Error {
                s.status = AuthStatus::Idle;
                return true;
            }
            had_error
        });
    }

    fn parse_callback_url(&self, url: &str) -> Result<Url> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidCallbackUrl("empty URL".into()));
        }
        self.config
            .redirect_uri
            .join(url)
            .map_err(|e| Error::InvalidCallbackUrl(e.to_string()))
    }

    fn fail(&self, error: &Error) {
        let failure = AuthFailure::from_error(error);
        self.state.send_modify(|s| {
            s.status = AuthStatus::Error;
            s.error = failure;
        });
    }

    fn clear_ephemeral(&self) {
        if let Err(e) = self.ephemeral.clear() {
            warn!(error = %e, "failed to clear authorization attempt");
        }
    }

    fn accept_tokens(&self, tokens: &Tokens) {
        if let Err(e) = self.sessions.save_tokens(tokens) {
            warn!(error = %e, "failed to persist tokens");
        }
        if let Err(e) = self.sessions.clear_profile() {
            warn!(error = %e, "failed to clear previous profile");
        }

        self.state.send_replace(AuthState {
            status: AuthStatus::Authenticated,
            tokens: Some(tokens.clone()),
            profile: None,
            error: None,
        });
        info!(expires_at = ?tokens.expires_at(), "authenticated");
    }

    async fn load_profile(&self, tokens: &Tokens) {
        let profile = match self.provider.fetch_user_info(&tokens.access_token).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                warn!("No user profile data received");
                return;
            }
            Err(e) => {
                warn!(error = %e, "profile fetch failed, session stays authenticated");
                return;
            }
        };

        let applied = self.state.send_if_modified(|s| {
            let current = s.status == AuthStatus::Authenticated
                && s.tokens
                    .as_ref()
                    .is_some_and(|t| t.access_token == tokens.access_token);
            if current {
                s.profile = Some(profile.clone());
            }
            current
        });

        if applied {
            if let Err(e) = self.sessions.save_profile(&profile) {
                warn!(error = %e, "failed to persist profile");
            }
            debug!("profile loaded");
        } else {
            debug!("session changed during profile fetch, discarding profile");
        }
    }
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("status", &self.status())
            .field("config", &self.config)
            .field("provider", &self.provider)
            .field("sessions", &self.sessions)
            .field("has_navigator", &self.navigator.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone)]
mod tests {
    use super::*;
    use crate::config::PersistenceMode;
    use crate::error::FailureKind;
    use crate::provider::{ProfileFetcher, TokenExchanger};
    use crate::storage::{MemoryStorage, Storage};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[derive(Default)]
    struct StubExchanger {
        calls: AtomicUsize,
        last: StdMutex<Option<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl TokenExchanger for StubExchanger {
        async fn exchange(&self, code: &str, code_verifier: &str) -> Result<Tokens> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some((code.to_string(), code_verifier.to_string()));
            if self.fail {
                return Err(Error::TokenExchangeFailed("HTTP 400 Bad Request".into()));
            }
            Ok(Tokens::new(format!("tok-{code}"))
                .with_token_type("Bearer")
                .with_expires_in(3600)
                .with_received_at(Utc::now()))
        }
    }

    #[derive(Default)]
    struct StubFetcher {
        fail: bool,
    }

    #[async_trait]
    impl ProfileFetcher for StubFetcher {
        async fn fetch(&self, _access_token: &str) -> Result<Option<Profile>> {
            if self.fail {
                return Err(Error::ProfileFetchFailed("HTTP 500".into()));
            }
            Ok(Some(Profile {
                full_name_en: Some("Test User".into()),
                ..Profile::default()
            }))
        }
    }

    #[derive(Default)]
    struct RecordingNavigator {
        visited: StdMutex<Vec<Url>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, url: &Url) -> Result<()> {
            self.visited.lock().unwrap().push(url.clone());
            Ok(())
        }
    }

    struct Harness {
        service: AuthService,
        exchanger: Arc<StubExchanger>,
        navigator: Arc<RecordingNavigator>,
        session: Arc<MemoryStorage>,
        durable: Arc<MemoryStorage>,
    }

    fn config(mode: PersistenceMode) -> Config {
        Config::builder("sandbox_stage", "http://localhost:4200/callback")
            .persistence(mode)
            .build()
            .unwrap()
    }

    fn harness_with(
        mode: PersistenceMode,
        exchanger: StubExchanger,
        fetcher: StubFetcher,
        durable: Arc<MemoryStorage>,
    ) -> Harness {
        let exchanger = Arc::new(exchanger);
        let navigator = Arc::new(RecordingNavigator::default());
        let session = MemoryStorage::shared();
        let service = AuthService::builder(config(mode))
            .storage(StorageBackends::new(session.clone(), durable.clone()))
            .navigator(navigator.clone())
            .identity_provider(IdentityProviderClient::new(
                exchanger.clone(),
                Arc::new(fetcher),
            ))
            .build()
            .unwrap();
        Harness {
            service,
            exchanger,
            navigator,
            session,
            durable,
        }
    }

    fn harness(mode: PersistenceMode) -> Harness {
        harness_with(
            mode,
            StubExchanger::default(),
            StubFetcher::default(),
            MemoryStorage::shared(),
        )
    }

    fn seed_attempt(h: &Harness, state: &str, verifier: &str) {
        h.session.set_item("uae-pass:state", state).unwrap();
        h.session.set_item("uae-pass:code_verifier", verifier).unwrap();
    }

    #[test]
    fn test_initial_state_is_idle() {
        let h = harness(PersistenceMode::None);
        assert_eq!(h.service.status(), AuthStatus::Idle);
        assert!(!h.service.is_authenticated());
        assert!(h.service.tokens().is_none());
    }

    #[test]
    fn test_login_navigates_and_records_attempt() {
        let h = harness(PersistenceMode::None);
        assert_ok!(h.service.login());

        assert_eq!(h.service.status(), AuthStatus::Authorizing);
        let visited = h.navigator.visited.lock().unwrap();
        assert_eq!(visited.len(), 1);

        let state = visited[0]
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(
            h.session.get_item("uae-pass:state").unwrap().as_deref(),
            Some(state.as_str())
        );
        assert!(h.session.get_item("uae-pass:code_verifier").unwrap().is_some());
    }

    #[test]
    fn test_login_without_navigator_fails() {
        let service = AuthService::builder(config(PersistenceMode::None))
            .identity_provider(IdentityProviderClient::new(
                Arc::new(StubExchanger::default()),
                Arc::new(StubFetcher::default()),
            ))
            .build()
            .unwrap();

        let err = assert_err!(service.login());
        assert!(matches!(err, Error::NavigationUnavailable));
        assert_eq!(service.status(), AuthStatus::Error);
        assert_eq!(
            service.error().map(|e| e.kind),
            Some(FailureKind::NavigationUnavailable)
        );
        assert_eq!(
            service.error().map(|e| e.message).as_deref(),
            Some("Window is not available to redirect")
        );
    }

    #[test]
    fn test_failing_navigator_clears_attempt() {
        let session = MemoryStorage::shared();
        let failing = |_: &Url| -> Result<()> { Err(Error::Storage("no window".into())) };
        let service = AuthService::builder(config(PersistenceMode::None))
            .storage(StorageBackends::new(session.clone(), MemoryStorage::shared()))
            .navigator(Arc::new(failing))
            .identity_provider(IdentityProviderClient::new(
                Arc::new(StubExchanger::default()),
                Arc::new(StubFetcher::default()),
            ))
            .build()
            .unwrap();

        assert!(service.login().is_err());
        assert_eq!(service.status(), AuthStatus::Error);
        assert!(session.keys().is_empty());
    }

    #[test]
    fn test_begin_authorization_does_not_change_status() {
        let h = harness(PersistenceMode::None);
        let url = h.service.begin_authorization().unwrap();
        assert!(url.as_str().contains("code_challenge_method=S256"));
        assert_eq!(h.service.status(), AuthStatus::Idle);
        assert!(h.navigator.visited.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_state_mismatch_skips_exchange() {
        let h = harness(PersistenceMode::None);
        seed_attempt(&h, "abc", "v");

        let err = h
            .service
            .handle_callback("http://localhost:4200/callback?state=xyz&code=123")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::StateMismatch));
        assert_eq!(h.service.status(), AuthStatus::Error);
        assert_eq!(
            h.service.error().map(|e| e.kind),
            Some(FailureKind::StateMismatch)
        );
        assert_eq!(h.exchanger.calls.load(Ordering::SeqCst), 0);
        assert!(h.session.keys().is_empty());
    }

    #[tokio::test]
    async fn test_missing_attempt_is_state_mismatch() {
        let h = harness(PersistenceMode::None);
        let err = h
            .service
            .handle_callback("http://localhost:4200/callback?state=s1&code=c1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StateMismatch));
        assert_eq!(h.exchanger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successful_callback() {
        let h = harness(PersistenceMode::SessionScoped);
        seed_attempt(&h, "s1", "v1");

        h.service
            .handle_callback("http://localhost:4200/callback?code=c1&state=s1")
            .await
            .unwrap();

        assert_eq!(h.service.status(), AuthStatus::Authenticated);
        assert!(h.service.is_authenticated());
        assert_eq!(h.service.tokens().unwrap().access_token, "tok-c1");
        assert_eq!(
            h.service.profile().unwrap().full_name_en.as_deref(),
            Some("Test User")
        );
        assert_eq!(
            *h.exchanger.last.lock().unwrap(),
            Some(("c1".to_string(), "v1".to_string()))
        );
        assert_eq!(
            h.session.keys(),
            vec!["uae-pass:profile".to_string(), "uae-pass:tokens".to_string()]
        );
        assert!(h.durable.keys().is_empty());
    }

    #[tokio::test]
    async fn test_callback_is_not_replayable() {
        let h = harness(PersistenceMode::None);
        seed_attempt(&h, "s1", "v1");
        let url = "http://localhost:4200/callback?code=c1&state=s1";

        h.service.handle_callback(url).await.unwrap();
        let err = h.service.handle_callback(url).await.unwrap_err();

        assert!(matches!(err, Error::StateMismatch));
        assert_eq!(h.exchanger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_relative_callback_url() {
        let h = harness(PersistenceMode::None);
        seed_attempt(&h, "s1", "v1");
        h.service
            .handle_callback("/callback?code=c1&state=s1")
            .await
            .unwrap();
        assert!(h.service.is_authenticated());
    }

    #[tokio::test]
    async fn test_provider_error_passthrough() {
        let h = harness(PersistenceMode::None);
        seed_attempt(&h, "s1", "v1");

        let err = h
            .service
            .handle_callback(
                "http://localhost:4200/callback?error=access_denied&error_description=User%20cancelled",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provider { .. }));
        let failure = h.service.error().unwrap();
        assert_eq!(failure.kind, FailureKind::ProviderError);
        assert!(failure.message.contains("access_denied"));
        assert!(failure.message.contains("User cancelled"));
        assert!(h.session.keys().is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_wins_over_code() {
        let h = harness(PersistenceMode::None);
        seed_attempt(&h, "s1", "v1");
        let err = h
            .service
            .handle_callback("http://localhost:4200/callback?code=c1&state=s1&error=login_required")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
        assert_eq!(h.exchanger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unrelated_url_is_noop() {
        let h = harness(PersistenceMode::None);
        seed_attempt(&h, "s1", "v1");
        let before = h.service.state();

        h.service
            .handle_callback("http://localhost:4200/home?tab=profile")
            .await
            .unwrap();

        assert_eq!(h.service.state(), before);
        assert_eq!(h.session.keys().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_url_is_invalid_callback() {
        let h = harness(PersistenceMode::None);
        let err = h.service.handle_callback("  ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCallbackUrl(_)));
        assert_eq!(
            h.service.error().map(|e| e.kind),
            Some(FailureKind::InvalidCallback)
        );
    }

    #[tokio::test]
    async fn test_exchange_failure_sets_error() {
        let h = harness_with(
            PersistenceMode::DurableScoped,
            StubExchanger {
                fail: true,
                ..StubExchanger::default()
            },
            StubFetcher::default(),
            MemoryStorage::shared(),
        );
        seed_attempt(&h, "s1", "v1");

        let err = h
            .service
            .handle_callback("http://localhost:4200/callback?code=c1&state=s1")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TokenExchangeFailed(_)));
        assert_eq!(h.service.status(), AuthStatus::Error);
        assert!(h.service.tokens().is_none());
        assert!(h.session.keys().is_empty());
        assert!(h.durable.keys().is_empty());
    }

    #[tokio::test]
    async fn test_profile_failure_keeps_session() {
        let h = harness_with(
            PersistenceMode::None,
            StubExchanger::default(),
            StubFetcher { fail: true },
            MemoryStorage::shared(),
        );
        seed_attempt(&h, "s1", "v1");

        h.service
            .handle_callback("http://localhost:4200/callback?code=c1&state=s1")
            .await
            .unwrap();

        assert_eq!(h.service.status(), AuthStatus::Authenticated);
        assert!(h.service.profile().is_none());
        assert!(h.service.error().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_callback_is_rejected() {
        let h = harness(PersistenceMode::None);
        let _held = h.service.callback_guard.lock().await;

        let err = h
            .service
            .handle_callback("http://localhost:4200/callback?code=c1&state=s1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CallbackInProgress));
        assert_eq!(h.service.status(), AuthStatus::Idle);
    }

    #[tokio::test]
    async fn test_logout_clears_everything_and_navigates() {
        let h = harness(PersistenceMode::SessionScoped);
        seed_attempt(&h, "s1", "v1");
        h.service
            .handle_callback("http://localhost:4200/callback?code=c1&state=s1")
            .await
            .unwrap();
        seed_attempt(&h, "s2", "v2");

        h.service.logout().unwrap();

        assert_eq!(h.service.state(), AuthState {
            status: AuthStatus::LoggedOut,
            ..AuthState::default()
        });
        assert!(h.session.keys().is_empty());
        let visited = h.navigator.visited.lock().unwrap();
        assert!(
            visited
                .last()
                .unwrap()
                .as_str()
                .starts_with("https://stg-id.uaepass.ae/idshub/logout?redirect_uri=")
        );
    }

    #[tokio::test]
    async fn test_reset_error_returns_to_idle() {
        let h = harness(PersistenceMode::None);
        let _ = h.service.handle_callback("?error=access_denied").await;
        assert_eq!(h.service.status(), AuthStatus::Error);

        h.service.reset_error();
        assert_eq!(h.service.status(), AuthStatus::Idle);
        assert!(h.service.error().is_none());
    }

    #[test]
    fn test_reset_error_leaves_other_status() {
        let h = harness(PersistenceMode::None);
        h.service.login().unwrap();
        h.service.reset_error();
        assert_eq!(h.service.status(), AuthStatus::Authorizing);
    }

    #[test]
    fn test_restores_valid_session() {
        let durable = MemoryStorage::shared();
        let tokens = Tokens::new("persisted")
            .with_expires_in(3600)
            .with_received_at(Utc::now());
        durable
            .set_item("uae-pass:tokens", &serde_json::to_string(&tokens).unwrap())
            .unwrap();
        durable
            .set_item("uae-pass:profile", r#"{"fullnameEN":"Restored"}"#)
            .unwrap();

        let h = harness_with(
            PersistenceMode::DurableScoped,
            StubExchanger::default(),
            StubFetcher::default(),
            durable,
        );
        assert!(h.service.is_authenticated());
        assert_eq!(h.service.tokens().unwrap(), tokens);
        assert_eq!(
            h.service.profile().unwrap().display_name("en"),
            Some("Restored")
        );
    }

    #[test]
    fn test_expired_session_is_discarded() {
        let durable = MemoryStorage::shared();
        let tokens = Tokens::new("old")
            .with_expires_in(60)
            .with_received_at(Utc::now() - Duration::hours(2));
        durable
            .set_item("uae-pass:tokens", &serde_json::to_string(&tokens).unwrap())
            .unwrap();

        let h = harness_with(
            PersistenceMode::DurableScoped,
            StubExchanger::default(),
            StubFetcher::default(),
            durable,
        );
        assert_eq!(h.service.status(), AuthStatus::Idle);
        assert!(h.durable.keys().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let h = harness(PersistenceMode::None);
        let mut rx = h.service.subscribe();
        seed_attempt(&h, "s1", "v1");

        h.service
            .handle_callback("http://localhost:4200/callback?code=c1&state=s1")
            .await
            .unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, AuthStatus::Authenticated);
    }
}
