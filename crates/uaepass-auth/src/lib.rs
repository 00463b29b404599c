//! # uaepass-auth
//!
//! `OAuth2` Authorization Code + PKCE client for the UAE PASS digital identity provider.
//!
//! ## Features
//!
//! - **PKCE and state**: S256 challenge, opaque state bound to one attempt
//! - **Callback handling**: state check, one-shot verifier, provider error passthrough
//! - **Token exchange**: direct to UAE PASS or through a backend proxy holding the client secret
//! - **Session persistence**: none, session-scoped or durable storage
//! - **Observable state**: `idle → authorizing → exchanging-token → authenticated`
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use uaepass_auth::{AuthService, Config, Environment, PersistenceMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::builder("sandbox_stage", "http://localhost:4200/callback")
//!         .environment(Environment::Staging)
//!         .token_proxy_url("http://localhost:3001/api/uae-pass/token")
//!         .persistence(PersistenceMode::DurableScoped)
//!         .build()?;
//!
//!     let service = AuthService::builder(config)
//!         .navigator(Arc::new(|url: &url::Url| {
//!             println!("Open: {url}");
//!             Ok(())
//!         }))
//!         .build()?;
//!
//!     // Redirect the user agent to UAE PASS
//!     service.login()?;
//!
//!     // Later, on the redirect route
//!     service
//!         .handle_callback("http://localhost:4200/callback?code=...&state=...")
//!         .await?;
//!
//!     if let Some(profile) = service.profile() {
//!         println!("Signed in as {:?}", profile.display_name("en"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Observing State
//!
//! ```ignore
//! let mut rx = service.subscribe();
//! while rx.changed().await.is_ok() {
//!     println!("status: {}", rx.borrow().status);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod pkce;
pub mod profile;
pub mod provider;
pub mod service;
pub mod storage;
pub mod token;

pub use config::{Acr, Config, ConfigBuilder, Environment, PersistenceMode, RandomPolicy};
pub use error::{AuthFailure, Error, FailureKind, Result};
pub use pkce::{PkcePair, RandomGenerator};
pub use profile::Profile;
pub use provider::IdentityProviderClient;
pub use service::{AuthService, AuthServiceBuilder, AuthState, AuthStatus, Navigator};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageBackends};
pub use token::Tokens;
