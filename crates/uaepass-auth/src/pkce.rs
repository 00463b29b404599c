//! PKCE (Proof Key for Code Exchange) and `state` generation.
//!
//! PKCE (RFC 7636) binds the authorization code to a verifier only this
//! client holds. Verifiers and `state` values are drawn uniformly from the
//! RFC 3986 unreserved character set using the operating system's secure
//! random source.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};

use crate::config::RandomPolicy;
use crate::error::{Error, Result};

/// RFC 3986 unreserved characters: `A-Z a-z 0-9 - . _ ~`.
pub const UNRESERVED_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Length of generated `state` values.
pub const STATE_LENGTH: usize = 32;

/// Length of generated code verifiers (RFC 7636 allows 43-128).
pub const VERIFIER_LENGTH: usize = 64;

/// The only supported challenge method.
pub const CHALLENGE_METHOD: &str = "S256";

/// PKCE code verifier and its S256 challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    /// Code verifier (random string).
    pub code_verifier: String,
    /// Code challenge: base64url(SHA-256(verifier)) without padding.
    pub code_challenge: String,
}

impl PkcePair {
    /// Builds a pair from an existing verifier.
    #[must_use]
    pub fn from_verifier(code_verifier: impl Into<String>) -> Self {
        let code_verifier = code_verifier.into();
        let code_challenge = code_challenge_s256(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
        }
    }

    /// Returns the challenge method (always `S256`).
    #[must_use]
    pub const fn method(&self) -> &'static str {
        CHALLENGE_METHOD
    }
}

/// Computes the S256 code challenge for a verifier.
#[must_use]
pub fn code_challenge_s256(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Source of opaque random strings, honoring a [`RandomPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGenerator {
    policy: RandomPolicy,
}

impl RandomGenerator {
    /// Creates a generator with the given fallback policy.
    #[must_use]
    pub const fn new(policy: RandomPolicy) -> Self {
        Self { policy }
    }

    /// Draws `length` characters uniformly from `charset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CryptoUnavailable`] if the OS random source fails and
    /// the policy is [`RandomPolicy::FailClosed`], or
    /// [`Error::InvalidConfig`] if `charset` is empty or longer than 256 bytes.
    pub fn opaque_string(&self, length: usize, charset: &[u8]) -> Result<String> {
        self.opaque_string_with(&mut OsRng, length, charset)
    }

    /// Generates a `state` value.
    ///
    /// # Errors
    ///
    /// See [`RandomGenerator::opaque_string`].
    pub fn generate_state(&self) -> Result<String> {
        self.opaque_string(STATE_LENGTH, UNRESERVED_CHARSET)
    }

    /// Generates a fresh PKCE pair.
    ///
    /// # Errors
    ///
    /// See [`RandomGenerator::opaque_string`].
    pub fn generate_pkce_pair(&self) -> Result<PkcePair> {
        let verifier = self.opaque_string(VERIFIER_LENGTH, UNRESERVED_CHARSET)?;
        Ok(PkcePair::from_verifier(verifier))
    }

    pub(crate) fn opaque_string_with<R: RngCore + ?Sized>(
        &self,
        rng: &mut R,
        length: usize,
        charset: &[u8],
    ) -> Result<String> {
        if charset.is_empty() || charset.len() > 256 {
            return Err(Error::InvalidConfig(format!(
                "charset must hold 1..=256 symbols, got {}",
                charset.len()
            )));
        }

        match draw(rng, length, charset) {
            Ok(value) => Ok(value),
            Err(e) => match self.policy {
                RandomPolicy::FailClosed => Err(Error::CryptoUnavailable(e.to_string())),
                RandomPolicy::AllowInsecureFallback => {
                    tracing::warn!(
                        error = %e,
                        "secure random source unavailable, using reduced-security fallback"
                    );
                    let mut fallback = StdRng::seed_from_u64(time_seed());
                    draw(&mut fallback, length, charset)
                        .map_err(|e| Error::CryptoUnavailable(e.to_string()))
                }
            },
        }
    }
}

/// Rejection sampling keeps every symbol equally likely.
fn draw<R: RngCore + ?Sized>(
    rng: &mut R,
    length: usize,
    charset: &[u8],
) -> std::result::Result<String, rand::Error> {
    let n = charset.len();
    // Largest multiple of n that fits in a byte; bytes at or above it are discarded.
    let zone = 256 - (256 % n);
    let mut out = String::with_capacity(length);
    let mut buf = [0u8; 64];

    while out.len() < length {
        rng.try_fill_bytes(&mut buf)?;
        for &b in &buf {
            if usize::from(b) < zone {
                out.push(char::from(charset[usize::from(b) % n]));
                if out.len() == length {
                    break;
                }
            }
        }
    }

    Ok(out)
}

fn time_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    #[allow(clippy::cast_possible_truncation)]
    let low = nanos as u64;
    low ^ u64::from(std::process::id()).rotate_left(32)
}
