//! Bearer-token lifecycle.
//!
//! [`TokenManager`] holds at most one live token. When the token is missing
//! or expired, the first caller starts a refresh through the pluggable
//! [`TokenSource`]; every caller that arrives while that refresh is in
//! flight awaits the *same* shared future, so the identity provider sees
//! exactly one refresh call per expiry.
//!
//! The in-flight slot is cleared as soon as the refresh settles, whether it
//! succeeded or failed. A failed refresh also clears the stored token and
//! hands the same [`MigrationError`] to every waiter.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::MigrationError;

/// Source of fresh bearer tokens, implemented by the identity provider
/// integration.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtain a new raw token (usually a JWT).
    async fn refresh(&self) -> Result<String, MigrationError>;
}

/// A token source that always returns the same value.
///
/// Useful for service accounts with long-lived keys and for tests.
#[derive(Debug, Clone)]
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    /// Create a source that always yields `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// A source yielding `auth.client_secret` as a long-lived API key, or
    /// `None` when no secret is configured.
    pub fn from_config(config: &AuthConfig) -> Option<Self> {
        config.client_secret.as_deref().map(Self::new)
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn refresh(&self) -> Result<String, MigrationError> {
        Ok(self.token.clone())
    }
}

/// A bearer token and its decoded expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    /// The raw token sent in the `Authorization` header.
    pub value: String,
    /// Expiry as Unix seconds, `None` when the token could not be decoded.
    pub expiry: Option<i64>,
}

impl AuthToken {
    /// Wrap a raw token, decoding its `exp` claim if it is a JWT.
    pub fn from_raw(value: impl Into<String>) -> Self {
        let value = value.into();
        let expiry = decode_expiry(&value);
        Self { value, expiry }
    }

    /// Whether the token is expired at `now` (Unix seconds) given `skew`.
    ///
    /// A token whose expiry could not be decoded is always expired.
    pub fn is_expired_at(&self, now: i64, skew: Duration) -> bool {
        match self.expiry {
            Some(exp) => now + skew.as_secs() as i64 >= exp,
            None => true,
        }
    }
}

/// Decode the `exp` claim of a JWT without verifying its signature.
///
/// Returns `None` for anything that is not a three-segment token with a
/// base64url JSON payload carrying a numeric `exp`.
pub fn decode_expiry(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (_header, payload, _sig) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;
    exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))
}

type RefreshFuture = Shared<BoxFuture<'static, Result<AuthToken, MigrationError>>>;

#[derive(Default)]
struct TokenState {
    token: Option<AuthToken>,
    in_flight: Option<(u64, RefreshFuture)>,
    generation: u64,
}

/// Owns the live bearer token and serialises refreshes.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct TokenManager {
    source: Arc<dyn TokenSource>,
    state: Arc<Mutex<TokenState>>,
    skew: Duration,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("skew", &self.skew)
            .finish()
    }
}

impl TokenManager {
    /// Create a manager backed by `source` with a 30s expiry skew.
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(TokenState::default())),
            skew: Duration::from_secs(30),
        }
    }

    /// Create a manager backed by `source` with the configured
    /// `auth.refresh_skew_s`.
    pub fn from_config(source: Arc<dyn TokenSource>, config: &AuthConfig) -> Self {
        Self::new(source).with_skew(Duration::from_secs(config.refresh_skew_s))
    }

    /// Treat tokens as expired `skew` before their real expiry.
    pub fn with_skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    /// Return a valid token, refreshing first if the current one is
    /// missing or expired.
    ///
    /// # Errors
    ///
    /// Propagates the refresh error; the same error reaches every caller
    /// that joined the refresh.
    pub async fn get_auth_token(&self) -> Result<String, MigrationError> {
        {
            let state = self.lock()?;
            if let Some(token) = &state.token {
                if !token.is_expired_at(now_secs(), self.skew) {
                    return Ok(token.value.clone());
                }
            }
        }
        debug!("auth token missing or expired, refreshing");
        self.refresh_token().await
    }

    /// Force a refresh, joining an in-flight one if present.
    ///
    /// # Errors
    ///
    /// Propagates the refresh error from the [`TokenSource`].
    pub async fn refresh_token(&self) -> Result<String, MigrationError> {
        let refresh = {
            let mut state = self.lock()?;
            match &state.in_flight {
                Some((_, fut)) => fut.clone(),
                None => {
                    state.generation += 1;
                    let generation = state.generation;
                    let fut = self.spawn_refresh(generation);
                    state.in_flight = Some((generation, fut.clone()));
                    fut
                }
            }
        };
        refresh.await.map(|token| token.value)
    }

    /// Install a token obtained elsewhere (e.g. after an interactive login).
    pub fn set_token(&self, raw: impl Into<String>) -> Result<(), MigrationError> {
        let mut state = self.lock()?;
        state.token = Some(AuthToken::from_raw(raw));
        Ok(())
    }

    /// Drop the stored token; the next request refreshes.
    pub fn clear_token(&self) -> Result<(), MigrationError> {
        let mut state = self.lock()?;
        state.token = None;
        Ok(())
    }

    /// The stored token, if any, without checking expiry.
    pub fn current(&self) -> Option<AuthToken> {
        self.state.lock().ok().and_then(|s| s.token.clone())
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.in_flight.is_some())
            .unwrap_or(false)
    }

    fn spawn_refresh(&self, generation: u64) -> RefreshFuture {
        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);

        async move {
            let result = source.refresh().await.map(AuthToken::from_raw);

            // Settle under the lock: store or clear, then free the slot so
            // the next expiry starts a new refresh.
            if let Ok(mut guard) = state.lock() {
                match &result {
                    Ok(token) => {
                        info!(has_expiry = token.expiry.is_some(), "auth token refreshed");
                        guard.token = Some(token.clone());
                    }
                    Err(e) => {
                        warn!(error = %e, "auth token refresh failed, clearing token");
                        guard.token = None;
                    }
                }
                if matches!(&guard.in_flight, Some((g, _)) if *g == generation) {
                    guard.in_flight = None;
                }
            }
            result
        }
        .boxed()
        .shared()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, TokenState>, MigrationError> {
        self.state
            .lock()
            .map_err(|_| MigrationError::unknown("token state lock poisoned"))
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
