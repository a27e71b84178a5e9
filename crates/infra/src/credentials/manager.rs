//! Token manager with automatic refresh
//!
//! Single source of truth for "what bearer token should be used right now":
//! - reads the credential record from the store, falling back to statically
//!   configured tokens when the store is empty (degraded bootstrap mode)
//! - refreshes synchronously when the token is inside the expiry grace
//!   period, and proactively when a scheduler asks
//! - persists the full record after every successful refresh

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dakoku_core::CredentialStore;
use dakoku_domain::{CredentialStorage, FreeeConfig, TokenStatus};
use reqwest::Method;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::store::{
    ACCESS_TOKEN_KEY, LAST_REFRESH_KEY, REFRESH_TOKEN_KEY, TOKEN_EXPIRES_AT_KEY,
};
use crate::http::HttpClient;

/// Lead time before expiry during which a stored token is treated as stale.
const GRACE_PERIOD_MS: i64 = 5 * 60 * 1000;

/// Refresh proactively when expiry is at most this many minutes away.
pub const PROACTIVE_THRESHOLD_MINUTES: i64 = 30;

/// freee issues 6-hour access tokens; used when seeding omits `expires_in`.
pub const DEFAULT_SEED_EXPIRES_IN_SECS: i64 = 21_600;

/// Out-of-band redirect URI required by the token endpoint.
const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Error type for credential operations
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No access token in the store and no fallback configured.
    #[error("no access token available (store empty, no fallback configured)")]
    NoAccessToken,

    /// No refresh token in the store and no fallback configured.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The identity provider rejected the refresh. Not retried here; the
    /// caller decides.
    #[error("token refresh rejected (HTTP {status}): {body}")]
    RefreshFailed { status: u16, body: String },

    /// The token endpoint could not be reached.
    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    /// The token endpoint returned an unparseable success body.
    #[error("malformed token response: {0}")]
    Decode(String),

    /// The credential store failed.
    #[error("credential store error: {0}")]
    Store(String),
}

impl From<CredentialError> for dakoku_domain::DakokuError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NoAccessToken | CredentialError::NoRefreshToken => {
                Self::Auth(err.to_string())
            }
            CredentialError::RefreshFailed { .. } => Self::Auth(err.to_string()),
            CredentialError::Transport(_) => Self::Network(err.to_string()),
            CredentialError::Decode(_) => Self::Internal(err.to_string()),
            CredentialError::Store(msg) => Self::Store(msg),
        }
    }
}

/// Token response from the identity provider (RFC 6749 refresh grant).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

/// Token manager for the freee HR integration credential.
///
/// Holds no token state in memory: every decision reads through the
/// injected store, so concurrent instances (and restarts) converge on the
/// persisted record. Concurrent refreshes are not serialized; if two race,
/// both redeem the same refresh token and last-writer-wins in the store.
pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    http: HttpClient,
    token_url: String,
    client_id: String,
    client_secret: String,
    fallback_access_token: Option<String>,
    fallback_refresh_token: Option<String>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn CredentialStore>, http: HttpClient, config: &FreeeConfig) -> Self {
        Self {
            store,
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            fallback_access_token: config.fallback_access_token.clone(),
            fallback_refresh_token: config.fallback_refresh_token.clone(),
        }
    }

    /// Get the access token to use right now, refreshing first when the
    /// stored token is inside the grace period.
    ///
    /// Store order: persisted record, then the statically configured
    /// fallback token (bootstrap/degraded mode; no expiry metadata exists
    /// for it, so it is returned as-is).
    pub async fn get_access_token(&self) -> Result<String, CredentialError> {
        let stored = match self.store.get(ACCESS_TOKEN_KEY).await {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "credential store unreadable, using fallback token");
                return self.fallback_access_token.clone().ok_or(CredentialError::NoAccessToken);
            }
        };

        let Some(token) = stored else {
            debug!("no access token in store, using configured fallback");
            return self.fallback_access_token.clone().ok_or(CredentialError::NoAccessToken);
        };

        let expires_at_ms = self
            .store
            .get(TOKEN_EXPIRES_AT_KEY)
            .await
            .ok()
            .flatten()
            .and_then(|raw| raw.parse::<i64>().ok());

        if let Some(expires_at_ms) = expires_at_ms {
            if Utc::now().timestamp_millis() >= expires_at_ms - GRACE_PERIOD_MS {
                info!("access token expires soon, refreshing");
                return self.refresh_access_token().await;
            }
        }

        Ok(token)
    }

    /// Exchange the refresh token for a new credential record and persist
    /// it.
    ///
    /// Not retried internally on provider rejection; the caller decides.
    /// Two concurrent calls may both redeem the same refresh token — the
    /// provider's rotation semantics decide the outcome, which this manager
    /// does not mask.
    pub async fn refresh_access_token(&self) -> Result<String, CredentialError> {
        let refresh_token =
            self.current_refresh_token().await.ok_or(CredentialError::NoRefreshToken)?;

        debug!(token_url = %self.token_url, "requesting token refresh");

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("redirect_uri", OOB_REDIRECT_URI),
        ];

        let request = self.http.request(Method::POST, &self.token_url).form(&params);
        let response = self
            .http
            .send(request)
            .await
            .map_err(|err| CredentialError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "token refresh rejected");
            return Err(CredentialError::RefreshFailed { status: status.as_u16(), body });
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|err| CredentialError::Decode(err.to_string()))?;

        self.save_tokens(&tokens).await?;

        info!("access token refreshed");
        Ok(tokens.access_token)
    }

    /// Seed the initial credential record (out-of-band initialization).
    pub async fn seed_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_in: Option<i64>,
    ) -> Result<(), CredentialError> {
        let tokens = TokenResponse {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_in: expires_in.unwrap_or(DEFAULT_SEED_EXPIRES_IN_SECS),
        };
        self.save_tokens(&tokens).await?;
        info!("initial tokens seeded");
        Ok(())
    }

    /// Read-only diagnostic projection of the credential state.
    ///
    /// Never refreshes and never fails: an unreadable store yields the
    /// unreachable sentinel instead.
    pub async fn get_token_status(&self) -> TokenStatus {
        let access = match self.store.get(ACCESS_TOKEN_KEY).await {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "credential store unreadable during status check");
                return TokenStatus::unreachable();
            }
        };
        let refresh = self.store.get(REFRESH_TOKEN_KEY).await.ok().flatten();
        let expires_at_ms = self
            .store
            .get(TOKEN_EXPIRES_AT_KEY)
            .await
            .ok()
            .flatten()
            .and_then(|raw| raw.parse::<i64>().ok());
        let last_refresh_ms = self
            .store
            .get(LAST_REFRESH_KEY)
            .await
            .ok()
            .flatten()
            .and_then(|raw| raw.parse::<i64>().ok());

        let storage = if access.is_none() && self.fallback_access_token.is_some() {
            CredentialStorage::Fallback
        } else {
            CredentialStorage::Store
        };

        let now_ms = Utc::now().timestamp_millis();

        TokenStatus {
            storage,
            has_access_token: access.is_some() || self.fallback_access_token.is_some(),
            has_refresh_token: refresh.is_some() || self.fallback_refresh_token.is_some(),
            expires_at: expires_at_ms.and_then(DateTime::<Utc>::from_timestamp_millis),
            minutes_until_expiry: expires_at_ms.map(|ms| ((ms - now_ms) / 60_000).max(0)),
            last_refreshed_at: last_refresh_ms.and_then(DateTime::<Utc>::from_timestamp_millis),
        }
    }

    /// Scheduler entry point: refresh when expiry is near, otherwise do
    /// nothing.
    ///
    /// Returns whether a refresh happened. Refresh failures are logged and
    /// swallowed so an unconditional scheduler tick never crashes; the next
    /// tick or the reactive 401 path recovers.
    pub async fn proactive_refresh(&self) -> bool {
        let status = self.get_token_status().await;
        debug!(?status, "proactive refresh status check");

        match status.minutes_until_expiry {
            Some(minutes) if minutes <= PROACTIVE_THRESHOLD_MINUTES => {
                info!(minutes_until_expiry = minutes, "token within proactive threshold, refreshing");
                match self.refresh_access_token().await {
                    Ok(_) => true,
                    Err(err) => {
                        warn!(error = %err, "proactive refresh failed");
                        false
                    }
                }
            }
            _ => {
                debug!("token still valid, no proactive refresh needed");
                false
            }
        }
    }

    async fn current_refresh_token(&self) -> Option<String> {
        match self.store.get(REFRESH_TOKEN_KEY).await {
            Ok(Some(token)) => Some(token),
            Ok(None) => self.fallback_refresh_token.clone(),
            Err(err) => {
                warn!(error = %err, "failed to read refresh token from store, using fallback");
                self.fallback_refresh_token.clone()
            }
        }
    }

    /// Persist the full credential record. `expires_at` is always derived
    /// from the response's `expires_in`; it is never hand-edited.
    async fn save_tokens(&self, tokens: &TokenResponse) -> Result<(), CredentialError> {
        let now_ms = Utc::now().timestamp_millis();
        let expires_at_ms = now_ms + tokens.expires_in * 1000;

        let store = |key: &'static str, value: String| {
            let store = Arc::clone(&self.store);
            async move {
                store
                    .put(key, &value)
                    .await
                    .map_err(|err| CredentialError::Store(err.to_string()))
            }
        };

        store(ACCESS_TOKEN_KEY, tokens.access_token.clone()).await?;
        store(REFRESH_TOKEN_KEY, tokens.refresh_token.clone()).await?;
        store(TOKEN_EXPIRES_AT_KEY, expires_at_ms.to_string()).await?;
        store(LAST_REFRESH_KEY, now_ms.to_string()).await?;

        debug!(
            expires_at = %DateTime::<Utc>::from_timestamp_millis(expires_at_ms)
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            "credential record persisted"
        );

        Ok(())
    }
}
