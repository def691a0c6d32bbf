//! Outbound bearer credential management.
//!
//! [`TokenManager`] is a lazy credential cache: nothing is fetched at
//! startup, and the first outbound call (or any call close enough to expiry)
//! triggers a synchronous refresh against the token-issuance endpoint.
//!
//! The check-then-refresh sequence is deliberately not single-flight: two
//! tasks that both observe a near-expired credential both refresh. Each
//! refresh is idempotent and the last cache write wins, so the redundancy
//! costs a network round trip, not correctness. The cache lock is never held
//! across an await point.

use crate::error::{AuthError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

/// Refresh this many seconds before the recorded expiry.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Assumed lifetime in hours when the issuer omits `expires_at`.
const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
struct Credential {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_at: Option<String>,
}

/// Cached, auto-refreshing bearer credential.
pub struct TokenManager {
    client: Client,
    token_url: Url,
    api_key_secret: String,
    cached: RwLock<Option<Credential>>,
}

impl TokenManager {
    /// Create a manager for the given token-issuance endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if `token_url` is not a valid absolute URL.
    pub fn new(client: Client, token_url: &str, api_key_secret: String) -> Result<Self> {
        let token_url = Url::parse(token_url).map_err(|e| AuthError::InvalidTokenUrl {
            url: token_url.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            client,
            token_url,
            api_key_secret,
            cached: RwLock::new(None),
        })
    }

    /// Return a credential valid for at least the refresh margin, fetching a
    /// fresh one if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if a refresh was needed and the fetch failed
    /// (transport error, non-2xx status, or malformed body). The cached
    /// credential is left exactly as it was before the failed attempt.
    pub async fn ensure_valid_credential(&self) -> Result<String> {
        if let Some(token) = self.cached_valid_token(Utc::now()) {
            return Ok(token);
        }

        let fresh = self.fetch_credential().await?;
        let token = fresh.token.clone();
        *self.cached.write() = Some(fresh);
        Ok(token)
    }

    fn cached_valid_token(&self, now: DateTime<Utc>) -> Option<String> {
        let guard = self.cached.read();
        let cred = guard.as_ref()?;
        let margin = TimeDelta::seconds(REFRESH_MARGIN_SECS);
        (now < cred.expires_at - margin).then(|| cred.token.clone())
    }

    async fn fetch_credential(&self) -> Result<Credential> {
        tracing::debug!(url = %self.token_url, "refreshing API credential");

        let response = self
            .client
            .post(self.token_url.clone())
            .json(&json!({ "api_key_secret": self.api_key_secret }))
            .send()
            .await
            .map_err(|e| AuthError::TokenRequest {
                url: self.token_url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpointStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenResponseParse(e.to_string()))?;

        let expires_at = match body.expires_at {
            Some(raw) => parse_expiry(&raw)?,
            None => Utc::now() + TimeDelta::hours(DEFAULT_TTL_HOURS),
        };

        tracing::info!(expires_at = %expires_at, "API credential refreshed");

        Ok(Credential {
            token: body.access_token,
            expires_at,
        })
    }
}

/// Parse an RFC 3339 expiry timestamp.
///
/// A trailing `Z` is an explicit UTC offset in RFC 3339, so `2099-01-01T00:00:00Z`
/// parses without any pre-normalization.
fn parse_expiry(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AuthError::ExpiryParse {
            raw: raw.to_string(),
            source: e,
        })
}

/// Outbound authentication mode, selected once at startup.
///
/// A refresh secret takes precedence over a static token when both are
/// configured. With neither, outbound calls proceed unauthenticated (and will
/// likely be rejected by the remote API).
pub enum OutboundAuth {
    Refreshing(TokenManager),
    Static { token: String },
    Unauthenticated,
}

impl OutboundAuth {
    /// Select the auth mode from the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if a refresh secret is configured but `token_url` is
    /// not a valid URL.
    pub fn select(
        client: Client,
        token_url: &str,
        api_key_secret: Option<String>,
        static_token: Option<String>,
    ) -> Result<Self> {
        if let Some(secret) = api_key_secret {
            tracing::info!("outbound auth: auto-refreshing credential");
            return Ok(OutboundAuth::Refreshing(TokenManager::new(
                client, token_url, secret,
            )?));
        }
        if let Some(token) = static_token {
            tracing::info!("outbound auth: static API token");
            return Ok(OutboundAuth::Static { token });
        }
        tracing::warn!(
            "no API credential configured; outbound calls will be unauthenticated and may fail"
        );
        Ok(OutboundAuth::Unauthenticated)
    }

    /// The bearer token to attach to the next outbound request, if any.
    ///
    /// # Errors
    ///
    /// In refreshing mode, propagates credential fetch failures; the outbound
    /// request must not proceed with a stale or missing credential.
    pub async fn bearer_token(&self) -> Result<Option<String>> {
        match self {
            OutboundAuth::Refreshing(manager) => {
                Ok(Some(manager.ensure_valid_credential().await?))
            }
            OutboundAuth::Static { token } => Ok(Some(token.clone())),
            OutboundAuth::Unauthenticated => Ok(None),
        }
    }
}
