//! Active token shape and the refresh-token exchange
//!
//! The active token is persisted as the JSON object the web app keeps in its
//! own storage (`{"token": {"token": "<jwt>", ...}, ...}`). Unknown fields
//! are carried through untouched so a pushed or refreshed object is stored
//! exactly as received.

use common::Secret;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::constants::REFRESH_PATH;
use crate::error::{Error, Result};
use crate::store::TokenStore;

/// Inner `token` object holding the compact JWT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBody {
    pub token: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The cached bearer credential as stored under `activeToken`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveToken {
    pub token: TokenBody,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActiveToken {
    /// Wrap a bare JWT in the stored shape.
    pub fn from_jwt(jwt: impl Into<String>) -> Self {
        Self {
            token: TokenBody {
                token: jwt.into(),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Validate an arbitrary JSON value. Anything without a string at
    /// `token.token` is rejected rather than partially trusted.
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    pub fn jwt(&self) -> &str {
        &self.token.token
    }

    /// Serialized form written to the store.
    pub fn to_stored(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Store(format!("serializing active token: {e}")))
    }
}

/// Successful refresh response. Both fields are optional here so a missing
/// one maps to `UnexpectedResponse` instead of a generic decode error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(default)]
    tokens: Vec<Value>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl RefreshResponse {
    /// First token object plus the new refresh token, or `None` if either is
    /// absent or malformed.
    fn into_parts(self) -> Option<(ActiveToken, String)> {
        let refresh = self.refresh_token.filter(|r| !r.is_empty())?;
        let first = self.tokens.into_iter().next()?;
        let active = ActiveToken::from_value(first)?;
        Some((active, refresh))
    }
}

/// Where and how to reach the refresh endpoint.
#[derive(Debug, Clone)]
pub struct RefreshEndpoint {
    /// Full URL of the refresh-token endpoint
    pub url: String,
    /// Session cookie of the logged-in browser, sent as `Cookie`
    pub session_cookie: Option<Secret<String>>,
}

impl RefreshEndpoint {
    /// Endpoint under the given API base (e.g. `https://app.insightful.io/api`).
    pub fn new(api_base: &str, session_cookie: Option<Secret<String>>) -> Self {
        Self {
            url: format!("{}{REFRESH_PATH}", api_base.trim_end_matches('/')),
            session_cookie,
        }
    }
}

/// Exchange a refresh token for a new token pair and persist it.
///
/// Exactly one POST is made; nothing is retried here. On 400/401 both stored
/// tokens are evicted. Other failures leave the store untouched. On success
/// the first entry of `tokens` and the new refresh token are written together
/// and the inner JWT is returned.
pub async fn refresh(
    client: &reqwest::Client,
    endpoint: &RefreshEndpoint,
    store: &dyn TokenStore,
    refresh_token: &Secret<String>,
) -> Result<String> {
    let mut request = client
        .post(&endpoint.url)
        .json(&serde_json::json!({ "refreshToken": refresh_token.expose() }));
    if let Some(cookie) = &endpoint.session_cookie {
        request = request.header(reqwest::header::COOKIE, cookie.expose().as_str());
    }

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => {
            record_outcome("network");
            return Err(Error::Network(e.to_string()));
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 400/401 means the refresh token is revoked or the session is gone
        if status.as_u16() == 401 || status.as_u16() == 400 {
            record_outcome("rejected");
            warn!(status = status.as_u16(), "refresh token rejected, evicting stored tokens");
            if let Err(e) = store.clear().await {
                warn!(error = %e, "failed to evict tokens after rejected refresh");
            }
            return Err(Error::RefreshRejected {
                status: status.as_u16(),
            });
        }

        record_outcome("http_error");
        return Err(Error::RefreshFailed {
            status: status.as_u16(),
            body,
        });
    }

    let parsed = match response.json::<RefreshResponse>().await {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "refresh response is not the expected JSON object");
            record_outcome("bad_response");
            return Err(Error::UnexpectedResponse);
        }
    };

    let Some((active, new_refresh)) = parsed.into_parts() else {
        record_outcome("bad_response");
        return Err(Error::UnexpectedResponse);
    };

    let serialized = active.to_stored()?;
    if let Err(e) = store.set(serialized, Secret::new(new_refresh)).await {
        warn!(error = %e, "failed to persist refreshed tokens");
    }

    record_outcome("success");
    info!("token refresh succeeded");
    Ok(active.token.token)
}

fn record_outcome(outcome: &'static str) {
    metrics::counter!("insight_token_refresh_total", "outcome" => outcome).increment(1);
}
