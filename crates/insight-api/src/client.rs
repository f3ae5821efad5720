//! Authenticated GETs against the Insightful API

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use insight_auth::constants::{
    APP_ORIGIN, APP_REFERER, BROWSER_USER_AGENT, PROFILE_PATH, SCREENSHOT_PAGE_LIMIT,
    SCREENSHOTS_PATH, UTILIZATION_PATH,
};
use insight_auth::TokenManager;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{FetchError, Resource};
use crate::model::{Profile, Screenshot, UtilizationTotals, screenshots_from_body};
use crate::range::TimeRange;

/// Build the shared HTTP client with the browser session's request identity.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(ORIGIN, HeaderValue::from_static(APP_ORIGIN));
    headers.insert(REFERER, HeaderValue::from_static(APP_REFERER));
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
}

/// Stateless fetchers sharing one token manager.
#[derive(Clone)]
pub struct InsightClient {
    api_base: String,
    tokens: Arc<TokenManager>,
}

impl InsightClient {
    pub fn new(api_base: &str, tokens: Arc<TokenManager>) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Summed work/idle time for `range`.
    pub async fn utilization(&self, range: TimeRange) -> Result<UtilizationTotals, FetchError> {
        let url = format!(
            "{}{UTILIZATION_PATH}?start={}&end={}",
            self.api_base, range.start, range.end
        );
        let body = self.get_json(Resource::Utilization, &url).await?;
        UtilizationTotals::from_body(body)
    }

    /// Profile of the user the session belongs to.
    pub async fn profile(&self) -> Result<Profile, FetchError> {
        // `ts` defeats intermediary caches
        let url = format!(
            "{}{PROFILE_PATH}?ts={}",
            self.api_base,
            Utc::now().timestamp_millis()
        );
        let body = self.get_json(Resource::Profile, &url).await?;
        Profile::from_body(body)
    }

    /// Newest-first screenshots captured within `range`.
    pub async fn screenshots(&self, range: TimeRange) -> Result<Vec<Screenshot>, FetchError> {
        let url = format!(
            "{}{SCREENSHOTS_PATH}?start={}&end={}&limit={SCREENSHOT_PAGE_LIMIT}&sortOrder=desc",
            self.api_base, range.start, range.end
        );
        let body = self.get_json(Resource::Screenshots, &url).await?;
        let shots = screenshots_from_body(body)?;
        debug!(count = shots.len(), start = range.start, end = range.end, "fetched screenshots");
        Ok(shots)
    }

    /// One bearer-authenticated GET returning the parsed JSON body.
    async fn get_json(&self, resource: Resource, url: &str) -> Result<Value, FetchError> {
        let token = self.tokens.access_token().await.map_err(|e| {
            if e.needs_login() {
                warn!(
                    resource = resource.label(),
                    "no usable session, tokens must be pushed again"
                );
            }
            FetchError::Token(e)
        })?;

        let response = self
            .tokens
            .http_client()
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| {
                warn!(resource = resource.label(), error = %e, "request failed");
                FetchError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(resource = resource.label(), status = status.as_u16(), "API error");
            if status == StatusCode::UNAUTHORIZED {
                return Err(FetchError::Unauthorized(resource));
            }
            return Err(FetchError::Status {
                resource,
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            debug!(resource = resource.label(), error = %e, "response body is not JSON");
            FetchError::UnexpectedFormat
        })
    }
}
