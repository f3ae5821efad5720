//! Access token lifecycle
//!
//! `TokenManager` owns no token state: every call reads the store, judges the
//! cached JWT by its `exp` claim and, when it is unusable, spends exactly one
//! refresh call. Concurrent callers are not coalesced; two callers that both
//! see an expired token will both refresh, and the later write wins.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::constants::EXPIRY_GRACE_MILLIS;
use crate::error::{ActiveTokenIssue, Result};
use crate::jwt::decode_expiry;
use crate::store::TokenStore;
use crate::token::{ActiveToken, RefreshEndpoint, refresh};

/// Produces a currently valid bearer token from the injected store.
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    http_client: reqwest::Client,
    endpoint: RefreshEndpoint,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        http_client: reqwest::Client,
        endpoint: RefreshEndpoint,
    ) -> Self {
        Self {
            store,
            http_client,
            endpoint,
        }
    }

    /// The backing store, shared with whoever pushes fresh tokens.
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Return a usable bearer JWT, refreshing it if needed.
    ///
    /// A cached token is used while `exp * 1000 > now - 60s`. Otherwise the
    /// stored refresh token is exchanged once. Without a refresh token the
    /// most specific reason the cached token was rejected is returned.
    pub async fn access_token(&self) -> Result<String> {
        let stored = self.store.get().await?;

        let issue = match stored.active_token.as_deref().filter(|raw| !raw.is_empty()) {
            Some(raw) => match check_active_token(raw, now_millis()) {
                Ok(jwt) => return Ok(jwt),
                Err(issue) => issue,
            },
            None => ActiveTokenIssue::Missing,
        };

        match stored.refresh_token.filter(|r| !r.expose().is_empty()) {
            Some(refresh_token) => {
                debug!(reason = %issue, "attempting token refresh");
                refresh(
                    &self.http_client,
                    &self.endpoint,
                    self.store.as_ref(),
                    &refresh_token,
                )
                .await
            }
            None => {
                warn!(reason = %issue, "no refresh token, cannot refresh");
                Err(issue.into())
            }
        }
    }
}

/// Validate a serialized active token against the clock.
///
/// Returns the JWT when it is inside the grace window, or why it is not.
fn check_active_token(
    raw: &str,
    now_millis: i64,
) -> std::result::Result<String, ActiveTokenIssue> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ActiveTokenIssue::Unparseable(e.to_string()))?;
    let active = ActiveToken::from_value(value).ok_or(ActiveTokenIssue::Malformed)?;

    match decode_expiry(active.jwt()) {
        Some(exp) if exp.saturating_mul(1000) > now_millis - EXPIRY_GRACE_MILLIS => {
            Ok(active.token.token)
        }
        Some(_) => Err(ActiveTokenIssue::Expired),
        None => Err(ActiveTokenIssue::NoExpiry),
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::jwt::tests::make_jwt;
    use crate::store::{MemoryTokenStore, StoreFuture, StoredTokens};
    use crate::token::tests::mock_refresh_server;
    use axum::http::StatusCode;
    use common::Secret;
    use std::sync::atomic::Ordering;

    fn now_secs() -> i64 {
        now_millis() / 1000
    }

    fn stored_jwt(exp: i64) -> String {
        ActiveToken::from_jwt(make_jwt(serde_json::json!({ "exp": exp })))
            .to_stored()
            .unwrap()
    }

    async fn manager_with(
        base: &str,
        active: String,
        refresh_token: &str,
    ) -> (TokenManager, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::default());
        store.set(active, Secret::from(refresh_token)).await.unwrap();
        let manager = TokenManager::new(
            store.clone(),
            reqwest::Client::new(),
            RefreshEndpoint::new(base, None),
        );
        (manager, store)
    }

    /// Store whose reads either fail or return a fixed pair, and whose
    /// writes always fail.
    struct FailingStore {
        tokens: Option<StoredTokens>,
    }

    impl TokenStore for FailingStore {
        fn get(&self) -> StoreFuture<'_, StoredTokens> {
            let result = self
                .tokens
                .clone()
                .ok_or_else(|| Error::Store("disk unavailable".into()));
            Box::pin(async move { result })
        }

        fn set(&self, _active: String, _refresh: Secret<String>) -> StoreFuture<'_, ()> {
            Box::pin(async { Err(Error::Store("read-only filesystem".into())) })
        }

        fn clear(&self) -> StoreFuture<'_, ()> {
            Box::pin(async { Err(Error::Store("read-only filesystem".into())) })
        }
    }

    #[test]
    fn fresh_token_passes_check() {
        let now = 1_800_000_000_000;
        let raw = stored_jwt(now / 1000 + 120);
        assert!(check_active_token(&raw, now).is_ok());
    }

    #[test]
    fn grace_window_tolerates_recent_expiry() {
        let now = 1_800_000_000_000;
        assert!(check_active_token(&stored_jwt(now / 1000 - 30), now).is_ok());
        assert_eq!(
            check_active_token(&stored_jwt(now / 1000 - 60), now),
            Err(ActiveTokenIssue::Expired)
        );
        assert_eq!(
            check_active_token(&stored_jwt(now / 1000 - 120), now),
            Err(ActiveTokenIssue::Expired)
        );
    }

    #[test]
    fn check_reports_specific_issue() {
        let now = 1_800_000_000_000;
        assert!(matches!(
            check_active_token("{not json", now),
            Err(ActiveTokenIssue::Unparseable(_))
        ));
        assert_eq!(
            check_active_token(r#"{"token":{"token":7}}"#, now),
            Err(ActiveTokenIssue::Malformed)
        );
        assert_eq!(
            check_active_token(r#"{"token":{"token":"no-dots"}}"#, now),
            Err(ActiveTokenIssue::NoExpiry)
        );
    }

    #[tokio::test]
    async fn valid_cached_token_skips_refresh() {
        let (base, hits) = mock_refresh_server(StatusCode::OK, "{}").await;
        let (manager, _) = manager_with(&base, stored_jwt(now_secs() + 120), "rt").await;

        let jwt = manager.access_token().await.unwrap();

        assert_eq!(jwt.split('.').count(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unpadded_fresh_token_skips_refresh() {
        let (base, hits) = mock_refresh_server(StatusCode::OK, "{}").await;
        let jwt = make_jwt(serde_json::json!({ "exp": now_secs() + 120, "sub": "u1" }));
        let payload = jwt.split('.').nth(1).unwrap();
        assert_ne!(payload.len() % 4, 0, "payload must need padding: {payload}");
        let (manager, _) = manager_with(
            &base,
            ActiveToken::from_jwt(jwt.clone()).to_stored().unwrap(),
            "rt",
        )
        .await;

        assert_eq!(manager.access_token().await.unwrap(), jwt);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn store_read_failure_is_a_store_error() {
        let manager = TokenManager::new(
            Arc::new(FailingStore { tokens: None }),
            reqwest::Client::new(),
            RefreshEndpoint::new("http://127.0.0.1:1", None),
        );

        let err = manager.access_token().await.unwrap_err();

        assert!(matches!(err, Error::Store(_)));
        assert_eq!(err.to_string(), "token store error: disk unavailable");
    }

    #[tokio::test]
    async fn persist_failure_after_refresh_still_returns_token() {
        let (base, hits) = mock_refresh_server(
            StatusCode::OK,
            r#"{"tokens":[{"token":{"token":"abc.def.ghi"}}],"refreshToken":"r2"}"#,
        )
        .await;
        let store = FailingStore {
            tokens: Some(StoredTokens {
                active_token: Some(stored_jwt(now_secs() - 120)),
                refresh_token: Some(Secret::from("rt")),
            }),
        };
        let manager = TokenManager::new(
            Arc::new(store),
            reqwest::Client::new(),
            RefreshEndpoint::new(&base, None),
        );

        assert_eq!(manager.access_token().await.unwrap(), "abc.def.ghi");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_token_triggers_exactly_one_refresh() {
        let (base, hits) = mock_refresh_server(
            StatusCode::OK,
            r#"{"tokens":[{"token":{"token":"abc.def.ghi"}}],"refreshToken":"r2"}"#,
        )
        .await;
        let (manager, store) =
            manager_with(&base, stored_jwt(now_secs() - 120), "rt").await;

        let jwt = manager.access_token().await.unwrap();

        assert_eq!(jwt, "abc.def.ghi");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let tokens = store.get().await.unwrap();
        assert_eq!(tokens.refresh_token.unwrap().expose(), "r2");
        assert_eq!(
            tokens.active_token.as_deref(),
            Some(r#"{"token":{"token":"abc.def.ghi"}}"#)
        );
    }

    #[tokio::test]
    async fn empty_store_fails_without_network() {
        // Port 1 is never listening; any request would surface as Network
        let store = Arc::new(MemoryTokenStore::default());
        let manager = TokenManager::new(
            store,
            reqwest::Client::new(),
            RefreshEndpoint::new("http://127.0.0.1:1", None),
        );

        let err = manager.access_token().await.unwrap_err();

        assert!(matches!(
            err,
            Error::Unavailable(ActiveTokenIssue::Missing)
        ));
        assert_eq!(err.to_string(), "No active token found in storage.");
    }

    #[tokio::test]
    async fn expired_token_without_refresh_reports_expiry() {
        let (manager, _) =
            manager_with("http://127.0.0.1:1", stored_jwt(now_secs() - 120), "").await;

        let err = manager.access_token().await.unwrap_err();

        assert_eq!(err.to_string(), "Active token is expired.");
    }

    #[tokio::test]
    async fn refresh_rejection_evicts_store() {
        let (base, hits) = mock_refresh_server(StatusCode::UNAUTHORIZED, "nope").await;
        let (manager, store) =
            manager_with(&base, stored_jwt(now_secs() - 3600), "rt").await;

        let err = manager.access_token().await.unwrap_err();

        assert!(err.needs_login());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let tokens = store.get().await.unwrap();
        assert!(tokens.active_token.is_none());
        assert!(tokens.refresh_token.is_none());
    }

    #[tokio::test]
    async fn malformed_active_token_is_refreshed_when_possible() {
        let (base, hits) = mock_refresh_server(
            StatusCode::OK,
            r#"{"tokens":[{"token":{"token":"n.e.w"}}],"refreshToken":"r9"}"#,
        )
        .await;
        let (manager, _) = manager_with(&base, "{broken".into(), "rt").await;

        assert_eq!(manager.access_token().await.unwrap(), "n.e.w");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_each_refresh() {
        let (base, hits) = mock_refresh_server(
            StatusCode::OK,
            r#"{"tokens":[{"token":{"token":"n.e.w"}}],"refreshToken":"r9"}"#,
        )
        .await;
        let (manager, _) =
            manager_with(&base, stored_jwt(now_secs() - 600), "rt").await;

        let (a, b) = tokio::join!(manager.access_token(), manager.access_token());

        assert_eq!(a.unwrap(), "n.e.w");
        assert_eq!(b.unwrap(), "n.e.w");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
