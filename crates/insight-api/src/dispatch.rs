//! Intent routing for the popup
//!
//! The UI sends one of four intents, tagged by `action`. Each resolves to a
//! response value carrying either data or an `error` string; nothing is
//! propagated as a Rust error past this point.

use chrono::{DateTime, Utc};
use common::Secret;
use insight_auth::ActiveToken;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::client::InsightClient;
use crate::error::FetchError;
use crate::format::format_hours_minutes;
use crate::model::{NAME_PLACEHOLDER, Profile, Screenshot, UtilizationTotals};
use crate::range::{Period, TimeRange};

const INVALID_TOKEN_STRUCTURE: &str = "Invalid token structure. Ensure activeTokenObjectToStore (with .token string) and refreshTokenToStore (string) are provided.";

/// Inbound message from the UI layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Intent {
    GetTimes,
    GetAggregatedTimes,
    GetScreenshots {
        start: i64,
        end: i64,
    },
    SaveToken {
        #[serde(rename = "tokensToSave", default)]
        tokens_to_save: Option<TokensToSave>,
    },
}

impl Intent {
    pub fn action(&self) -> &'static str {
        match self {
            Intent::GetTimes => "getTimes",
            Intent::GetAggregatedTimes => "getAggregatedTimes",
            Intent::GetScreenshots { .. } => "getScreenshots",
            Intent::SaveToken { .. } => "saveToken",
        }
    }
}

/// Tokens pushed from the host page. Kept untyped so the shape can be
/// checked before anything is written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensToSave {
    #[serde(default)]
    pub active_token_object_to_store: Value,
    #[serde(default)]
    pub refresh_token_to_store: Value,
}

/// Formatted work/idle pair for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodTimes {
    pub work: String,
    pub idle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<UtilizationTotals, FetchError>> for PeriodTimes {
    fn from(result: Result<UtilizationTotals, FetchError>) -> Self {
        match result {
            Ok(t) => Self {
                work: format_hours_minutes(Some(t.work_time)),
                idle: format_hours_minutes(Some(t.idle_time)),
                error: None,
            },
            Err(e) => Self {
                work: format_hours_minutes(None),
                idle: format_hours_minutes(None),
                error: Some(e.to_string()),
            },
        }
    }
}

/// Display name plus the error that replaced it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileOutcome {
    pub name: String,
    pub error: Option<String>,
}

impl From<Result<Profile, FetchError>> for ProfileOutcome {
    fn from(result: Result<Profile, FetchError>) -> Self {
        match result {
            Ok(p) => Self {
                name: p.name,
                error: None,
            },
            Err(e) => {
                let placeholder = match &e {
                    FetchError::Token(_) => "User (Token Error)",
                    FetchError::Unauthorized(_) | FetchError::Status { .. } => "User (API Error)",
                    FetchError::Network(_) => "User (Fetch Error)",
                    FetchError::UnexpectedFormat => NAME_PLACEHOLDER,
                };
                Self {
                    name: placeholder.to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedTimes {
    pub user_name: String,
    pub user_profile_error: Option<String>,
    pub today: PeriodTimes,
    pub yesterday: PeriodTimes,
    pub this_week: PeriodTimes,
    pub last_week: PeriodTimes,
    pub this_month: PeriodTimes,
    pub last_month: PeriodTimes,
}

impl AggregatedTimes {
    /// First error in aggregation order: profile, then periods as in `Period::ALL`.
    fn first_error(&self) -> Option<String> {
        [
            &self.user_profile_error,
            &self.today.error,
            &self.yesterday.error,
            &self.this_week.error,
            &self.last_week.error,
            &self.this_month.error,
            &self.last_month.error,
        ]
        .into_iter()
        .find_map(|e| e.clone())
    }
}

/// Response to an intent.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    Times(PeriodTimes),
    Aggregated {
        data: AggregatedTimes,
        error: Option<String>,
        #[serde(rename = "lastUpdated")]
        last_updated: i64,
    },
    Screenshots {
        data: Option<Vec<Screenshot>>,
        error: Option<String>,
    },
    Saved {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Response {
    /// Top-level error string, if the intent failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            Response::Times(t) => t.error.as_deref(),
            Response::Aggregated { error, .. }
            | Response::Screenshots { error, .. }
            | Response::Saved { error, .. } => error.as_deref(),
        }
    }
}

/// Routes intents to the fetchers.
#[derive(Clone)]
pub struct Dispatcher {
    client: InsightClient,
}

impl Dispatcher {
    pub fn new(client: InsightClient) -> Self {
        Self { client }
    }

    pub async fn dispatch(&self, intent: Intent) -> Response {
        match intent {
            Intent::GetTimes => self.times(Utc::now()).await,
            Intent::GetAggregatedTimes => self.aggregated(Utc::now()).await,
            Intent::GetScreenshots { start, end } => {
                self.screenshots(TimeRange { start, end }).await
            }
            Intent::SaveToken { tokens_to_save } => {
                self.save_token(tokens_to_save.unwrap_or_default()).await
            }
        }
    }

    async fn times(&self, now: DateTime<Utc>) -> Response {
        let range = Period::Today.range(now);
        Response::Times(self.client.utilization(range).await.into())
    }

    /// Profile plus all six periods, fetched concurrently. Completes only
    /// once every fetch has settled; a failure does not cancel the others.
    async fn aggregated(&self, now: DateTime<Utc>) -> Response {
        let c = &self.client;
        let [today, yesterday, this_week, last_week, this_month, last_month] =
            Period::ALL.map(|p| p.range(now));

        let (profile, today, yesterday, this_week, last_week, this_month, last_month) = tokio::join!(
            c.profile(),
            c.utilization(today),
            c.utilization(yesterday),
            c.utilization(this_week),
            c.utilization(last_week),
            c.utilization(this_month),
            c.utilization(last_month),
        );

        let profile = ProfileOutcome::from(profile);
        let data = AggregatedTimes {
            user_name: profile.name,
            user_profile_error: profile.error,
            today: today.into(),
            yesterday: yesterday.into(),
            this_week: this_week.into(),
            last_week: last_week.into(),
            this_month: this_month.into(),
            last_month: last_month.into(),
        };
        let error = data.first_error();

        Response::Aggregated {
            data,
            error,
            last_updated: Utc::now().timestamp_millis(),
        }
    }

    async fn screenshots(&self, range: TimeRange) -> Response {
        match self.client.screenshots(range).await {
            Ok(shots) => Response::Screenshots {
                data: Some(shots),
                error: None,
            },
            Err(e) => Response::Screenshots {
                data: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Store tokens pushed by the host page. Anything but a string at
    /// `token.token` and a string refresh token is rejected untouched.
    async fn save_token(&self, tokens: TokensToSave) -> Response {
        let Value::String(refresh_token) = tokens.refresh_token_to_store else {
            warn!("rejected token push with non-string refresh token");
            return saved(Some(INVALID_TOKEN_STRUCTURE.to_string()));
        };
        if ActiveToken::from_value(tokens.active_token_object_to_store.clone()).is_none() {
            warn!("rejected token push with malformed active token");
            return saved(Some(INVALID_TOKEN_STRUCTURE.to_string()));
        }

        // Store the object exactly as pushed
        let serialized = tokens.active_token_object_to_store.to_string();
        match self
            .client
            .tokens()
            .store()
            .set(serialized, Secret::new(refresh_token))
            .await
        {
            Ok(()) => {
                info!("stored tokens pushed from host page");
                saved(None)
            }
            Err(e) => saved(Some(e.to_string())),
        }
    }
}

fn saved(error: Option<String>) -> Response {
    Response::Saved {
        success: error.is_none(),
        error,
    }
}
