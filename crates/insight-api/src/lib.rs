//! Insightful REST fetchers and the intent dispatcher
//!
//! Every fetcher asks `insight_auth::TokenManager` for a bearer token, makes
//! one GET, and validates the body against a strict schema. Failures come
//! back as `FetchError` values; the dispatcher folds them into the `error`
//! fields of its responses so nothing escapes as a panic.

pub mod client;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod model;
pub mod range;

pub use client::{InsightClient, build_http_client};
pub use dispatch::{Dispatcher, Intent, Response, TokensToSave};
pub use error::{FetchError, Resource};
pub use format::format_hours_minutes;
pub use model::{NAME_PLACEHOLDER, Profile, Screenshot, UtilizationTotals};
pub use range::{Period, TimeRange};
