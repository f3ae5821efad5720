//! Validated response payloads
//!
//! Bodies are parsed into these types before any value is read. A body that
//! does not fit is reported as `FetchError::UnexpectedFormat`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use tracing::debug;

use crate::error::FetchError;

/// One row of the utilization report. Missing times count as zero.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UtilizationEntry {
    #[serde(default)]
    work_time: Option<f64>,
    #[serde(default)]
    idle_time: Option<f64>,
}

/// Summed utilization for a range, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationTotals {
    pub work_time: u64,
    pub idle_time: u64,
}

impl UtilizationTotals {
    /// Sum a utilization body, which must be a JSON array of entries.
    pub fn from_body(body: Value) -> Result<Self, FetchError> {
        if !body.is_array() {
            return Err(FetchError::UnexpectedFormat);
        }
        let entries: Vec<UtilizationEntry> =
            serde_json::from_value(body).map_err(|_| FetchError::UnexpectedFormat)?;

        let (work, idle) = entries.iter().fold((0.0, 0.0), |(w, i), e| {
            (w + e.work_time.unwrap_or(0.0), i + e.idle_time.unwrap_or(0.0))
        });
        Ok(Self {
            work_time: work.max(0.0).round() as u64,
            idle_time: idle.max(0.0).round() as u64,
        })
    }
}

/// Display name used when the profile has no usable name.
pub const NAME_PLACEHOLDER: &str = "User (Name N/A)";

/// Current user as returned by the profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
}

impl Profile {
    /// The body must be an object with a string `name`. An empty name is
    /// shown as the placeholder.
    pub fn from_body(body: Value) -> Result<Self, FetchError> {
        if !body.is_object() {
            return Err(FetchError::UnexpectedFormat);
        }
        let mut profile: Profile =
            serde_json::from_value(body).map_err(|_| FetchError::UnexpectedFormat)?;
        if profile.name.is_empty() {
            profile.name = NAME_PLACEHOLDER.to_string();
        }
        Ok(profile)
    }
}

/// A captured screenshot entry. Fields beyond the ones the popup reads are
/// kept as-is; a known field of the wrong type reads as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screenshot {
    /// Capture time, unix milliseconds
    #[serde(default, deserialize_with = "lenient_millis")]
    pub timestamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub app: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_millis<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64)))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct ScreenshotPage {
    #[serde(default)]
    data: Option<Vec<Value>>,
}

/// Extract the listing from a paginated body. A missing or null `data` is
/// empty; entries that are not objects are skipped.
pub(crate) fn screenshots_from_body(body: Value) -> Result<Vec<Screenshot>, FetchError> {
    if !body.is_object() {
        return Err(FetchError::UnexpectedFormat);
    }
    let page: ScreenshotPage =
        serde_json::from_value(body).map_err(|_| FetchError::UnexpectedFormat)?;

    let entries = page.data.unwrap_or_default();
    let total = entries.len();
    let shots: Vec<Screenshot> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();
    if shots.len() < total {
        debug!(skipped = total - shots.len(), "dropped non-object screenshot entries");
    }
    Ok(shots)
}
