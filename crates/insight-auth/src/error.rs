//! Error types for token acquisition
//!
//! Display strings are the user-facing diagnostics: the popup matches on
//! substrings such as "unauthorized", so keep them stable.

/// Why the stored active token could not be used as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActiveTokenIssue {
    #[error("No active token found in storage.")]
    Missing,

    #[error("Failed to parse stored active token: {0}")]
    Unparseable(String),

    #[error("Stored active token is invalid (missing token.token string or unexpected structure).")]
    Malformed,

    #[error("Active token is expired.")]
    Expired,

    #[error("Could not determine expiry for active token.")]
    NoExpiry,
}

/// Errors from token acquisition and refresh.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Active token unusable and no refresh token to recover with
    #[error("{0}")]
    Unavailable(#[from] ActiveTokenIssue),

    /// Refresh endpoint answered 400/401; stored tokens were evicted
    #[error("Token refresh failed (auth error {status}). Please re-configure token.")]
    RefreshRejected { status: u16 },

    /// Any other non-success status from the refresh endpoint
    #[error("Refresh token API error {status}: {body}")]
    RefreshFailed { status: u16, body: String },

    #[error("Unexpected refresh token API response format.")]
    UnexpectedResponse,

    #[error("Network or other error during token refresh: {0}")]
    Network(String),

    #[error("token store error: {0}")]
    Store(String),
}

impl Error {
    /// Whether the stored credentials are gone and the user must log in again.
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            Error::RefreshRejected { .. } | Error::Unavailable(ActiveTokenIssue::Missing)
        )
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
