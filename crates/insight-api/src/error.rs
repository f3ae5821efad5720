//! Fetch error taxonomy
//!
//! Messages mirror what the popup shows; it looks for "unauthorized" to
//! offer a login link instead of the raw text.

/// Which endpoint a failure came from. Selects the user-facing wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Utilization,
    Profile,
    Screenshots,
}

impl Resource {
    fn unauthorized_message(self) -> &'static str {
        match self {
            Resource::Utilization => "Unauthorized. Check your token.",
            Resource::Profile => "Unauthorized. Check token for profile.",
            Resource::Screenshots => "Unauthorized. Check your token for screenshots.",
        }
    }

    fn status_prefix(self) -> &'static str {
        match self {
            Resource::Utilization => "API Error",
            Resource::Profile => "User Profile API Error",
            Resource::Screenshots => "Screenshots API Error",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Resource::Utilization => "utilization",
            Resource::Profile => "profile",
            Resource::Screenshots => "screenshots",
        }
    }
}

/// Errors from a single fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// No bearer token could be produced; the reason is passed through verbatim
    #[error("{0}")]
    Token(#[from] insight_auth::Error),

    #[error("{}", .0.unauthorized_message())]
    Unauthorized(Resource),

    #[error("{} {status}", .resource.status_prefix())]
    Status { resource: Resource, status: u16 },

    #[error("Unexpected API response format.")]
    UnexpectedFormat,

    #[error("{0}")]
    Network(String),
}
