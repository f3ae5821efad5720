//! Insightful API endpoints and request identity
//!
//! Paths are relative to the configurable API base so tests can point the
//! client at a local mock server.

/// Production API base (paths below are appended to it)
pub const DEFAULT_API_BASE: &str = "https://app.insightful.io/api";

/// Web app origin the session cookie belongs to
pub const APP_ORIGIN: &str = "https://app.insightful.io";

/// Referer sent with every upstream call
pub const APP_REFERER: &str = "https://app.insightful.io/";

/// User agent of the browser session the tokens were borrowed from
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Token refresh (POST, session cookie)
pub const REFRESH_PATH: &str = "/v1/auth/refresh-token";

/// Utilization totals for a time range (GET, bearer)
pub const UTILIZATION_PATH: &str = "/v2/insights/utilization/employee";

/// Current user profile (GET, bearer)
pub const PROFILE_PATH: &str = "/v1/me";

/// Paginated screenshot listing (GET, bearer)
pub const SCREENSHOTS_PATH: &str = "/v1/insights/screenshot-paginate";

/// Page size requested from the screenshot listing
pub const SCREENSHOT_PAGE_LIMIT: u32 = 150;

/// Tolerance for tokens whose `exp` lies in the recent past, in milliseconds
pub const EXPIRY_GRACE_MILLIS: i64 = 60_000;

/// Storage key holding the serialized active token object
pub const ACTIVE_TOKEN_KEY: &str = "activeToken";

/// Storage key holding the plain refresh token string
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
