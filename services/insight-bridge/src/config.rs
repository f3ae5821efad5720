//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The session cookie is loaded from INSIGHT_SESSION_COOKIE or
//! session_cookie_file, never stored in the TOML directly.

use common::Secret;
use insight_auth::DEFAULT_API_BASE;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Env var carrying the browser session cookie for the refresh endpoint
pub const SESSION_COOKIE_ENV: &str = "INSIGHT_SESSION_COOKIE";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Local listener the popup talks to
#[derive(Debug, Deserialize)]
pub struct BridgeConfig {
    pub listen_addr: SocketAddr,
    /// Token file; tokens are kept in memory only when unset
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Insightful API settings
#[derive(Debug, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// File holding the session cookie (alternative to INSIGHT_SESSION_COOKIE)
    #[serde(default)]
    pub session_cookie_file: Option<PathBuf>,
    #[serde(skip)]
    pub session_cookie: Option<Secret<String>>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeout_secs: default_timeout(),
            session_cookie_file: None,
            session_cookie: None,
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    64
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Session cookie resolution order:
    /// 1. INSIGHT_SESSION_COOKIE env var
    /// 2. session_cookie_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.upstream.api_base.starts_with("http://")
            && !config.upstream.api_base.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api_base must start with http:// or https://, got: {}",
                config.upstream.api_base
            )));
        }

        if config.upstream.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.bridge.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if let Ok(cookie) = std::env::var(SESSION_COOKIE_ENV) {
            config.upstream.session_cookie = Some(Secret::new(cookie));
        } else if let Some(ref cookie_file) = config.upstream.session_cookie_file {
            let cookie = std::fs::read_to_string(cookie_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read session_cookie_file {}: {e}",
                    cookie_file.display()
                ))
            })?;
            let cookie = cookie.trim().to_owned();
            if !cookie.is_empty() {
                config.upstream.session_cookie = Some(Secret::new(cookie));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("insight-bridge.toml")
    }
}
