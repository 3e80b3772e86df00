//! Gateway configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use auth::{CookieFileStore, CookiePolicy};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid API base URL {0}: {1}")]
    InvalidBaseUrl(String, String),

    #[error("Invalid listen address {0}")]
    InvalidListenAddr(String),
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Backend origin, e.g. `https://panel.example.com`
    pub api_base_url: String,

    /// Path prefix the panel is mounted under
    pub url_prefix: String,

    /// File holding the session token cookie
    pub cookie_file: PathBuf,

    /// Guard server listen address
    pub listen_addr: String,

    /// Built frontend served behind the guard
    pub frontend_dir: PathBuf,

    /// Outbound request timeout in seconds
    pub request_timeout_secs: u64,

    /// Service version
    pub version: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            url_prefix: "dashboard".to_string(),
            cookie_file: default_cookie_file(),
            listen_addr: "127.0.0.1:8080".to_string(),
            frontend_dir: PathBuf::from("./frontend/dist"),
            request_timeout_secs: 30,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl GatewayConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("TREX_API_BASE_URL") {
            config.api_base_url = url;
        }

        if let Ok(prefix) = std::env::var("TREX_URL_PREFIX") {
            config.url_prefix = prefix;
        }

        if let Ok(path) = std::env::var("TREX_COOKIE_FILE") {
            config.cookie_file = PathBuf::from(path);
        }

        if let Ok(addr) = std::env::var("TREX_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(dir) = std::env::var("TREX_FRONTEND_DIR") {
            config.frontend_dir = PathBuf::from(dir);
        }

        if let Ok(timeout) = std::env::var("TREX_REQUEST_TIMEOUT_SECS") {
            if let Ok(n) = timeout.parse() {
                config.request_timeout_secs = n;
            }
        }

        config
    }

    /// Check the values that can be malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.api_base_url)
            .map_err(|e| ConfigError::InvalidBaseUrl(self.api_base_url.clone(), e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl(
                self.api_base_url.clone(),
                format!("unsupported scheme {}", url.scheme()),
            ));
        }

        self.listen_addr()?;
        Ok(())
    }

    /// Prefix as a route path: `/dashboard`, or empty when mounted at the root.
    pub fn route_prefix(&self) -> String {
        let prefix = self.url_prefix.trim_matches('/');
        if prefix.is_empty() {
            String::new()
        } else {
            format!("/{}", prefix)
        }
    }

    /// Base URL for API calls: `{origin}/{prefix}`
    pub fn base_url(&self) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), self.route_prefix())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(self.listen_addr.clone()))
    }

    /// Cookie attributes; secure when the backend is served over https.
    pub fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy::for_origin(&self.api_base_url)
    }

    /// Token store backed by the configured cookie file
    pub fn token_store(&self) -> CookieFileStore {
        CookieFileStore::new(&self.cookie_file, self.cookie_policy())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_cookie_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trex")
        .join("access_token.cookie")
}
