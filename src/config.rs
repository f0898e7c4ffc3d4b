//! Client configuration
//!
//! Base URL and timeout settings for the PassVault API. The base URL is
//! environment-provided in deployments and defaults to the local development
//! server.

use std::time::Duration;

/// Environment variable overriding the API base URL
pub const BASE_URL_ENV: &str = "PASSVAULT_API_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the PassVault API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the API (e.g., "http://localhost:8080/api")
    pub base_url: String,
    /// Total timeout applied to every request, refresh calls included
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.to_string(), timeout: DEFAULT_TIMEOUT }
    }
}

impl ClientConfig {
    /// Create a configuration with the given base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    /// Create a configuration from the environment
    ///
    /// Reads `PASSVAULT_API_URL`, falling back to the default local server.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.is_empty() => Self::new(url),
            _ => Self::default(),
        }
    }

    /// Override the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Join the base URL with an endpoint path
    pub(crate) fn url_for(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), endpoint)
    }
}
