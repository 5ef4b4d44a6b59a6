//! Process-wide engine configuration.
//!
//! Read once at suite start and shared read-only afterwards: base URL,
//! stored credentials for session setup, and the default timing budgets
//! every assertion inherits unless it overrides them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::assertion::retry::RetryConfig;

/// Environment variable holding the base URL
pub const ENV_BASE_URL: &str = "MANEJAR_BASE_URL";
/// Environment variable holding the login username
pub const ENV_USERNAME: &str = "MANEJAR_USERNAME";
/// Environment variable holding the login password
pub const ENV_PASSWORD: &str = "MANEJAR_PASSWORD";

/// Stored credentials for session setup routines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Login username
    pub username: String,
    /// Login password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Engine configuration consumed by the scenario runner and command queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL all relative paths are resolved against
    pub base_url: String,
    /// Credentials for session setup, if the suite logs in
    pub credentials: Option<Credentials>,
    /// Default retry budget for assertions and action auto-waits
    pub retry: RetryConfig,
    /// Overall per-scenario timeout
    pub scenario_timeout: Duration,
    /// Capture a screenshot artifact when a scenario fails
    pub screenshot_on_failure: bool,
    /// Directory prefix for failure artifacts
    pub artifacts_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            credentials: None,
            retry: RetryConfig::default(),
            scenario_timeout: Duration::from_secs(30),
            screenshot_on_failure: true,
            artifacts_dir: "screenshots".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set credentials
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the default retry budget
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-scenario timeout
    #[must_use]
    pub const fn with_scenario_timeout(mut self, timeout: Duration) -> Self {
        self.scenario_timeout = timeout;
        self
    }

    /// Enable or disable screenshot capture on failure
    #[must_use]
    pub const fn with_screenshot_on_failure(mut self, enabled: bool) -> Self {
        self.screenshot_on_failure = enabled;
        self
    }

    /// Set the directory prefix for failure artifacts
    #[must_use]
    pub fn with_artifacts_dir(mut self, dir: impl Into<String>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    /// Build a config from the environment, falling back to defaults.
    ///
    /// Reads `MANEJAR_BASE_URL`, `MANEJAR_USERNAME` and `MANEJAR_PASSWORD`.
    /// Credentials are only set when both variables are present.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let (Ok(username), Ok(password)) =
            (std::env::var(ENV_USERNAME), std::env::var(ENV_PASSWORD))
        {
            config.credentials = Some(Credentials::new(username, password));
        }
        config
    }

    /// Resolve a path against the base URL.
    ///
    /// Absolute URLs pass through untouched.
    #[must_use]
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert!(config.credentials.is_none());
        assert_eq!(config.scenario_timeout, Duration::from_secs(30));
        assert!(config.screenshot_on_failure);
    }

    #[test]
    fn test_builder_chain() {
        let config = EngineConfig::new()
            .with_base_url("https://app.example.com/")
            .with_credentials(Credentials::new("analyst@example.com", "hunter2"))
            .with_scenario_timeout(Duration::from_secs(60))
            .with_screenshot_on_failure(false);

        assert_eq!(config.base_url, "https://app.example.com/");
        assert_eq!(
            config.credentials.as_ref().map(|c| c.username.as_str()),
            Some("analyst@example.com")
        );
        assert_eq!(config.scenario_timeout, Duration::from_secs(60));
        assert!(!config.screenshot_on_failure);
    }

    #[test]
    fn test_resolve_relative_path() {
        let config = EngineConfig::new().with_base_url("https://app.example.com");
        assert_eq!(
            config.resolve("asset-correlations"),
            "https://app.example.com/asset-correlations"
        );
    }

    #[test]
    fn test_resolve_strips_duplicate_slashes() {
        let config = EngineConfig::new().with_base_url("https://app.example.com/");
        assert_eq!(config.resolve("/login"), "https://app.example.com/login");
    }

    #[test]
    fn test_resolve_absolute_passthrough() {
        let config = EngineConfig::new().with_base_url("https://app.example.com");
        assert_eq!(
            config.resolve("https://other.example.com/login"),
            "https://other.example.com/login"
        );
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = EngineConfig::new().with_base_url("https://app.example.com");
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.base_url, config.base_url);
        assert_eq!(back.scenario_timeout, config.scenario_timeout);
    }
}
