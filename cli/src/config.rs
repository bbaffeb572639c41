//! CLI configuration.

use std::time::Duration;

use cnbfx_fx::provider::CNB_DAILY_URL;
use cnbfx_fx::{FxEngineConfig, HttpFeedConfig, RetryPolicy, SheetCacheConfig};

/// Main CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// URL of the daily fixing text file.
    pub feed_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// How long a fetched sheet is reused in watch mode.
    pub cache_ttl: Duration,
    /// Total fetch attempts for retryable failures.
    pub max_attempts: u32,
    /// Emit logs as JSON.
    pub log_json: bool,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            feed_url: CNB_DAILY_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(300),
            max_attempts: 3,
            log_json: false,
            log_level: "warn".to_string(),
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("CNBFX_FEED_URL") {
            config.feed_url = url;
        }

        if let Some(secs) = lookup("CNBFX_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = lookup("CNBFX_CACHE_TTL_SECS").and_then(|v| v.parse().ok()) {
            config.cache_ttl = Duration::from_secs(secs);
        }

        if let Some(attempts) = lookup("CNBFX_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            config.max_attempts = attempts;
        }

        if let Some(json) = lookup("CNBFX_LOG_JSON") {
            config.log_json = matches!(json.as_str(), "1" | "true" | "yes");
        }

        if let Some(level) = lookup("RUST_LOG") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.feed_url.trim().is_empty() {
            return Err("Feed URL cannot be empty".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be zero".to_string());
        }

        if self.max_attempts == 0 {
            return Err("At least one fetch attempt is required".to_string());
        }

        Ok(())
    }

    pub fn feed_config(&self) -> HttpFeedConfig {
        HttpFeedConfig {
            url: self.feed_url.clone(),
            timeout: self.request_timeout,
            ..HttpFeedConfig::default()
        }
    }

    pub fn engine_config(&self) -> FxEngineConfig {
        FxEngineConfig {
            cache: SheetCacheConfig {
                ttl: chrono::Duration::from_std(self.cache_ttl)
                    .unwrap_or_else(|_| SheetCacheConfig::default().ttl),
            },
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                ..RetryPolicy::default()
            },
            ..FxEngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine_config().retry.max_attempts, 3);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = CliConfig::default();
        config.request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = CliConfig::default();
        config.feed_url = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("CNBFX_FEED_URL", "http://localhost:8080/daily.txt"),
            ("CNBFX_TIMEOUT_SECS", "3"),
            ("CNBFX_CACHE_TTL_SECS", "60"),
            ("CNBFX_MAX_RETRIES", "not-a-number"),
            ("CNBFX_LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();

        let config = CliConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.feed_url, "http://localhost:8080/daily.txt");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.engine_config().cache.ttl, chrono::Duration::seconds(60));
        assert_eq!(config.max_attempts, 3);
        assert!(config.log_json);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.feed_config().timeout, Duration::from_secs(3));
    }
}
