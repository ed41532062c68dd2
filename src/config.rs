//! Configuration module for feedwatch.

use serde::Deserialize;
use std::path::Path;

use crate::{FeedwatchError, Result};

/// Environment variable overriding `logging.level`.
pub const ENV_LOG_LEVEL: &str = "FEEDWATCH_LOG_LEVEL";

/// Environment variable overriding `poller.interval_secs`.
pub const ENV_POLL_INTERVAL: &str = "FEEDWATCH_POLL_INTERVAL_SECS";

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; console only when unset.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Poll scheduling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Seconds between two polls of the same feed.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    60 // once per minute
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
        }
    }
}

/// HTTP fetch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// Allow feeds on loopback/private addresses.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

fn default_user_agent() -> String {
    concat!("feedwatch/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            allow_private_hosts: false,
        }
    }
}

/// A single watched feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Feed URL.
    pub url: String,
    /// Display name; a random one is generated when unset.
    #[serde(default)]
    pub name: Option<String>,
    /// Per-feed poll interval overriding `poller.interval_secs`.
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

impl FeedConfig {
    /// Effective poll interval for this feed.
    pub fn interval_secs(&self, poller: &PollerConfig) -> u64 {
        self.interval_secs.unwrap_or(poller.interval_secs)
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Poll scheduling configuration.
    #[serde(default)]
    pub poller: PollerConfig,
    /// HTTP fetch configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Watched feeds.
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FeedwatchError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FeedwatchError::Config(format!("config parse error: {}", e)))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDWATCH_LOG_LEVEL`: Override the log level
    /// - `FEEDWATCH_POLL_INTERVAL_SECS`: Override the default poll interval
    ///
    /// Empty or unparsable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            if !level.trim().is_empty() {
                self.logging.level = level.trim().to_string();
            }
        }
        if let Some(secs) = std::env::var(ENV_POLL_INTERVAL)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.poller.interval_secs = secs;
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - any effective poll interval is zero
    /// - a feed URL is empty or not http/https
    pub fn validate(&self) -> Result<()> {
        // Check default poll interval
        if self.poller.interval_secs == 0 {
            return Err(FeedwatchError::Validation(
                "poller.interval_secs must be greater than zero".to_string(),
            ));
        }

        // Check each feed
        for feed in &self.feeds {
            if feed.url.trim().is_empty() {
                return Err(FeedwatchError::Validation(
                    "feed url must not be empty".to_string(),
                ));
            }
            let parsed = url::Url::parse(&feed.url).map_err(|e| {
                FeedwatchError::Validation(format!("feed url {} is invalid: {}", feed.url, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(FeedwatchError::Validation(format!(
                    "feed url {} must use http or https",
                    feed.url
                )));
            }
            if feed.interval_secs == Some(0) {
                return Err(FeedwatchError::Validation(format!(
                    "interval_secs for feed {} must be greater than zero",
                    feed.url
                )));
            }
        }
        Ok(())
    }
}
