//! Configuration management for the MangaDex wrapper.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    pub data: DataConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// MangaDex client settings
    pub mangadex: MangaDexConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,

    /// Directory chapters are downloaded into (relative to data directory or absolute)
    pub download_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// MangaDex client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MangaDexConfig {
    /// MangaDex API base URL
    pub base_url: String,

    /// Language code used for titles, descriptions and chapter feeds
    pub preferred_language: String,

    /// User agent override (a descriptive one is built from the host when unset)
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Proxy URL applied to every request
    #[serde(default)]
    pub proxy: Option<String>,

    /// Timeout for a single HTTP attempt in seconds
    pub request_timeout_secs: u64,

    /// Default overall timeout for a call (throttle wait, retries and backoff included)
    #[serde(default)]
    pub call_timeout_secs: Option<u64>,

    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,

    /// Retry settings
    pub retry: RetryConfig,

    /// Cooldowns applied when the server answers 429 without a Retry-After header
    #[serde(default)]
    pub cooldowns: CooldownConfig,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests admitted within one rolling window
    pub max_requests: u32,

    /// Window length in milliseconds
    pub window_ms: u64,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retries for server errors
    pub max_retries: u32,

    /// Base delay in milliseconds (doubled on every attempt)
    pub base_delay_ms: u64,

    /// Upper bound for the backoff delay in milliseconds
    pub max_delay_ms: u64,
}

/// Per-endpoint cooldown configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// Cooldown for endpoints not listed below
    pub default_seconds: u64,

    /// Cooldown keyed by the first path segment of the endpoint
    #[serde(default)]
    pub endpoints: BTreeMap<String, u64>,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        let mut endpoints = BTreeMap::new();
        endpoints.insert("at-home".to_string(), 60);

        Self {
            default_seconds: 60,
            endpoints,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                root_dir: "data".to_string(),
                download_dir: "downloads".to_string(),
            },
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
            },
            mangadex: MangaDexConfig {
                base_url: "https://api.mangadex.org".to_string(),
                preferred_language: "en".to_string(),
                user_agent: None,
                proxy: None,
                request_timeout_secs: 30,
                call_timeout_secs: None,
                // MangaDex allows roughly 5 requests per second per client
                rate_limit: RateLimitConfig {
                    max_requests: 5,
                    window_ms: 1000,
                },
                retry: RetryConfig {
                    max_retries: 3,
                    base_delay_ms: 1000,
                    max_delay_ms: 60_000,
                },
                cooldowns: CooldownConfig::default(),
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Reject settings the client cannot work with
    pub fn validate(&self) -> Result<()> {
        let mangadex = &self.mangadex;

        if mangadex.base_url.trim().is_empty() {
            bail!("mangadex.base_url must not be empty");
        }
        if mangadex.rate_limit.max_requests == 0 {
            bail!("mangadex.rate_limit.max_requests must be at least 1");
        }
        if mangadex.rate_limit.window_ms == 0 {
            bail!("mangadex.rate_limit.window_ms must be at least 1");
        }
        if mangadex.retry.base_delay_ms > mangadex.retry.max_delay_ms {
            bail!(
                "mangadex.retry.base_delay_ms ({}) exceeds max_delay_ms ({})",
                mangadex.retry.base_delay_ms,
                mangadex.retry.max_delay_ms
            );
        }

        Ok(())
    }

    /// Get the absolute path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    /// Get the absolute path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.log_dir)
    }

    /// Get the absolute path for the download directory
    pub fn download_dir(&self) -> PathBuf {
        self.resolve(&self.data.download_dir)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.root_dir, "data");
        assert_eq!(config.mangadex.base_url, "https://api.mangadex.org");
        assert_eq!(config.mangadex.rate_limit.max_requests, 5);
        assert_eq!(config.mangadex.cooldowns.endpoints.get("at-home"), Some(&60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = Config::default();
        original_config.mangadex.proxy = Some("http://127.0.0.1:8080".to_string());
        original_config.save(&config_path)?;

        assert!(config_path.exists());

        let loaded_config = Config::from_file(&config_path)?;
        assert_eq!(loaded_config.data.root_dir, original_config.data.root_dir);
        assert_eq!(
            loaded_config.mangadex.base_url,
            original_config.mangadex.base_url
        );
        assert_eq!(loaded_config.mangadex.proxy, original_config.mangadex.proxy);

        Ok(())
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        // Should return default config without error
        assert_eq!(config.data.root_dir, "data");
    }

    #[test]
    fn test_missing_cooldowns_section_uses_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[data]
root_dir = "data"
download_dir = "downloads"

[logging]
log_dir = "logs"
default_level = "debug"
console = true
file = false
json_format = false

[mangadex]
base_url = "https://api.mangadex.org"
preferred_language = "ja"
request_timeout_secs = 10

[mangadex.rate_limit]
max_requests = 40
window_ms = 60000

[mangadex.retry]
max_retries = 2
base_delay_ms = 500
max_delay_ms = 8000
"#,
        )?;

        let config = Config::from_file(&config_path)?;
        assert_eq!(config.mangadex.preferred_language, "ja");
        assert_eq!(config.mangadex.rate_limit.max_requests, 40);
        assert_eq!(config.mangadex.cooldowns.default_seconds, 60);
        assert_eq!(config.mangadex.call_timeout_secs, None);

        Ok(())
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let mut config = Config::default();
        config.mangadex.rate_limit.max_requests = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.mangadex.retry.base_delay_ms = 120_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_path_resolution() {
        let config = Config::default();

        let log_dir = config.log_dir();
        assert!(log_dir.ends_with("data/logs"));

        let download_dir = config.download_dir();
        assert!(download_dir.ends_with("data/downloads"));
    }
}
