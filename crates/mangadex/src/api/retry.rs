//! Retry policy and server-imposed waits.
//!
//! Exponential backoff for server errors, `Retry-After` parsing, and the
//! per-endpoint cooldowns used when a 429 comes without a hint.

use shared::config::{CooldownConfig, RetryConfig};
use std::collections::BTreeMap;
use std::time::Duration;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum retries for server errors
    pub max_retries: u32,
    /// Delay before the first retry, doubled for every following one
    pub base_delay: Duration,
    /// Upper bound for the computed backoff
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt + 1` (attempt is zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Wait before retrying a server error
    ///
    /// The backoff, raised to the server's hint when there is one. The hint
    /// is never capped.
    pub fn server_delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let backoff = self.delay_for(attempt);
        match hint {
            Some(hint) => backoff.max(hint),
            None => backoff,
        }
    }
}

/// Cooldowns keyed by the first path segment of an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownTable {
    default: Duration,
    endpoints: BTreeMap<String, Duration>,
}

impl Default for CooldownTable {
    fn default() -> Self {
        Self::from(&CooldownConfig::default())
    }
}

impl From<&CooldownConfig> for CooldownTable {
    fn from(config: &CooldownConfig) -> Self {
        Self {
            default: Duration::from_secs(config.default_seconds),
            endpoints: config
                .endpoints
                .iter()
                .map(|(endpoint, secs)| (endpoint.clone(), Duration::from_secs(*secs)))
                .collect(),
        }
    }
}

impl CooldownTable {
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            endpoints: BTreeMap::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>, cooldown: Duration) -> Self {
        self.endpoints.insert(endpoint.into(), cooldown);
        self
    }

    pub fn cooldown_for(&self, endpoint: &str) -> Duration {
        self.endpoints.get(endpoint).copied().unwrap_or(self.default)
    }
}

/// Parse a `Retry-After` header value (delta-seconds or HTTP date)
pub fn parse_retry_after(header: &str) -> Option<Duration> {
    let header = header.trim();

    if let Ok(seconds) = header.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(seconds) = header.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Duration::try_from_secs_f64(seconds).ok();
        }
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(header) {
        let diff = date.signed_duration_since(chrono::Utc::now());
        return Some(diff.to_std().unwrap_or(Duration::ZERO));
    }

    None
}
