//! MangaDex API client with rate limiting and retry logic.

use super::error::{error_message, RequestError};
use super::rate_limiter::{RateBudget, RateLimiter};
use super::request::RequestDescriptor;
use super::response::{Payload, Response};
use super::retry::{parse_retry_after, CooldownTable, RetryPolicy};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use shared::config::MangaDexConfig;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Descriptive user agent sent when none is configured
pub static DEFAULT_USER_AGENT: Lazy<String> = Lazy::new(|| {
    format!(
        "mangadex-wrapper/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
});

/// Everything needed to build a [`RateLimitedClient`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Base URL requests are resolved against
    pub base_url: String,
    /// User agent override
    pub user_agent: Option<String>,
    /// Proxy applied to every request
    pub proxy: Option<String>,
    /// Timeout for a single HTTP attempt
    pub request_timeout: Duration,
    /// Default bound for a whole call when the descriptor sets none
    pub call_timeout: Option<Duration>,
    /// Requests permitted per rolling window
    pub budget: RateBudget,
    /// Backoff for server errors
    pub retry: RetryPolicy,
    /// Waits after a 429 that carries no Retry-After
    pub cooldowns: CooldownTable,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.mangadex.org".to_string(),
            user_agent: None,
            proxy: None,
            request_timeout: Duration::from_secs(30),
            call_timeout: None,
            budget: RateBudget::per_second(5),
            retry: RetryPolicy::default(),
            cooldowns: CooldownTable::default(),
        }
    }
}

impl From<&MangaDexConfig> for ClientSettings {
    fn from(config: &MangaDexConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            user_agent: config.user_agent.clone(),
            proxy: config.proxy.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            call_timeout: config.call_timeout_secs.map(Duration::from_secs),
            budget: RateBudget::new(
                config.rate_limit.max_requests,
                Duration::from_millis(config.rate_limit.window_ms),
            ),
            retry: RetryPolicy::from(&config.retry),
            cooldowns: CooldownTable::from(&config.cooldowns),
        }
    }
}

/// HTTP client that never exceeds its rate budget
///
/// Cloning is cheap and clones share one budget, so a single client can be
/// handed to many tasks.
#[derive(Debug, Clone)]
pub struct RateLimitedClient {
    /// HTTP client
    http: Client,
    /// Base URL for the API
    base_url: String,
    /// Rate limiter
    limiter: RateLimiter,
    /// Backoff policy for server errors
    retry: RetryPolicy,
    /// Endpoint cooldowns for bare 429 responses
    cooldowns: CooldownTable,
    /// Per-attempt timeout, reported when reqwest gives up
    request_timeout: Duration,
    /// Default whole-call timeout
    call_timeout: Option<Duration>,
}

impl RateLimitedClient {
    /// Create a new client
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let user_agent = settings
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.clone());

        let mut builder = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(user_agent);

        if let Some(proxy) = &settings.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .with_context(|| format!("Invalid proxy URL: {}", proxy))?;
            builder = builder.proxy(proxy);
        }

        let http = builder.build().context("Failed to create HTTP client")?;

        info!(
            base_url = %settings.base_url,
            max_requests = settings.budget.max_requests,
            window_ms = settings.budget.window.as_millis() as u64,
            max_retries = settings.retry.max_retries,
            "Request client ready"
        );

        Ok(Self {
            http,
            base_url: settings.base_url,
            limiter: RateLimiter::new(settings.budget),
            retry: settings.retry,
            cooldowns: settings.cooldowns,
            request_timeout: settings.request_timeout,
            call_timeout: settings.call_timeout,
        })
    }

    /// Create a client from the `[mangadex]` config section
    pub fn from_config(config: &MangaDexConfig) -> Result<Self> {
        Self::new(ClientSettings::from(config))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Requests admitted in the current window and the budget they count against
    pub async fn budget_usage(&self) -> (usize, u32) {
        (
            self.limiter.current_window_count().await,
            self.limiter.budget().max_requests,
        )
    }

    /// Send a request, waiting for budget and retrying as the policy allows
    ///
    /// Bounded by the descriptor's timeout, else the client's default call
    /// timeout, else unbounded.
    pub async fn send(&self, descriptor: &RequestDescriptor) -> Result<Response, RequestError> {
        match descriptor.timeout().or(self.call_timeout) {
            Some(timeout) => self.send_with_timeout(descriptor, timeout).await,
            None => self.send_unbounded(descriptor).await,
        }
    }

    /// Send a request that fails with [`RequestError::Timeout`] once `timeout` elapses
    ///
    /// The deadline covers throttle waits, every attempt and backoff sleeps;
    /// nothing is retried after it fires.
    pub async fn send_with_timeout(
        &self,
        descriptor: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<Response, RequestError> {
        Self::validate(descriptor)?;

        match tokio::time::timeout(timeout, self.send_unbounded(descriptor)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    path = descriptor.path(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Request timed out"
                );
                Err(RequestError::Timeout(timeout))
            }
        }
    }

    fn validate(descriptor: &RequestDescriptor) -> Result<(), RequestError> {
        if descriptor.trimmed_path().is_empty() {
            return Err(RequestError::InvalidRequest(
                "request path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    async fn send_unbounded(&self, descriptor: &RequestDescriptor) -> Result<Response, RequestError> {
        Self::validate(descriptor)?;

        let url = descriptor.url(&self.base_url);
        let mut attempts = 0u32;
        let mut server_retries = 0u32;
        let mut transport_retried = false;

        loop {
            // Apply rate limiting before each attempt
            let waited = self.limiter.acquire().await;
            attempts += 1;

            debug!(
                method = %descriptor.method(),
                url = %url,
                attempt = attempts,
                throttled_ms = waited.as_millis() as u64,
                "Making API request"
            );

            let error = match self.attempt(descriptor, &url).await {
                Ok((status, payload, elapsed)) => {
                    debug!(
                        url = %url,
                        status = status.as_u16(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Request successful"
                    );
                    return Ok(Response::new(status, payload, elapsed, attempts));
                }
                Err(error) => error,
            };

            let delay = match &error {
                RequestError::Server {
                    status, retry_after, ..
                } if server_retries < self.retry.max_retries => {
                    let hint = match retry_after {
                        Some(hint) => Some(*hint),
                        None if *status == StatusCode::TOO_MANY_REQUESTS => {
                            Some(self.cooldowns.cooldown_for(descriptor.endpoint()))
                        }
                        None => None,
                    };
                    server_retries += 1;
                    Some(self.retry.server_delay(server_retries - 1, hint))
                }
                RequestError::Transport(_) if !transport_retried => {
                    transport_retried = true;
                    Some(self.retry.delay_for(0))
                }
                _ => None,
            };

            let Some(delay) = delay else {
                warn!(
                    url = %url,
                    attempts = attempts,
                    kind = error.kind().as_str(),
                    error = %error,
                    "Request failed"
                );
                return Err(error);
            };

            warn!(
                url = %url,
                attempt = attempts,
                kind = error.kind().as_str(),
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "Retrying after delay"
            );
            sleep(delay).await;
        }
    }

    /// One HTTP round trip
    async fn attempt(
        &self,
        descriptor: &RequestDescriptor,
        url: &str,
    ) -> Result<(StatusCode, Payload, Duration), RequestError> {
        let mut request = self.http.request(descriptor.method().clone(), url);
        if !descriptor.query().is_empty() {
            request = request.query(descriptor.query());
        }
        if let Some(body) = descriptor.body() {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after);
            let text = response.text().await.unwrap_or_default();
            return Err(RequestError::from_status(status, error_message(&text), retry_after));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        let payload = Response::parse_payload(content_type.as_deref(), body.to_vec())?;

        Ok((status, payload, started.elapsed()))
    }

    fn classify(&self, error: reqwest::Error) -> RequestError {
        if error.is_timeout() {
            RequestError::Timeout(self.request_timeout)
        } else {
            RequestError::Transport(error)
        }
    }
}
