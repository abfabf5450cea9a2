//! Typed failures of the request client.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failure classes callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller mistake, never retried
    Client,
    /// Remote failure (5xx or 429), retried with backoff
    Server,
    /// Network-level failure, retried once
    Transport,
    /// Caller-supplied deadline exceeded, never retried
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Client => "client",
            ErrorKind::Server => "server",
            ErrorKind::Transport => "transport",
            ErrorKind::Timeout => "timeout",
        }
    }
}

/// Error returned by [`RateLimitedClient`](super::RateLimitedClient)
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("client error {status}: {message}")]
    Client { status: StatusCode, message: String },

    #[error("server error {status}: {message}")]
    Server {
        status: StatusCode,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
}

impl RequestError {
    /// Classify a non-success status
    pub fn from_status(status: StatusCode, message: String, retry_after: Option<Duration>) -> Self {
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            RequestError::Server {
                status,
                message,
                retry_after,
            }
        } else {
            RequestError::Client { status, message }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RequestError::InvalidRequest(_) | RequestError::Client { .. } | RequestError::Decode(_) => {
                ErrorKind::Client
            }
            RequestError::Server { .. } => ErrorKind::Server,
            RequestError::Transport(_) => ErrorKind::Transport,
            RequestError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// HTTP status, when the failure came from a response
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Client { status, .. } | RequestError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(StatusCode::TOO_MANY_REQUESTS)
    }
}

/// Pull a readable message out of an error body
///
/// MangaDex answers errors with `{"result":"error","errors":[{"title":..,"detail":..}]}`;
/// anything else is passed through, truncated.
pub fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<super::types::ErrorResponse>(body) {
        if let Some(first) = parsed.errors.first() {
            return first.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let not_found = RequestError::from_status(StatusCode::NOT_FOUND, "gone".into(), None);
        assert_eq!(not_found.kind(), ErrorKind::Client);

        let unavailable = RequestError::from_status(StatusCode::SERVICE_UNAVAILABLE, "busy".into(), None);
        assert_eq!(unavailable.kind(), ErrorKind::Server);

        let limited = RequestError::from_status(
            StatusCode::TOO_MANY_REQUESTS,
            "slow down".into(),
            Some(Duration::from_secs(3)),
        );
        assert_eq!(limited.kind(), ErrorKind::Server);
        assert!(limited.is_rate_limited());
    }

    #[test]
    fn test_other_kinds() {
        assert_eq!(RequestError::InvalidRequest("empty path".into()).kind(), ErrorKind::Client);
        assert_eq!(RequestError::Timeout(Duration::from_secs(1)).kind(), ErrorKind::Timeout);
        assert_eq!(RequestError::Timeout(Duration::from_secs(1)).status(), None);
    }

    #[test]
    fn test_error_message_from_mangadex_body() {
        let body = r#"{"result":"error","errors":[{"id":"x","status":404,"title":"not_found_http_exception","detail":"Manga could not be found"}]}"#;
        assert_eq!(
            error_message(body),
            "<status 404> not_found_http_exception: Manga could not be found"
        );
        assert_eq!(error_message("  "), "empty response body");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
