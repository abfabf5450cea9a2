//! Request descriptors.

use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

/// Everything needed to issue one API call
///
/// Built with the consuming `with_*` methods and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl RequestDescriptor {
    /// Create a descriptor for the given method and endpoint path
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            base_url: None,
            timeout: None,
        }
    }

    /// Shorthand for a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Append a query parameter; a key may be given more than once
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append several query parameters
    pub fn with_queries<K, V, I>(mut self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach a JSON body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Send to another host than the client's base URL (CDN page downloads)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Bound the whole call, throttle wait and retries included
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Path without surrounding slashes; empty means the descriptor is unusable
    pub fn trimmed_path(&self) -> &str {
        self.path.trim().trim_matches('/')
    }

    /// First path segment, used to look up endpoint cooldowns
    pub fn endpoint(&self) -> &str {
        self.trimmed_path().split('/').next().unwrap_or_default()
    }

    /// Full URL against the descriptor's base URL or the given default
    pub fn url(&self, default_base: &str) -> String {
        let base = self.base_url.as_deref().unwrap_or(default_base);
        format!("{}/{}", base.trim_end_matches('/'), self.trimmed_path())
    }
}
