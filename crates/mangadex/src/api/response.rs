//! Responses produced by the request client.

use super::error::RequestError;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Response body, parsed according to its content type
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Binary(Vec<u8>),
}

/// A successful response
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    payload: Payload,
    elapsed: Duration,
    attempts: u32,
}

impl Response {
    pub(crate) fn new(status: StatusCode, payload: Payload, elapsed: Duration, attempts: u32) -> Self {
        Self {
            status,
            payload,
            elapsed,
            attempts,
        }
    }

    /// Decode a raw body: JSON content types are parsed, anything else kept as bytes
    pub(crate) fn parse_payload(content_type: Option<&str>, body: Vec<u8>) -> Result<Payload, RequestError> {
        let is_json = content_type
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);

        if is_json {
            if body.is_empty() {
                return Ok(Payload::Json(Value::Null));
            }
            let value = serde_json::from_slice(&body).map_err(RequestError::Decode)?;
            Ok(Payload::Json(value))
        } else {
            Ok(Payload::Binary(body))
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Latency of the attempt that produced this response
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Number of attempts made, retries included
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Json(value) => Some(value),
            Payload::Binary(_) => None,
        }
    }

    /// Deserialize the JSON payload into `T`
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        let value = self.json().cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(RequestError::Decode)
    }

    /// Raw bytes of the body (re-serialized for JSON payloads)
    pub fn bytes(&self) -> Vec<u8> {
        match &self.payload {
            Payload::Json(value) => value.to_string().into_bytes(),
            Payload::Binary(bytes) => bytes.clone(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self.payload {
            Payload::Json(value) => value.to_string().into_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }
}
