//! MangaDex API client implementation.
//!
//! This module provides a rate-limited, retry-enabled request client and the
//! response types of the MangaDex endpoints the wrapper uses.

pub mod client;
pub mod error;
pub mod rate_limiter;
pub mod request;
pub mod response;
pub mod retry;
pub mod types;

pub use client::{ClientSettings, RateLimitedClient};
pub use error::{ErrorKind, RequestError};
pub use rate_limiter::{RateBudget, RateLimiter};
pub use request::RequestDescriptor;
pub use response::{Payload, Response};
pub use retry::{parse_retry_after, CooldownTable, RetryPolicy};
pub use types::*;
