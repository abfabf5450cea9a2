//! MangaDex API wrapper.
//!
//! A rate-limited client for the public MangaDex API plus the manga search
//! and chapter download features built on it. Requests never exceed the
//! configured budget; excess calls wait for the window to roll instead of
//! being dropped.

pub mod api;
pub mod chapters;
pub mod manga;

pub use api::{
    ClientSettings, ErrorKind, RateBudget, RateLimitedClient, RateLimiter, RequestDescriptor,
    RequestError, Response,
};
pub use chapters::{DownloadStats, MangaChapters};
pub use manga::{MangaSearch, SortDirection, SortOrder};
