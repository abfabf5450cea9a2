//! Shared library for the MangaDex wrapper workspace.
//!
//! This crate provides common functionality used by the client crate and its CLI:
//! - Configuration management
//! - Logging infrastructure
//! - Download path layout
//! - Domain models

pub mod config;
pub mod logging;
pub mod models;
pub mod paths;

// Re-export commonly used types
pub use config::Config;
pub use logging::LogConfig;
pub use models::*;
pub use paths::DownloadPaths;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
