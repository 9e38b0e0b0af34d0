//! Frontier-Crawl: a breadth-first web crawler core
//!
//! This crate discovers linked pages starting from a seed address, fetching
//! them concurrently over HTTP and feeding newly found links back into a
//! deduplicated work frontier, with an explicit start/stop lifecycle.

pub mod config;
pub mod control;
pub mod crawler;
pub mod frontier;
pub mod state;

use thiserror::Error;

/// An absolute URL string, the unit of identity for dedup and scheduling
pub type Address = String;

/// Main error type for Frontier-Crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Body of {url} exceeds the {limit} byte limit")]
    BodyTooLarge { url: String, limit: u64 },

    #[error("Frontier error: {0}")]
    Frontier(#[from] FrontierError),

    #[error("Crawl operation for {url} panicked: {message}")]
    Panicked { url: String, message: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised by a frontier implementation
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Address was never added to the frontier: {0}")]
    UnknownAddress(String),

    #[error("Frontier lock poisoned")]
    Poisoned,
}

/// Conditions the control surface reports back to its caller
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("Crawler has been already started")]
    AlreadyRunning,

    #[error("There is no active crawling process")]
    NothingRunning,

    #[error("Invalid seed address '{url}': {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("Crawler state is unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for Frontier-Crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for frontier operations
pub type FrontierResult<T> = std::result::Result<T, FrontierError>;

// Re-export commonly used types
pub use config::Config;
pub use control::CrawlController;
pub use crawler::{CrawlStatus, Engine};
pub use frontier::{Frontier, MemoryFrontier};
pub use state::EngineStatus;
