//! Configuration module for Frontier-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key is optional; [`Config::default`] is what an empty file produces.
//!
//! # Example
//!
//! ```no_run
//! use frontier_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawler will keep {} fetches in flight", config.crawler.max_concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, UserAgentConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_CONCURRENCY,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
