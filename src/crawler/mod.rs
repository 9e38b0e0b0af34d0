//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching gated on the declared content type
//! - Link extraction and resolution
//! - The engine's lifecycle and batch loop

mod engine;
mod fetcher;
mod parser;

pub use engine::{CrawlOutcome, CrawlStatus, Engine};
pub use fetcher::{
    build_http_client, declared_encoding, normalize_content_type, FetchOutcome, PageFetcher,
    ALLOWED_CONTENT_TYPES,
};
pub use parser::extract_links;
