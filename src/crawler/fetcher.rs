//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client with the configured user agent and pool size
//! - Gating pages on their declared Content-Type before reading the body
//! - Streaming bodies with a hard size cap

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::state::ActivityProbe;
use crate::CrawlError;
use encoding_rs::{Encoding, UTF_8};
use futures::StreamExt;
use mime::Mime;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use std::time::Duration;

/// Content types whose bodies are scanned for links
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["text/html"];

/// Result of a fetch that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The full page text
    Body(String),

    /// The page declared a content type that is not a link source
    NotParseableContentType(String),

    /// The engine left the active status before any I/O was done
    Cancelled,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `crawler` - Timeouts and the concurrency bound (used as the idle pool size)
/// * `user_agent` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    crawler: &CrawlerConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(crawler.connect_timeout_secs))
        .pool_max_idle_per_host(crawler.max_concurrency as usize)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Normalizes a `Content-Type` header value to `type/subtype`
///
/// Parameters such as `charset` are dropped and the result is lowercase.
/// Returns None if the value is not a valid media type.
///
/// # Example
///
/// ```
/// use frontier_crawl::crawler::normalize_content_type;
///
/// assert_eq!(
///     normalize_content_type("Text/HTML; charset=UTF-8"),
///     Some("text/html".to_string())
/// );
/// ```
pub fn normalize_content_type(value: &str) -> Option<String> {
    let mime: Mime = value.trim().parse().ok()?;
    Some(format!("{}/{}", mime.type_(), mime.subtype()).to_ascii_lowercase())
}

/// Picks the text encoding named by a `Content-Type` charset parameter
///
/// Falls back to UTF-8 when the parameter is absent or names an unknown label.
pub fn declared_encoding(value: &str) -> &'static Encoding {
    value
        .trim()
        .parse::<Mime>()
        .ok()
        .and_then(|mime| {
            mime.get_param(mime::CHARSET)
                .and_then(|charset| Encoding::for_label(charset.as_str().as_bytes()))
        })
        .unwrap_or(UTF_8)
}

/// Downloads pages on behalf of the engine
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    max_body_bytes: u64,
}

impl PageFetcher {
    /// Creates a fetcher over a shared client
    pub fn new(client: Client, max_body_bytes: u64) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }

    /// Fetches one page
    ///
    /// # Request Flow
    ///
    /// 1. Return `Cancelled` if the probe's run is no longer active (no I/O done)
    /// 2. Issue a single streaming GET
    /// 3. Normalize the `Content-Type` header; anything outside
    ///    [`ALLOWED_CONTENT_TYPES`] returns `NotParseableContentType` without
    ///    reading the body. A missing or malformed header counts as not parseable.
    /// 4. Stream the body, failing with `BodyTooLarge` past the size cap
    /// 5. Decode it with the declared charset (UTF-8 if none)
    ///
    /// The HTTP status is not gated: an HTML error page is still a link source.
    pub async fn fetch(&self, url: &str, probe: &ActivityProbe) -> Result<FetchOutcome, CrawlError> {
        if !probe.is_active() {
            return Ok(FetchOutcome::Cancelled);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| CrawlError::Http {
                url: url.to_string(),
                source,
            })?;

        tracing::debug!("GET {} -> {}", url, response.status());

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let content_type = match normalize_content_type(&declared) {
            Some(ct) if ALLOWED_CONTENT_TYPES.contains(&ct.as_str()) => ct,
            Some(ct) => return Ok(FetchOutcome::NotParseableContentType(ct)),
            None => return Ok(FetchOutcome::NotParseableContentType(declared)),
        };

        let encoding = declared_encoding(&declared);
        tracing::trace!(
            "Reading {} body from {} as {}",
            content_type,
            url,
            encoding.name()
        );
        let body = self.read_body(url, response, encoding).await?;
        Ok(FetchOutcome::Body(body))
    }

    /// Streams the response body, enforcing the size cap
    ///
    /// Malformed byte sequences become U+FFFD rather than failing the page.
    async fn read_body(
        &self,
        url: &str,
        response: Response,
        encoding: &'static Encoding,
    ) -> Result<String, CrawlError> {
        let too_large = || CrawlError::BodyTooLarge {
            url: url.to_string(),
            limit: self.max_body_bytes,
        };

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| CrawlError::Http {
                url: url.to_string(),
                source,
            })?;

            if body.len() as u64 + chunk.len() as u64 > self.max_body_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        let (text, _, _) = encoding.decode(&body);
        Ok(text.into_owned())
    }
}
