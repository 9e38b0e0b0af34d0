//! Link extraction from page text
//!
//! Anchors are found with a pattern rather than a full HTML parse: only
//! `<a href="...">` / `<a href='...'>` forms count, matched case-insensitively
//! with any whitespace around `href` and `=`. The output keeps document order
//! and duplicates; deduplication is the frontier's job.

use crate::Address;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static ANCHOR_HREF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<a\s+href\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#)
        .expect("anchor pattern is valid")
});

/// Extracts candidate absolute addresses from a page
///
/// Each quoted `href` target is resolved against `base` with standard
/// reference resolution. Anchors with an empty target, an unterminated
/// quote, or a target that does not resolve to an `http`/`https` URL are
/// skipped silently.
///
/// # Arguments
///
/// * `base` - The address the page was fetched from
/// * `page_text` - The page body
///
/// # Example
///
/// ```
/// use frontier_crawl::crawler::extract_links;
///
/// let links = extract_links("http://example.org/a/b", r#"<a href="../c">up</a>"#);
/// assert_eq!(links, vec!["http://example.org/c".to_string()]);
/// ```
pub fn extract_links(base: &str, page_text: &str) -> Vec<Address> {
    let base_url = Url::parse(base).ok();

    ANCHOR_HREF_RE
        .captures_iter(page_text)
        .filter_map(|caps| caps.name("dq").or_else(|| caps.name("sq")))
        .filter_map(|target| resolve_link(target.as_str(), base_url.as_ref()))
        .collect()
}

/// Resolves a raw anchor target to an absolute address
///
/// Returns None if the link should be skipped:
/// - Empty targets
/// - Targets that fail to parse or resolve
/// - Non-HTTP(S) URLs after resolution (`mailto:`, `javascript:`, `data:`, ...)
fn resolve_link(target: &str, base: Option<&Url>) -> Option<Address> {
    if target.is_empty() {
        return None;
    }

    let resolved = match base {
        Some(base) => base.join(target).ok()?,
        None => Url::parse(target).ok()?,
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.into()),
        _ => None,
    }
}
