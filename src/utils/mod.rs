//! Utility functions and helpers.

pub mod http;

use regex::Regex;

/// Prefix a site-relative href with the site origin.
///
/// Hrefs that do not start with `/` are returned unchanged.
pub fn join_origin(origin: &str, href: &str) -> String {
    if href.starts_with('/') && !href.starts_with("//") {
        format!("{}{}", origin.trim_end_matches('/'), href)
    } else {
        href.to_string()
    }
}

/// Extract the numeric article ID following `prefix` in an href.
///
/// `/article/12345` with prefix `/article/` yields `12345`.
pub fn extract_article_id(href: &str, prefix: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r"{}(\d+)", regex::escape(prefix))).ok()?;
    pattern
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Collapse runs of whitespace and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
