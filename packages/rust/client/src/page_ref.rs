//! Turning user input (page IDs or page URLs) into page identifiers.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Extract a numeric page ID from a bare ID or a Confluence page URL.
///
/// Recognises `.../pages/<digits>/...` paths and `?pageId=<digits>` queries.
pub fn extract_page_id(input: &str) -> Option<String> {
    static DIGITS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\d+$").expect("valid regex"));
    static PAGES_SEGMENT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"/pages/(\d+)").expect("valid regex"));

    let input = input.trim();
    if DIGITS_RE.is_match(input) {
        return Some(input.to_string());
    }

    let url = Url::parse(input).ok()?;

    if let Some(id) = url
        .query_pairs()
        .find(|(key, _)| key == "pageId")
        .map(|(_, value)| value.into_owned())
        .filter(|value| DIGITS_RE.is_match(value))
    {
        return Some(id);
    }

    PAGES_SEGMENT_RE
        .captures(url.path())
        .map(|caps| caps[1].to_string())
}

/// Like [`extract_page_id`], falling back to the trimmed input itself.
pub fn resolve_page_id(input: &str) -> String {
    extract_page_id(input).unwrap_or_else(|| input.trim().to_string())
}
