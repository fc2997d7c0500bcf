//! Shared helpers for extractors and scraped providers: URL joins, host
//! labels, quality and year tokens.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Quality tokens found in link text or file names.
static QUALITY_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?i)\b(2160p|1440p|1080p|720p|576p|480p|360p|4k)\b"));

/// Four-digit year (19xx or 20xx).
static YEAR_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"\b(19|20)\d{2}\b"));

/// Normalizes a host string: trim, strip leading "www.", trailing '.', and lowercases.
#[must_use]
pub fn canonical_host(host: &str) -> String {
    host.trim()
        .trim_start_matches("www.")
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Resolves a possibly relative URL string against a base URL.
///
/// Returns the value as-is if it already starts with `http://` or `https://`;
/// normalizes `//...` to `https:...`; otherwise joins with `base_url`.
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') || value.starts_with("javascript:") {
        return None;
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value.to_string());
    }
    if value.starts_with("//") {
        return Some(format!("https:{value}"));
    }
    base_url.join(value).ok().map(|url| url.to_string())
}

/// Server label derived from a URL's host ("files.example.net" for
/// `https://www.files.example.net/a.mkv`).
#[must_use]
pub fn host_label(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(canonical_host))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Returns the normalized quality token in `value` ("1080p", "4K").
#[must_use]
pub fn extract_quality(value: &str) -> Option<String> {
    QUALITY_RE.find(value).map(|m| {
        let token = m.as_str();
        if token.eq_ignore_ascii_case("4k") {
            "4K".to_string()
        } else {
            token.to_ascii_lowercase()
        }
    })
}

/// Returns the first year-like match (19xx or 20xx) in `value`.
#[must_use]
pub fn extract_year_from_str(value: &str) -> Option<String> {
    YEAR_VALUE_RE.find(value).map(|m| m.as_str().to_string())
}

/// Collapses runs of whitespace in scraped text.
#[must_use]
pub fn clean_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_host_trim_www_and_trailing_dot_lowercase() {
        assert_eq!(canonical_host("  www.Example.COM.  "), "example.com");
        assert_eq!(canonical_host(""), "");
    }

    #[test]
    fn test_absolutize_url_variants() {
        let base = Url::parse("https://landing.example/path/page.html").unwrap();
        assert_eq!(
            absolutize_url("https://cdn.example/a.mkv", &base).as_deref(),
            Some("https://cdn.example/a.mkv")
        );
        assert_eq!(
            absolutize_url("//cdn.example/a.mkv", &base).as_deref(),
            Some("https://cdn.example/a.mkv")
        );
        assert_eq!(
            absolutize_url("/r?id=9", &base).as_deref(),
            Some("https://landing.example/r?id=9")
        );
        assert_eq!(
            absolutize_url("next.html", &base).as_deref(),
            Some("https://landing.example/path/next.html")
        );
        assert_eq!(absolutize_url("#", &base), None);
        assert_eq!(absolutize_url("javascript:void(0)", &base), None);
    }

    #[test]
    fn test_host_label() {
        assert_eq!(
            host_label("https://www.Files.Example.net/v/a.mkv"),
            "files.example.net"
        );
        assert_eq!(host_label("not a url"), "Unknown");
    }

    #[test]
    fn test_extract_quality_normalizes_tokens() {
        assert_eq!(extract_quality("Download 1080P [2.1GB]").as_deref(), Some("1080p"));
        assert_eq!(extract_quality("Movie.2019.4k.HDR.mkv").as_deref(), Some("4K"));
        assert_eq!(extract_quality("Episode 3"), None);
    }

    #[test]
    fn test_extract_year_from_str() {
        assert_eq!(
            extract_year_from_str("Inception (2010) BluRay").as_deref(),
            Some("2010")
        );
        assert_eq!(extract_year_from_str("no year"), None);
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Season\n 1 \t Episodes "), "Season 1 Episodes");
    }
}
