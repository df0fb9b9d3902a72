//! URL canonicalization and scheme gating.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Whether the router may intercept requests to this URL.
///
/// Only http(s) traffic is routed; extension-internal and other schemes pass through.
pub fn is_interceptable(url: &url::Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Canonicalize a URL string so equal resources share one cache key.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
///
/// Non-http schemes are accepted here; [`is_interceptable`] decides routing.
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_basic() {
        let url = canonicalize("https://example.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("cdn.jsdelivr.net/gh/x/rates/history/2025-01-01.json").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("cdn.jsdelivr.net"));
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://API.Frankfurter.APP/latest").unwrap();
        assert_eq!(url.host_str(), Some("api.frankfurter.app"));
    }

    #[test]
    fn test_canonicalize_remove_fragment_keep_query() {
        let url = canonicalize("https://example.com/path?from=USD&to=TWD#section").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("from=USD&to=TWD"));
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize("  https://example.com  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize(""), Err(UrlError::Empty)));
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_extension_scheme_parses_but_is_not_interceptable() {
        let url = canonicalize("chrome-extension://abcdef/popup.html").unwrap();
        assert!(!is_interceptable(&url));
        assert!(is_interceptable(&canonicalize("http://example.com").unwrap()));
    }
}
