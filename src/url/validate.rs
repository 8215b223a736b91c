use crate::{UrlError, UrlResult};
use url::Url;

/// Validates a discovered URL candidate
///
/// Candidates come from sitemap `<loc>` elements, text lines and redirect
/// targets. Surrounding whitespace is ignored; the remainder must be an
/// absolute `http` or `https` URL with a host.
///
/// # Examples
///
/// ```
/// use sitemap_sweep::url::validate_url;
///
/// let url = validate_url("  https://example.com/page ").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
///
/// assert!(validate_url("not a url").is_err());
/// ```
pub fn validate_url(candidate: &str) -> UrlResult<Url> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return Err(UrlError::Empty);
    }

    let url = Url::parse(candidate).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingHost),
    }
}

/// Resolves a redirect `Location` header value against the URL that returned it
///
/// Absolute locations are taken as-is, relative ones are joined onto `origin`.
/// The result is validated like any other candidate.
pub fn resolve_location(origin: &Url, location: &str) -> UrlResult<Url> {
    let location = location.trim();
    if location.is_empty() {
        return Err(UrlError::Empty);
    }

    let joined = origin
        .join(location)
        .map_err(|e| UrlError::Parse(e.to_string()))?;

    validate_url(joined.as_str())
}
