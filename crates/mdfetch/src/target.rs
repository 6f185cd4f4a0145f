//! Request path to target URL normalization

use crate::error::PipelineError;
use percent_encoding::percent_decode_str;
use url::Url;

/// Paths browsers and crawlers request on their own
const NUISANCE_PATHS: &[&str] = &["favicon.ico", "robots.txt", "sitemap.xml"];

/// What a raw request path resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Empty path, answer with usage text
    Welcome,
    /// Well-known nuisance path, answer 404 without fetching
    NotFound,
    /// Absolute URL to convert
    Convert(String),
}

/// Rebuild the raw target from a request path and optional query
///
/// Strips the leading `/`, re-attaches the query with `?` and
/// percent-decodes the result. `+` is kept as is.
pub fn raw_target(path: &str, query: Option<&str>) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    let joined = match query {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path.to_string(),
    };
    percent_decode_str(&joined).decode_utf8_lossy().into_owned()
}

/// Classify a decoded raw path
pub fn classify(raw: &str) -> Target {
    if raw.is_empty() {
        return Target::Welcome;
    }
    if NUISANCE_PATHS.contains(&raw) {
        return Target::NotFound;
    }
    Target::Convert(normalize(raw))
}

/// Ensure the target carries an http(s) scheme
///
/// Scheme-less targets get `https://`, plus `www.` unless already present.
pub fn normalize(raw: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else if raw.starts_with("www.") {
        format!("https://{raw}")
    } else {
        format!("https://www.{raw}")
    }
}

/// Parse a normalized URL, rejecting anything without a host
///
/// The authority is checked on the raw text first: the URL parser would
/// otherwise lift a path segment into the host (`http:///example.com`).
pub fn validate(normalized: &str) -> Result<Url, PipelineError> {
    if authority_host(normalized).is_some_and(str::is_empty) {
        return Err(no_domain());
    }

    let url = Url::parse(normalized).map_err(|e| match e {
        url::ParseError::EmptyHost => no_domain(),
        e => PipelineError::Validation(format!("Invalid URL: {e}")),
    })?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(no_domain()),
    }
}

/// Host part of the authority in `scheme://authority/...`, port and userinfo removed
fn authority_host(raw: &str) -> Option<&str> {
    let (_, rest) = raw.split_once("://")?;
    let authority = rest
        .split(|c: char| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    if host.starts_with('[') {
        return Some(host);
    }
    Some(host.split(':').next().unwrap_or_default())
}

fn no_domain() -> PipelineError {
    PipelineError::Validation("Invalid URL: no domain specified".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_welcome_and_nuisance() {
        assert_eq!(classify(""), Target::Welcome);
        assert_eq!(classify("favicon.ico"), Target::NotFound);
        assert_eq!(classify("robots.txt"), Target::NotFound);
        assert_eq!(classify("sitemap.xml"), Target::NotFound);
        assert_eq!(
            classify("example.com/robots.txt"),
            Target::Convert("https://www.example.com/robots.txt".to_string())
        );
    }

    #[test]
    fn test_normalize_adds_scheme() {
        assert_eq!(
            normalize("example.com/page"),
            "https://www.example.com/page"
        );
        assert_eq!(
            normalize("www.example.com/page"),
            "https://www.example.com/page"
        );
    }

    #[test]
    fn test_normalize_keeps_explicit_scheme() {
        for url in [
            "http://example.com/page?q=1",
            "https://sub.example.org/a/b#frag",
            "http://127.0.0.1:8080/",
        ] {
            assert_eq!(normalize(url), url);
        }
    }

    #[test]
    fn test_raw_target_reassembles_query() {
        assert_eq!(raw_target("/", None), "");
        assert_eq!(raw_target("/", Some("")), "");
        assert_eq!(
            raw_target("/example.com/search", Some("q=rust&page=2")),
            "example.com/search?q=rust&page=2"
        );
        assert_eq!(
            raw_target("/https%3A%2F%2Fexample.com%2Fa%20b", None),
            "https://example.com/a b"
        );
        assert_eq!(raw_target("/a+b", None), "a+b");
    }

    #[test]
    fn test_validate() {
        let url = validate("https://www.example.com/page").unwrap();
        assert_eq!(url.host_str(), Some("www.example.com"));

        for raw in [
            "http://",
            "https://",
            "http:///example.com",
            "https:///example.com/page",
            "http://?q=1",
            "http://user@/path",
            "http://:8080/",
        ] {
            let err = validate(&normalize(raw)).unwrap_err();
            assert!(matches!(err, PipelineError::Validation(_)), "{raw}");
            assert_eq!(err.to_string(), "Invalid URL: no domain specified", "{raw}");
        }

        let url = validate("http://user@example.com:8080/a").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        let url = validate("http://[::1]:8080/").unwrap();
        assert_eq!(url.host_str(), Some("[::1]"));

        let err = validate("https://exa mple.com").unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
