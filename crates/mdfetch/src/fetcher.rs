//! Bounded HTTP fetcher
//!
//! Downloads the target with a single GET, streaming the body and aborting
//! as soon as it grows past the configured limit.

use crate::config::Config;
use crate::error::FetchError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use encoding_rs::{Encoding, UTF_8};
use futures::{Stream, StreamExt};
use percent_encoding::percent_decode_str;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE, USER_AGENT};
use tracing::{debug, info};
use url::Url;

/// Downloaded resource, owned by a single request
#[derive(Debug, Clone)]
pub struct FetchedContent {
    /// Final URL after redirects
    pub url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value (empty when absent)
    pub content_type: String,
    /// Filename from Content-Disposition or the URL path
    pub filename: Option<String>,
    /// Response body, never longer than the configured limit
    pub body: Bytes,
}

/// Source of remote content
///
/// The orchestrator only talks to this trait, so tests can swap in stubs.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Identifier for logging
    fn name(&self) -> &'static str;

    /// Download `url` in a single attempt
    async fn fetch(&self, url: &Url) -> Result<FetchedContent, FetchError>;
}

/// Production fetcher backed by reqwest
pub struct HttpFetcher {
    client: reqwest::Client,
    max_content_size: usize,
    chunk_size: usize,
}

impl HttpFetcher {
    /// Build a fetcher with the client settings from `config`
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(crate::DEFAULT_USER_AGENT)),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self {
            client,
            max_content_size: config.max_content_size,
            chunk_size: config.chunk_size.max(1),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedContent, FetchError> {
        info!(url = %url, "Downloading content");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_content_size as u64 {
                debug!(url = %url, declared = len, "Declared length over limit");
                return Err(FetchError::ContentTooLarge {
                    limit: self.max_content_size,
                });
            }
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let filename = extract_filename(&headers, &final_url);

        let body = read_body_bounded(
            response.bytes_stream(),
            self.max_content_size,
            self.chunk_size,
        )
        .await?;

        let logged_type = if content_type.is_empty() {
            "unknown"
        } else {
            content_type.as_str()
        };
        info!(url = %final_url, bytes = body.len(), content_type = logged_type, "Downloaded content");

        Ok(FetchedContent {
            url: final_url,
            status_code: status.as_u16(),
            content_type,
            filename,
            body,
        })
    }
}

/// Collect a body stream, failing the moment it exceeds `limit` bytes
///
/// Incoming frames are appended `chunk_size` bytes at a time; nothing past
/// the limit is ever buffered.
pub async fn read_body_bounded<S, E>(
    stream: S,
    limit: usize,
    chunk_size: usize,
) -> Result<Bytes, FetchError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<FetchError>,
{
    let mut stream = std::pin::pin!(stream);
    let mut body = BytesMut::new();

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => return Err(e.into()),
        };
        for chunk in frame.chunks(chunk_size.max(1)) {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::ContentTooLarge { limit });
            }
            body.extend_from_slice(chunk);
        }
    }

    Ok(body.freeze())
}

/// Extract filename from Content-Disposition header or URL
fn extract_filename(headers: &HeaderMap, url: &Url) -> Option<String> {
    if let Some(value) = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(filename) = parse_content_disposition_filename(value) {
            return Some(filename);
        }
    }

    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty() && last.contains('.'))
        .map(str::to_string)
}

/// Filename from a Content-Disposition value
///
/// `filename*` (RFC 5987, `charset'lang'percent-encoded`) wins over plain
/// `filename`. Directory components are dropped.
fn parse_content_disposition_filename(value: &str) -> Option<String> {
    let params = disposition_params(value);
    let param = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    };

    let name = param("filename*")
        .and_then(decode_ext_value)
        .or_else(|| param("filename").map(|v| unquote(v).to_string()))?;

    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default().trim();
    (!base.is_empty()).then(|| base.to_string())
}

/// Split `type; key=value; ...` into key/value pairs, honoring quotes
fn disposition_params(value: &str) -> Vec<(String, String)> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in value.chars() {
        if escaped {
            escaped = false;
        } else if in_quotes && c == '\\' {
            escaped = true;
            continue;
        } else if c == '"' {
            in_quotes = !in_quotes;
        } else if c == ';' && !in_quotes {
            parts.push(std::mem::take(&mut current));
            continue;
        }
        current.push(c);
    }
    parts.push(current);

    parts
        .iter()
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Decode an RFC 5987 extended value; unknown charsets are read as UTF-8
fn decode_ext_value(value: &str) -> Option<String> {
    let mut parts = unquote(value).splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;

    let bytes: Vec<u8> = percent_decode_str(encoded).collect();
    let encoding = Encoding::for_label(charset.trim().as_bytes()).unwrap_or(UTF_8);
    let (text, _) = encoding.decode_without_bom_handling(&bytes);
    Some(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn frames(sizes: &[usize]) -> impl Stream<Item = Result<Bytes, FetchError>> {
        let items: Vec<Result<Bytes, FetchError>> = sizes
            .iter()
            .map(|&n| Ok(Bytes::from(vec![b'x'; n])))
            .collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let body = read_body_bounded(frames(&[4096, 4096, 100]), 10_000, 8192)
            .await
            .unwrap();
        assert_eq!(body.len(), 8292);
    }

    #[tokio::test]
    async fn test_read_body_exactly_at_limit() {
        let body = read_body_bounded(frames(&[512, 512]), 1024, 256)
            .await
            .unwrap();
        assert_eq!(body.len(), 1024);
    }

    #[tokio::test]
    async fn test_read_body_over_limit_stops_early() {
        let polled = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = polled.clone();
        let stream = frames(&[600, 600, 600, 600]).inspect(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let err = read_body_bounded(stream, 1000, 256).await.unwrap_err();
        assert!(matches!(err, FetchError::ContentTooLarge { limit: 1000 }));
        // Abort happens on the second frame; the rest is never pulled.
        assert_eq!(polled.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_read_body_propagates_stream_error() {
        let items: Vec<Result<Bytes, FetchError>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(FetchError::Request("connection reset".to_string())),
        ];
        let err = read_body_bounded(stream::iter(items), 1024, 8192)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Request(_)));
    }

    #[test]
    fn test_parse_content_disposition_filename() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=\"file.pdf\""),
            Some("file.pdf".to_string())
        );
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=file.csv"),
            Some("file.csv".to_string())
        );
        assert_eq!(
            parse_content_disposition_filename("inline; filename=\"report.json\"; size=1234"),
            Some("report.json".to_string())
        );
        assert_eq!(parse_content_disposition_filename("inline"), None);
        assert_eq!(parse_content_disposition_filename("attachment; filename=\"\""), None);
    }

    #[test]
    fn test_parse_content_disposition_extended() {
        assert_eq!(
            parse_content_disposition_filename(
                "attachment; filename=\"fallback.txt\"; filename*=UTF-8''na%C3%AFve%20notes.md"
            ),
            Some("naïve notes.md".to_string())
        );
        assert_eq!(
            parse_content_disposition_filename("attachment; filename*=iso-8859-1'en'caf%E9.csv"),
            Some("café.csv".to_string())
        );
        // Malformed extended value falls back to the plain one
        assert_eq!(
            parse_content_disposition_filename("attachment; filename*=broken; filename=plain.pdf"),
            Some("plain.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_quoting_and_paths() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=\"a; b.txt\"; size=3"),
            Some("a; b.txt".to_string())
        );
        assert_eq!(
            parse_content_disposition_filename(r#"attachment; filename="say \"hi\".txt""#),
            Some("say \"hi\".txt".to_string())
        );
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=\"../../etc/report.json\""),
            Some("report.json".to_string())
        );
        assert_eq!(
            parse_content_disposition_filename("attachment; FILENAME=upper.csv"),
            Some("upper.csv".to_string())
        );
    }

    #[test]
    fn test_extract_filename_from_url() {
        let headers = HeaderMap::new();
        let url = Url::parse("https://example.com/path/to/data.json").unwrap();
        assert_eq!(extract_filename(&headers, &url), Some("data.json".to_string()));

        let url = Url::parse("https://example.com/path/to/document").unwrap();
        assert_eq!(extract_filename(&headers, &url), None);

        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_filename(&headers, &url), None);
    }

    #[test]
    fn test_extract_filename_prefers_disposition() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"export.csv\""),
        );
        let url = Url::parse("https://example.com/download.php").unwrap();
        assert_eq!(extract_filename(&headers, &url), Some("export.csv".to_string()));
    }

    #[test]
    fn test_http_fetcher_builds_with_defaults() {
        let fetcher = HttpFetcher::new(&Config::default()).unwrap();
        assert_eq!(fetcher.name(), "http");
        assert_eq!(fetcher.max_content_size, 10 * 1024 * 1024);
        assert_eq!(fetcher.chunk_size, 8192);
    }
}
