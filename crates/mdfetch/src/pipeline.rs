//! Request orchestration
//!
//! Runs fetch, decode and convert as one unit under the conversion timeout.
//! The async part (validation and download) runs in a spawned task; decode
//! and conversion run on the blocking pool so the request handler only ever
//! awaits.

use crate::config::Config;
use crate::convert::{convert_document, Converter, MarkdownConverter};
use crate::decode::decode;
use crate::error::{FetchError, PipelineError};
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::target;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fetch-decode-convert pipeline shared by all requests
///
/// Holds only read-only state; every call is independent.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    converter: Arc<dyn Converter>,
}

impl Pipeline {
    /// Pipeline with the HTTP fetcher and built-in Markdown converter
    pub fn new(config: Config) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self::with_components(
            config,
            Arc::new(fetcher),
            Arc::new(MarkdownConverter::new()),
        ))
    }

    /// Pipeline with custom fetcher and converter
    pub fn with_components(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        converter: Arc<dyn Converter>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            converter,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Convert the resource at a normalized URL to Markdown
    ///
    /// On timeout the pipeline task is aborted. A conversion already on the
    /// blocking pool runs to completion there; its output is discarded and
    /// its temp file is removed on that thread.
    pub async fn convert(&self, url: &str) -> Result<String, PipelineError> {
        info!(url = %url, "Starting conversion");

        let mut task = tokio::spawn(run_stages(
            self.config.clone(),
            self.fetcher.clone(),
            self.converter.clone(),
            url.to_string(),
        ));

        match tokio::time::timeout(self.config.conversion_timeout, &mut task).await {
            Ok(joined) => joined?,
            Err(_) => {
                task.abort();
                warn!(
                    url = %url,
                    timeout_ms = self.config.conversion_timeout.as_millis() as u64,
                    "Conversion envelope elapsed, abandoning pipeline"
                );
                Err(PipelineError::Timeout)
            }
        }
    }
}

async fn run_stages(
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    converter: Arc<dyn Converter>,
    url: String,
) -> Result<String, PipelineError> {
    let parsed = target::validate(&url)?;

    debug!(fetcher = fetcher.name(), url = %parsed, "Using fetcher");
    let content = fetcher.fetch(&parsed).await?;

    let text = tokio::task::spawn_blocking(move || {
        let document = decode(content, config.temp_dir.as_deref())?;
        convert_document(converter.as_ref(), document)
    })
    .await??;

    info!(url = %url, chars = text.len(), "Conversion completed successfully");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConversionResult, StreamInfo};
    use crate::error::ConvertError;
    use crate::fetcher::FetchedContent;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::io::Read;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;

    struct StaticFetcher {
        content_type: &'static str,
        body: &'static [u8],
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn new(content_type: &'static str, body: &'static [u8]) -> Self {
            Self {
                content_type,
                body,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn fetch(&self, url: &Url) -> Result<FetchedContent, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FetchedContent {
                url: url.clone(),
                status_code: 200,
                content_type: self.content_type.to_string(),
                filename: None,
                body: Bytes::from_static(self.body),
            })
        }
    }

    struct PanickingConverter;

    impl Converter for PanickingConverter {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn convert_local(&self, _path: &Path) -> Result<ConversionResult, ConvertError> {
            panic!("converter bug");
        }

        fn convert_stream(
            &self,
            _stream: &mut dyn Read,
            _info: &StreamInfo,
        ) -> Result<ConversionResult, ConvertError> {
            panic!("converter bug");
        }
    }

    fn pipeline(fetcher: Arc<StaticFetcher>, converter: Arc<dyn Converter>) -> Pipeline {
        let config = Config::builder()
            .conversion_timeout(Duration::from_secs(5))
            .build();
        Pipeline::with_components(config, fetcher, converter)
    }

    #[tokio::test]
    async fn test_html_pipeline() {
        let fetcher = Arc::new(StaticFetcher::new(
            "text/html; charset=utf-8",
            b"<h1>Hello</h1><p>World</p>",
        ));
        let pipeline = pipeline(fetcher.clone(), Arc::new(MarkdownConverter::new()));

        let text = pipeline.convert("https://www.example.com/").await.unwrap();
        assert_eq!(text, "# Hello\n\nWorld");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_happens_before_fetch() {
        let fetcher = Arc::new(StaticFetcher::new("text/plain", b"unused"));
        let pipeline = pipeline(fetcher.clone(), Arc::new(MarkdownConverter::new()));

        let err = pipeline.convert("http://").await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_converter_panic_is_internal_error() {
        let fetcher = Arc::new(StaticFetcher::new("application/json", b"{}"));
        let pipeline = pipeline(fetcher, Arc::new(PanickingConverter));

        let err = pipeline.convert("https://www.example.com/").await.unwrap_err();
        assert!(matches!(err, PipelineError::Internal(_)));
    }

    #[tokio::test]
    async fn test_unsupported_content_type() {
        let fetcher = Arc::new(StaticFetcher::new("image/png", b"\x89PNG"));
        let pipeline = pipeline(fetcher, Arc::new(MarkdownConverter::new()));

        let err = pipeline.convert("https://www.example.com/a.png").await.unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat(_)));
    }
}
