//! mdfetch - URL to Markdown web service
//!
//! Give it a URL in the request path and it downloads the resource and
//! answers with its content as Markdown.
//!
//! ## Pipeline
//!
//! 1. [`target`] turns the raw path into an absolute http(s) URL
//! 2. [`Fetcher`] downloads it with a single bounded GET
//! 3. [`decode`](mod@decode) resolves the charset of HTML and stages it in a temp file
//! 4. [`Converter`] produces Markdown from the file or the raw bytes
//! 5. [`Pipeline`] runs 2-4 under one timeout off the request task
//!
//! [`server::router`] exposes the pipeline over HTTP and maps every
//! [`PipelineError`] to a status code.

pub mod config;
pub mod convert;
pub mod decode;
mod error;
pub mod fetcher;
mod pipeline;
pub mod server;
pub mod target;

pub use config::{Config, ConfigBuilder};
pub use convert::{
    html_to_markdown, ConversionResult, Converter, MarkdownConverter, StreamInfo,
};
pub use decode::DecodedDocument;
pub use error::{ConvertError, FetchError, PipelineError};
pub use fetcher::{FetchedContent, Fetcher, HttpFetcher};
pub use pipeline::Pipeline;
pub use server::{router, WELCOME_MESSAGE};

/// Default User-Agent string
///
/// A desktop browser string; many sites refuse unknown clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
