//! Document to Markdown conversion
//!
//! [`Converter`] is the seam between the pipeline and the conversion
//! capability. It has two entry points, mirroring how documents arrive:
//! decoded HTML as a local file path, everything else as a byte stream.
//!
//! [`MarkdownConverter`] is the built-in implementation. It handles HTML,
//! plain text, JSON, CSV and the text layer of PDFs, and reports anything
//! else as unsupported.

mod data;
mod html;
mod pdf;

pub use html::{html_to_markdown, is_html};

use crate::decode::{decode_text, resolve_encoding, DecodedDocument};
use crate::error::{ConvertError, PipelineError};
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::info;

/// Bytes inspected when guessing the type of an unlabeled stream
const SNIFF_LEN: usize = 1024;

/// Hints about a byte stream handed to [`Converter::convert_stream`]
#[derive(Debug, Clone, Default)]
pub struct StreamInfo {
    /// Declared Content-Type, parameters included (may be empty)
    pub content_type: String,
    /// Lowercase file extension without the dot
    pub extension: Option<String>,
}

impl StreamInfo {
    /// Build hints from a content type and optional filename
    pub fn new(content_type: impl Into<String>, filename: Option<&str>) -> Self {
        Self {
            content_type: content_type.into(),
            extension: filename.and_then(extension_of),
        }
    }

    /// Media type without parameters, lowercased
    pub fn mime_type(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }
}

/// Output of a conversion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionResult {
    /// Markdown text
    pub text: String,
}

/// Converts documents to Markdown
///
/// Implementations run on the blocking thread pool, so they may do
/// synchronous I/O and CPU-heavy work.
pub trait Converter: Send + Sync {
    /// Identifier for logging
    fn name(&self) -> &'static str;

    /// Convert a document stored at `path`; the extension names its format
    fn convert_local(&self, path: &Path) -> Result<ConversionResult, ConvertError>;

    /// Convert a document read from `stream`
    fn convert_stream(
        &self,
        stream: &mut dyn Read,
        info: &StreamInfo,
    ) -> Result<ConversionResult, ConvertError>;
}

/// Run a decoded document through `converter`
///
/// HTML goes through the file path API, everything else through the stream
/// API. The document, and with it any temp file, is dropped before return.
pub fn convert_document(
    converter: &dyn Converter,
    document: DecodedDocument,
) -> Result<String, PipelineError> {
    let result = match document {
        DecodedDocument::Html(file) => {
            info!(
                converter = converter.name(),
                path = %file.path().display(),
                "Converting HTML from temp file"
            );
            converter.convert_local(file.path())?
        }
        DecodedDocument::Stream {
            body,
            content_type,
            filename,
        } => {
            info!(
                converter = converter.name(),
                content_type = %content_type,
                "Converting from stream"
            );
            let info = StreamInfo::new(content_type, filename.as_deref());
            converter.convert_stream(&mut Cursor::new(body), &info)?
        }
    };
    Ok(result.text)
}

/// Formats [`MarkdownConverter`] understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Html,
    Text,
    Json,
    Csv,
    Pdf,
}

impl Format {
    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "text/html" | "application/xhtml+xml" => Some(Format::Html),
            "text/csv" => Some(Format::Csv),
            "application/pdf" | "application/x-pdf" => Some(Format::Pdf),
            "application/json" => Some(Format::Json),
            m if m.ends_with("+json") => Some(Format::Json),
            m if m.starts_with("text/") => Some(Format::Text),
            _ => None,
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "html" | "htm" | "xhtml" => Some(Format::Html),
            "csv" => Some(Format::Csv),
            "json" => Some(Format::Json),
            "pdf" => Some(Format::Pdf),
            "txt" | "text" | "md" | "markdown" => Some(Format::Text),
            _ => None,
        }
    }
}

/// Built-in converter for HTML, text, JSON, CSV and PDF
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownConverter;

impl MarkdownConverter {
    /// Create a new converter
    pub fn new() -> Self {
        Self
    }

    fn render(
        &self,
        format: Format,
        body: &[u8],
        content_type: &str,
    ) -> Result<ConversionResult, ConvertError> {
        let text = || decode_text(body, resolve_encoding(content_type, body));
        let markdown = match format {
            Format::Html => html_to_markdown(&text()),
            Format::Text => text(),
            Format::Json => data::json_to_markdown(&text())?,
            Format::Csv => data::csv_to_markdown(&text())?,
            Format::Pdf => pdf::pdf_to_markdown(body)?,
        };
        Ok(ConversionResult {
            text: filter_excessive_newlines(&markdown),
        })
    }
}

impl Converter for MarkdownConverter {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn convert_local(&self, path: &Path) -> Result<ConversionResult, ConvertError> {
        let ext = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(extension_of);
        let format = ext
            .as_deref()
            .and_then(Format::from_extension)
            .ok_or_else(|| {
                ConvertError::UnsupportedFormat(format!(
                    "no converter for file extension '{}'",
                    ext.as_deref().unwrap_or("")
                ))
            })?;

        let body = std::fs::read(path).map_err(|e| {
            ConvertError::ConversionFailed(format!("could not read {}: {e}", path.display()))
        })?;
        // Local files are written as UTF-8 by the decoder.
        self.render(format, &body, "text/plain; charset=utf-8")
    }

    fn convert_stream(
        &self,
        stream: &mut dyn Read,
        info: &StreamInfo,
    ) -> Result<ConversionResult, ConvertError> {
        let mut body = Vec::new();
        stream
            .read_to_end(&mut body)
            .map_err(|e| ConvertError::ConversionFailed(format!("could not read stream: {e}")))?;

        let mime = info.mime_type();
        let format = Format::from_mime(&mime)
            .or_else(|| info.extension.as_deref().and_then(Format::from_extension))
            .or_else(|| sniff(&body));

        match format {
            Some(format) => self.render(format, &body, &info.content_type),
            None => Err(ConvertError::UnsupportedFormat(if mime.is_empty() {
                "could not determine document type".to_string()
            } else {
                format!("no converter for content type '{mime}'")
            })),
        }
    }
}

/// Guess the format from the first bytes of the body
fn sniff(body: &[u8]) -> Option<Format> {
    let head = &body[..body.len().min(SNIFF_LEN)];
    if pdf::looks_like_pdf(head) {
        Some(Format::Pdf)
    } else if is_html("", &String::from_utf8_lossy(head)) {
        Some(Format::Html)
    } else {
        None
    }
}

/// Lowercase extension of a filename, if it has one
fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_lowercase())
}

/// Filter excessive newlines: keep at most 2 consecutive newlines
pub fn filter_excessive_newlines(s: &str) -> String {
    let mut result = String::new();
    let mut newline_count = 0;

    for c in s.chars() {
        if c == '\n' {
            newline_count += 1;
            if newline_count <= 2 {
                result.push(c);
            }
        } else {
            newline_count = 0;
            result.push(c);
        }
    }

    result
}
