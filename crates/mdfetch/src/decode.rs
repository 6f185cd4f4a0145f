//! Content decoding
//!
//! HTML is decoded to UTF-8 text and written to a scoped `.html` temp file
//! for the converter's path-based API. Everything else stays as raw bytes.
//! Decoding never fails on bad input: invalid sequences become U+FFFD.

use crate::error::PipelineError;
use crate::fetcher::FetchedContent;
use bytes::Bytes;
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Fetched content prepared for conversion
#[derive(Debug)]
pub enum DecodedDocument {
    /// Decoded markup materialized on disk
    Html(HtmlFile),
    /// Raw bytes for the stream-based converter
    Stream {
        body: Bytes,
        content_type: String,
        filename: Option<String>,
    },
}

/// UTF-8 HTML in a temp file, removed when dropped
#[derive(Debug)]
pub struct HtmlFile {
    file: NamedTempFile,
    encoding: &'static Encoding,
}

impl HtmlFile {
    /// Path of the temp file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Encoding the source bytes were decoded with
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }
}

impl Drop for HtmlFile {
    fn drop(&mut self) {
        debug!(path = %self.file.path().display(), "Cleaning up temp file");
    }
}

/// Prepare fetched content for the converter
///
/// `temp_dir` overrides the directory temp files are created in.
pub fn decode(
    content: FetchedContent,
    temp_dir: Option<&Path>,
) -> Result<DecodedDocument, PipelineError> {
    let content_type = content.content_type.to_lowercase();
    if !content_type.contains("text/html") {
        debug!(content_type = %content.content_type, "Passing raw bytes to stream converter");
        return Ok(DecodedDocument::Stream {
            body: content.body,
            content_type: content.content_type,
            filename: content.filename,
        });
    }

    let encoding = resolve_encoding(&content.content_type, &content.body);
    info!(encoding = encoding.name(), "Using encoding for HTML content");

    let text = decode_text(&content.body, encoding);
    let file = write_temp_html(&text, temp_dir)
        .map_err(|e| PipelineError::Internal(format!("temp file: {e}")))?;

    Ok(DecodedDocument::Html(HtmlFile { file, encoding }))
}

/// Pick the encoding for an HTML body
///
/// Order: declared `charset=`, byte-order mark, statistical detection.
/// Pure ASCII (including an empty body) is treated as UTF-8.
/// A declared label `encoding_rs` does not know falls through to detection.
pub fn resolve_encoding(content_type: &str, body: &[u8]) -> &'static Encoding {
    if let Some(label) = charset_param(content_type) {
        match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => return encoding,
            None => warn!(charset = %label, "Unknown declared charset, detecting instead"),
        }
    }

    if let Some((encoding, _)) = Encoding::for_bom(body) {
        return encoding;
    }

    if Encoding::ascii_valid_up_to(body) == body.len() {
        return UTF_8;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(body, true);
    detector.guess(None, true)
}

/// Decode with replacement of invalid sequences
pub fn decode_text(body: &[u8], encoding: &'static Encoding) -> String {
    let (text, actual, had_errors) = encoding.decode(body);
    if had_errors {
        warn!(
            encoding = actual.name(),
            "Invalid byte sequences replaced while decoding"
        );
    }
    text.into_owned()
}

/// Value of the `charset` parameter in a Content-Type header
fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn write_temp_html(text: &str, dir: Option<&Path>) -> std::io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("mdfetch-").suffix(".html");
    let mut file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(file)
}
