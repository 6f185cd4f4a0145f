//! PDF text extraction

use crate::error::ConvertError;
use std::panic::{self, AssertUnwindSafe};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Check for the PDF header
pub fn looks_like_pdf(body: &[u8]) -> bool {
    body.starts_with(PDF_MAGIC)
}

/// Extract the text layer of a PDF
///
/// Pages without a text layer (scans) contribute nothing. Broken documents
/// are reported as conversion failures, including parser panics.
pub fn pdf_to_markdown(body: &[u8]) -> Result<String, ConvertError> {
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(body)
    }))
    .map_err(|_| ConvertError::ConversionFailed("malformed PDF document".to_string()))?
    .map_err(|e| ConvertError::ConversionFailed(format!("malformed PDF document: {e:?}")))?;

    let text = extracted
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    Ok(text.trim().to_string())
}
