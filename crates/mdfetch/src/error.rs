//! Error types for mdfetch
//!
//! Every pipeline stage returns its own classified error. They all fold
//! into [`PipelineError`], the closed set the HTTP layer maps to statuses.

use thiserror::Error;

/// Errors raised while downloading the target resource
#[derive(Debug, Error)]
pub enum FetchError {
    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Failed to connect to server
    #[error("Failed to connect to server: {0}")]
    Connect(#[source] reqwest::Error),

    /// Server answered with a non-2xx status
    #[error("Server returned HTTP {status}")]
    HttpStatus { status: u16 },

    /// Body is larger than the configured limit
    #[error("Content size exceeds maximum limit ({limit} bytes)")]
    ContentTooLarge { limit: usize },

    /// Other request error
    #[error("Request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Create an error from a reqwest error
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connect(err)
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus {
                status: status.as_u16(),
            }
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::from_reqwest(err)
    }
}

/// Errors raised by a [`Converter`](crate::Converter)
#[derive(Debug, Error)]
pub enum ConvertError {
    /// No converter understands this document type
    #[error("{0}")]
    UnsupportedFormat(String),

    /// The format is known but this document could not be processed
    #[error("{0}")]
    ConversionFailed(String),
}

/// Every way a conversion request can fail
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Target URL is malformed or has no host
    #[error("{0}")]
    Validation(String),

    /// Document type is not convertible
    #[error("Unsupported URL format: {0}")]
    UnsupportedFormat(String),

    /// Converter failed on this particular document
    #[error("URL conversion failed: {0}")]
    ConversionFailed(String),

    /// Overall conversion envelope elapsed
    #[error("Conversion timed out. Please try again later.")]
    Timeout,

    /// Download failed
    #[error("Failed to fetch URL: {0}")]
    Fetch(#[from] FetchError),

    /// Anything else
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ConvertError> for PipelineError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::UnsupportedFormat(msg) => PipelineError::UnsupportedFormat(msg),
            ConvertError::ConversionFailed(msg) => PipelineError::ConversionFailed(msg),
        }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PipelineError::Validation("Invalid URL: no domain specified".to_string()).to_string(),
            "Invalid URL: no domain specified"
        );
        assert_eq!(
            PipelineError::Timeout.to_string(),
            "Conversion timed out. Please try again later."
        );
        assert_eq!(
            PipelineError::from(FetchError::HttpStatus { status: 404 }).to_string(),
            "Failed to fetch URL: Server returned HTTP 404"
        );
        assert_eq!(
            FetchError::ContentTooLarge {
                limit: 10 * 1024 * 1024
            }
            .to_string(),
            "Content size exceeds maximum limit (10485760 bytes)"
        );
    }

    #[test]
    fn test_convert_error_classification() {
        let err: PipelineError = ConvertError::UnsupportedFormat("application/pdf".into()).into();
        assert!(matches!(err, PipelineError::UnsupportedFormat(_)));
        assert_eq!(err.to_string(), "Unsupported URL format: application/pdf");

        let err: PipelineError = ConvertError::ConversionFailed("bad json".into()).into();
        assert!(matches!(err, PipelineError::ConversionFailed(_)));
        assert_eq!(err.to_string(), "URL conversion failed: bad json");
    }
}
