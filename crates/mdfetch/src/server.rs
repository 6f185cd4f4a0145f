//! HTTP surface
//!
//! `GET /healthz` answers `ok`. Any other `GET /{url}` runs the pipeline on
//! the URL embedded in the path. This is the only place pipeline errors are
//! turned into HTTP statuses.

use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::target::{self, Target};
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Body of the response to an empty path
pub const WELCOME_MESSAGE: &str = "Welcome to URL to Markdown API\n\
Usage: GET /<url>, for example /example.com/page or /https://example.com/page";

/// JSON body of every error response
#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

/// Build the service router
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(convert_url))
        .route("/{*target}", get(convert_url))
        .with_state(pipeline)
}

/// HTTP status for a pipeline failure
pub fn status_for(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
        PipelineError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        PipelineError::ConversionFailed(_) => StatusCode::BAD_REQUEST,
        PipelineError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        PipelineError::Fetch(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn convert_url(State(pipeline): State<Arc<Pipeline>>, uri: Uri) -> Response {
    let raw = target::raw_target(uri.path(), uri.query());
    info!(path = %raw, "Received URL path");

    match target::classify(&raw) {
        Target::Welcome => WELCOME_MESSAGE.into_response(),
        Target::NotFound => {
            info!(path = %raw, "Skipping system file");
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
        Target::Convert(url) => match pipeline.convert(&url).await {
            Ok(text) => text.into_response(),
            Err(err) => error_response(&url, err),
        },
    }
}

fn error_response(url: &str, err: PipelineError) -> Response {
    let status = status_for(&err);
    match &err {
        PipelineError::Validation(_) => error!(url = %url, error = %err, "Validation error"),
        PipelineError::UnsupportedFormat(_) => error!(url = %url, error = %err, "Unsupported format"),
        PipelineError::ConversionFailed(_) => error!(url = %url, error = %err, "Conversion failed"),
        PipelineError::Timeout => error!(url = %url, "Conversion timeout"),
        PipelineError::Fetch(_) => error!(url = %url, error = %err, "HTTP request failed"),
        PipelineError::Internal(_) => {
            error!(url = %url, error = ?err, "Unexpected error processing URL")
        }
    }

    let body = ErrorBody {
        detail: err.to_string(),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (PipelineError::Validation("x".into()), 400),
            (PipelineError::UnsupportedFormat("x".into()), 415),
            (PipelineError::ConversionFailed("x".into()), 400),
            (PipelineError::Timeout, 504),
            (
                PipelineError::Fetch(FetchError::ContentTooLarge { limit: 10 }),
                502,
            ),
            (PipelineError::Fetch(FetchError::HttpStatus { status: 404 }), 502),
            (PipelineError::Internal("x".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(status_for(&err).as_u16(), status, "{err}");
        }
    }

    #[test]
    fn test_welcome_message() {
        assert!(WELCOME_MESSAGE.starts_with("Welcome to URL to Markdown API\nUsage: "));
    }
}
