use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::fetch::fetcher::FetchError;
use crate::outreach::pipeline::PipelineError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Portfolio index error: {0}")]
    Index(String),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Fetch(e @ (FetchError::InvalidUrl(_) | FetchError::UnsafeUrl(_))) => {
                AppError::Validation(e.to_string())
            }
            PipelineError::Fetch(e) => AppError::Fetch(e.to_string()),
            PipelineError::Llm(e) => AppError::Llm(e.to_string()),
            PipelineError::Index(e) => AppError::Index(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Fetch(msg) => {
                tracing::warn!("Fetch error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "FETCH_ERROR",
                    format!("Could not load the job page: {msg}"),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Index(msg) => {
                tracing::error!("Portfolio index error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INDEX_ERROR",
                    "A portfolio lookup error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;

    #[test]
    fn test_fetch_failure_maps_to_bad_gateway() {
        let err: AppError = PipelineError::Fetch(FetchError::NoContent("u".to_string())).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_bad_or_unsafe_url_maps_to_bad_request() {
        for fetch_err in [
            FetchError::InvalidUrl("not a url".to_string()),
            FetchError::UnsafeUrl("http://127.0.0.1/".to_string()),
        ] {
            let err: AppError = PipelineError::Fetch(fetch_err).into();
            assert!(matches!(err, AppError::Validation(_)));
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_upstream_status_still_maps_to_bad_gateway() {
        let err: AppError =
            PipelineError::Fetch(FetchError::HttpStatus(503, "u".to_string())).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_llm_failure_maps_to_internal_error() {
        let err: AppError = PipelineError::Llm(LlmError::EmptyContent).into();
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = AppError::Validation("url cannot be empty".to_string());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
