//! # Error Handling
//!
//! Two error layers live here:
//!
//! - **`PipelineError`**: the typed taxonomy of the analysis pipeline
//!   (decode, fetch, model load, inference). Every stage failure propagates
//!   as one of these variants rather than a silent default, so callers can
//!   distinguish a bad upload from a broken model even if the UI flattens
//!   them into one failure state.
//! - **`AppError`**: the HTTP-facing error type. Implements actix-web's
//!   `ResponseError` so handlers can return `Result<_, AppError>` and get a
//!   consistent JSON error envelope with a machine-readable `type` field.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Typed failures of the analysis pipeline.
///
/// ## Propagation policy:
/// Each external step (decode, sample fetch, model load, model evaluation) is
/// attempted exactly once — no retries. Errors carry a human-readable message;
/// the variant itself is the machine-readable classification.
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Bytes could not be parsed as audio in any supported container/codec.
    Decode(String),

    /// A sample audio resource was unreachable or timed out.
    Fetch(String),

    /// The model weights were unreachable, malformed, or timed out loading.
    ModelLoad(String),

    /// Input shape mismatch or runtime evaluation failure.
    Inference(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Decode(msg) => write!(f, "decode error: {}", msg),
            PipelineError::Fetch(msg) => write!(f, "fetch error: {}", msg),
            PipelineError::ModelLoad(msg) => write!(f, "model load error: {}", msg),
            PipelineError::Inference(msg) => write!(f, "inference error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Application-level errors mapped to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Server-side problems (500)
    Internal(String),

    /// Client sent invalid or malformed data (400)
    BadRequest(String),

    /// Requested resource was not found (404)
    NotFound(String),

    /// Configuration file or environment variable problems (500)
    ConfigError(String),

    /// User input failed validation rules (400)
    ValidationError(String),

    /// Requested resource exists but is not ready yet (503)
    ServiceUnavailable(String),

    /// A pipeline stage failed; keeps the typed taxonomy visible to clients
    Pipeline(PipelineError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::Pipeline(err) => write!(f, "Analysis failed: {}", err),
        }
    }
}

/// Converts errors into the JSON envelope all endpoints share:
///
/// ```json
/// {
///   "error": {
///     "type": "decode_error",
///     "message": "unsupported container",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
///
/// ## Status mapping:
/// - `Decode` → 400 (the client's audio was unreadable)
/// - `Fetch` → 502 (an upstream sample resource failed)
/// - `ModelLoad` / `Inference` → 500
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "not_found",
                msg.clone(),
            ),
            AppError::ConfigError(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
            ),
            AppError::ServiceUnavailable(msg) => (
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
            AppError::Pipeline(err) => {
                let (status, error_type) = match err {
                    PipelineError::Decode(_) => {
                        (actix_web::http::StatusCode::BAD_REQUEST, "decode_error")
                    }
                    PipelineError::Fetch(_) => {
                        (actix_web::http::StatusCode::BAD_GATEWAY, "fetch_error")
                    }
                    PipelineError::ModelLoad(_) => (
                        actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                        "model_load_error",
                    ),
                    PipelineError::Inference(_) => (
                        actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                        "inference_error",
                    ),
                };
                (status, error_type, err.to_string())
            }
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::Decode("bad riff header".to_string());
        assert_eq!(err.to_string(), "decode error: bad riff header");

        let err = PipelineError::Inference("expected 1024 features".to_string());
        assert!(err.to_string().starts_with("inference error"));
    }

    #[test]
    fn test_pipeline_error_status_codes() {
        let decode = AppError::from(PipelineError::Decode("x".into()));
        assert_eq!(decode.error_response().status().as_u16(), 400);

        let fetch = AppError::from(PipelineError::Fetch("x".into()));
        assert_eq!(fetch.error_response().status().as_u16(), 502);

        let load = AppError::from(PipelineError::ModelLoad("x".into()));
        assert_eq!(load.error_response().status().as_u16(), 500);

        let infer = AppError::from(PipelineError::Inference("x".into()));
        assert_eq!(infer.error_response().status().as_u16(), 500);
    }

    #[test]
    fn test_service_unavailable_status_code() {
        let err = AppError::ServiceUnavailable("still fetching".into());
        assert_eq!(err.error_response().status().as_u16(), 503);
    }
}
