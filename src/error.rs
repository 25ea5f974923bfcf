//! # Error Handling
//!
//! This module defines the application error type and how each variant is
//! converted into an HTTP response.
//!
//! ## Error Categories:
//! - **Internal**: Server-side problems (500 errors)
//! - **BadRequest / ValidationError**: Client sent invalid data (400 errors)
//! - **NotFound**: Requested resource doesn't exist (404 errors)
//! - **ConfigError**: Configuration problems (500 errors)
//! - **UnrecognizedFormat**: Uploaded audio has no readable WAV header (400 errors)
//! - **FormatConversion**: Transcoded audio still off-target (500 errors)
//! - **Decode**: A session-state envelope could not be decoded (502 errors)
//! - **ExternalService**: A cloud collaborator failed or timed out (502 errors)
//!
//! External-service, conversion, and decode failures carry detail that
//! belongs in the server log, not in the client response; the
//! `ResponseError` impl returns a generic message for those variants and
//! logs the detail.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;
use tracing::error;

/// Application error type returned by handlers and core components.
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors (I/O failures, lock poisoning, etc.)
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Requested resource was not found
    NotFound(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// User input failed validation rules
    ValidationError(String),

    /// Uploaded bytes do not carry a recognizable WAV header
    UnrecognizedFormat(String),

    /// Audio was transcoded but still does not match the target format
    FormatConversion(String),

    /// A compressed session-state envelope could not be decoded
    Decode(String),

    /// A cloud collaborator (dialog, transcription, transcoder) failed
    ExternalService(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::UnrecognizedFormat(msg) => write!(f, "Unrecognized audio format: {}", msg),
            AppError::FormatConversion(msg) => write!(f, "Audio format conversion failed: {}", msg),
            AppError::Decode(msg) => write!(f, "Envelope decode error: {}", msg),
            AppError::ExternalService(msg) => write!(f, "External service error: {}", msg),
        }
    }
}

/// Conversion of `AppError` into JSON HTTP error responses.
///
/// ## HTTP Status Code Mapping:
/// - Internal/ConfigError/FormatConversion → 500
/// - BadRequest/ValidationError/UnrecognizedFormat → 400
/// - NotFound → 404
/// - Decode/ExternalService → 502
///
/// ## JSON Response Format:
/// ```json
/// {
///   "error": {
///     "type": "external_service_error",
///     "message": "Error communicating with an upstream service",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
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
            AppError::UnrecognizedFormat(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "unrecognized_format",
                msg.clone(),
            ),
            AppError::FormatConversion(_) => {
                error!(detail = %self, "audio format conversion failed");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "format_conversion_error",
                    "Error converting audio to the required format".to_string(),
                )
            }
            AppError::Decode(_) => {
                error!(detail = %self, "envelope decode failed");
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "decode_error",
                    "Error decoding a structured response field".to_string(),
                )
            }
            AppError::ExternalService(_) => {
                error!(detail = %self, "external service call failed");
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "external_service_error",
                    "Error communicating with an upstream service".to_string(),
                )
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

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON parsing failures are almost always malformed client input.
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

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

/// Transport-level failures talking to a collaborator.
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalService(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        use actix_web::http::StatusCode;

        let cases = [
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::UnrecognizedFormat("x".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::FormatConversion("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Decode("x".into()), StatusCode::BAD_GATEWAY),
            (AppError::ExternalService("x".into()), StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            assert_eq!(err.error_response().status(), expected);
        }
    }

    #[test]
    fn test_generic_message_for_external_failures() {
        // Upstream detail must not leak into the client-facing body.
        let err = AppError::ExternalService("secret upstream detail".to_string());
        let response = err.error_response();
        assert_eq!(response.status(), actix_web::http::StatusCode::BAD_GATEWAY);
        // Display still carries the detail for server-side logs.
        assert!(err.to_string().contains("secret upstream detail"));
    }
}
