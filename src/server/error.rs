//! HTTP error responses.
//!
//! Every error body has the shape
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Prompt is required" } }
//! ```
//!
//! with an optional `details` array for field validation failures.
//! Error codes: `bad_request` (400), `validation_failed` (400),
//! `unauthorized` (401), `not_found` (404), `payload_too_large` (413),
//! `internal` (500).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

/// Error type returned by every handler.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<Vec<String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }
}

pub fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

/// 400 carrying one message per failed field rule.
pub fn validation_failed(details: Vec<String>) -> AppError {
    AppError {
        details: Some(details),
        ..AppError::new(StatusCode::BAD_REQUEST, "validation_failed", "Validation failed")
    }
}

pub fn unauthorized(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

pub fn payload_too_large(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", message)
}

/// Log `err` with its full chain and return a 500 with a generic message.
pub fn internal(public_message: &str, err: anyhow::Error) -> AppError {
    error!(error = format!("{:#}", err), "{}", public_message);
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", public_message)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let (status, json) = body_json(not_found("Form not found")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "not_found");
        assert_eq!(json["error"]["message"], "Form not found");
        assert!(json["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn test_validation_details() {
        let (status, json) =
            body_json(validation_failed(vec!["Field \"Email\" is required".into()])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["details"][0], "Field \"Email\" is required");
    }

    #[tokio::test]
    async fn test_internal_hides_cause() {
        let (status, json) =
            body_json(internal("Failed to submit form", anyhow::anyhow!("disk full"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["message"], "Failed to submit form");
    }
}
