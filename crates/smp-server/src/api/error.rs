//! API error types and responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use smp_core::SmpError;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Registry(#[from] SmpError),
}

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

fn registry_status(err: &SmpError) -> StatusCode {
    match err {
        SmpError::Validation(_) => StatusCode::BAD_REQUEST,
        SmpError::Conflict(_) => StatusCode::CONFLICT,
        SmpError::NotFound(_) => StatusCode::NOT_FOUND,
        SmpError::NetworkRegistration(_) | SmpError::Directory(_) => StatusCode::BAD_GATEWAY,
        SmpError::Compensation { .. } => StatusCode::BAD_GATEWAY,
        SmpError::Persistence(_) | SmpError::Security(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                msg.clone(),
                None,
            ),
            ApiError::Registry(SmpError::Compensation { cause, compensation }) => (
                registry_status(cause),
                "COMPENSATION_FAILED",
                "Operation failed and could not be fully rolled back".to_string(),
                Some(serde_json::json!({
                    "cause": cause.to_string(),
                    "cause_code": cause.code(),
                    "compensation": compensation.to_string(),
                })),
            ),
            ApiError::Registry(err @ SmpError::Security(_)) => {
                error!(error = %err, "Server credential could not be read");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    err.code(),
                    "Server credential could not be read".to_string(),
                    None,
                )
            }
            ApiError::Registry(err) => (registry_status(err), err.code(), err.to_string(), None),
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<base64::DecodeError> for ApiError {
    fn from(err: base64::DecodeError) -> Self {
        ApiError::BadRequest(format!("Invalid base64 encoding: {}", err))
    }
}
