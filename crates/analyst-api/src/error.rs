//! API error types and JSON error response formatting.
//!
//! Every failure the proxy itself produces is a JSON body of the form
//! `{"error": code, "message": text}`. Backend failures become 502 so a
//! client never mistakes them for a relayed answer.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::warn;

use analyst_backend::BackendError;
use analyst_core::error::AnalystError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "bad_gateway").
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - malformed client request.
    BadRequest(String),
    /// 413 Payload Too Large - upload exceeds the configured limit.
    PayloadTooLarge(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 502 Bad Gateway - backend unreachable or answered with non-JSON.
    BadGateway(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_code, message) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg),
            ApiError::PayloadTooLarge(msg) => ("payload_too_large", msg),
            ApiError::Internal(msg) => ("internal_error", msg),
            ApiError::BadGateway(msg) => ("bad_gateway", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        if let BackendError::InvalidSessionId(_) = err {
            return ApiError::BadRequest(err.to_string());
        }
        warn!(error = %err, "Backend request failed");
        ApiError::BadGateway(err.to_string())
    }
}

impl From<AnalystError> for ApiError {
    fn from(err: AnalystError) -> Self {
        match err {
            AnalystError::Backend(msg) => ApiError::BadGateway(msg),
            AnalystError::PayloadTooLarge { size, limit } => ApiError::PayloadTooLarge(format!(
                "upload of {} bytes exceeds limit of {} bytes",
                size, limit
            )),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}
