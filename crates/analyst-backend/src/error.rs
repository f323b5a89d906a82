//! Backend client error types.

use thiserror::Error;

use analyst_core::error::AnalystError;

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached at all.
    #[error("Failed to connect to backend at {url}: {message}")]
    ConnectionFailed { url: String, message: String },

    /// The request did not complete in time.
    #[error("Backend request to {url} timed out")]
    Timeout { url: String },

    /// HTTP request failed for another reason.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was not the expected JSON.
    #[error("Failed to parse backend response: {0}")]
    InvalidResponse(String),

    /// A session id that cannot be used as a URL path segment.
    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// The configured base URL cannot take path segments.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    /// Classify a transport error from reqwest.
    pub(crate) fn from_transport(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() {
            BackendError::ConnectionFailed {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            BackendError::RequestFailed(err)
        }
    }

    /// Whether the backend was unreachable rather than misbehaving.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            BackendError::ConnectionFailed { .. } | BackendError::Timeout { .. }
        )
    }
}

impl From<BackendError> for AnalystError {
    fn from(err: BackendError) -> Self {
        AnalystError::Backend(err.to_string())
    }
}
