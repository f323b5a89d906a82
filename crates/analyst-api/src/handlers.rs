//! Route handler functions for all API endpoints.
//!
//! Proxy handlers forward the client's body to the backend and hand back the
//! backend's JSON answer with its status code. Transport failures and non-JSON
//! answers become `ApiError::BadGateway`.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use analyst_backend::UpstreamResponse;
use analyst_core::error::AnalystError;
use analyst_core::types::MetricsSnapshot;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub backend_url: String,
}

/// Send an upstream answer back to the client as-is.
fn relay(upstream: UpstreamResponse) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(upstream.body)).into_response()
}

// =============================================================================
// Conversation proxy
// =============================================================================

/// POST /api/start-session
pub async fn start_session(State(state): State<AppState>) -> Result<Response, ApiError> {
    let route = state.backend.routes().start_session;
    let upstream = state.backend.post_json(route, None).await?;
    if let Some(id) = upstream.body.get("session_id").and_then(Value::as_str) {
        info!(session_id = %id, "Session started");
    }
    Ok(relay(upstream))
}

/// POST /api/text-query
pub async fn text_query(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let route = state.backend.routes().text_query;
    let upstream = state.backend.post_json(route, Some(&body)).await?;
    debug!(status = upstream.status, "Text query relayed");
    Ok(relay(upstream))
}

/// POST /api/audio-query
///
/// Every part of the incoming form is copied into a new form, keeping
/// field names, file names and content types.
pub async fn audio_query(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let limit = state.config.server.max_upload_bytes;
    let mut form = Form::new();
    let mut total = 0usize;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;

        total += data.len();
        if total > limit {
            return Err(AnalystError::PayloadTooLarge { size: total, limit }.into());
        }

        form = match file_name {
            Some(file_name) => {
                let mut part = Part::bytes(data.to_vec()).file_name(file_name);
                if let Some(content_type) = content_type {
                    part = part
                        .mime_str(&content_type)
                        .map_err(|e| ApiError::BadRequest(format!("Invalid content type: {}", e)))?;
                }
                form.part(name, part)
            }
            None => form.text(name, String::from_utf8_lossy(&data).into_owned()),
        };
    }

    let route = state.backend.routes().audio_query;
    let upstream = state.backend.post_multipart(route, form).await?;
    debug!(status = upstream.status, bytes = total, "Audio query relayed");
    Ok(relay(upstream))
}

/// GET /api/conversation-history/{session_id}
pub async fn conversation_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let prefix = state.backend.routes().conversation_history;
    Ok(relay(state.backend.get_session(prefix, &session_id).await?))
}

/// DELETE /api/clear-conversation/{session_id}
pub async fn clear_conversation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let prefix = state.backend.routes().clear_conversation;
    let upstream = state.backend.delete_session(prefix, &session_id).await?;
    info!(session_id = %session_id, status = upstream.status, "Conversation clear relayed");
    Ok(relay(upstream))
}

/// GET /api/backend-health
pub async fn backend_health(State(state): State<AppState>) -> Result<Response, ApiError> {
    let route = state.backend.routes().health;
    Ok(relay(state.backend.get(route).await?))
}

// =============================================================================
// Metrics and liveness
// =============================================================================

/// GET /api/metrics - month-to-date order statistics.
pub async fn metrics(State(state): State<AppState>) -> Result<Json<MetricsSnapshot>, ApiError> {
    let snapshot = state.metrics.snapshot().await?;
    Ok(Json(snapshot))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        backend_url: state.backend.base_url().to_string(),
    })
}
