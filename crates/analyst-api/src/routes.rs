//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use analyst_core::config::ServerConfig;
use analyst_core::error::AnalystError;

use crate::handlers;
use crate::state::AppState;

/// The server's own localhost origins plus any configured extras.
fn allowed_origins(server: &ServerConfig) -> Vec<HeaderValue> {
    let own = [
        format!("http://127.0.0.1:{}", server.port),
        format!("http://localhost:{}", server.port),
    ];

    own.into_iter()
        .chain(server.allowed_origins.iter().cloned())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(&state.config.server)))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let api_routes = Router::new()
        .route("/start-session", post(handlers::start_session))
        .route("/text-query", post(handlers::text_query))
        .route("/audio-query", post(handlers::audio_query))
        .route(
            "/conversation-history/{session_id}",
            get(handlers::conversation_history),
        )
        .route(
            "/clear-conversation/{session_id}",
            delete(handlers::clear_conversation),
        )
        .route("/backend-health", get(handlers::backend_health))
        .route("/metrics", get(handlers::metrics));

    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind to the configured host and port and serve until shutdown.
pub async fn start_server(state: AppState) -> Result<(), AnalystError> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let router = create_router(state);

    tracing::info!("Starting proxy server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AnalystError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| AnalystError::Api(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_origins_use_port() {
        let server = ServerConfig {
            port: 4000,
            ..Default::default()
        };
        let origins = allowed_origins(&server);
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "http://127.0.0.1:4000");
        assert_eq!(origins[1], "http://localhost:4000");
    }

    #[test]
    fn test_invalid_origins_are_dropped() {
        let server = ServerConfig {
            allowed_origins: vec![
                "https://dashboard.example.com".to_string(),
                "bad\norigin".to_string(),
            ],
            ..Default::default()
        };
        let origins = allowed_origins(&server);
        assert_eq!(origins.len(), 3);
        assert_eq!(origins[2], "https://dashboard.example.com");
    }
}
