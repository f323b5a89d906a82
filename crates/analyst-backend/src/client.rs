//! Backend HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use analyst_core::config::BackendConfig;
use analyst_core::types::{
    AudioBlob, AudioQueryReply, ConversationHistory, QueryReply, Session, TextQueryRequest,
};

use crate::error::BackendError;
use crate::routes::{is_valid_session_id, RouteTable};

/// Typed conversation operations against the analytics backend.
#[async_trait]
pub trait AnalystBackend: Send + Sync {
    /// Open a new conversation and return its session id.
    async fn start_session(&self) -> Result<Session, BackendError>;

    /// Ask a typed question within a session.
    async fn text_query(&self, session_id: &str, text: &str) -> Result<QueryReply, BackendError>;

    /// Upload a voice recording within a session.
    async fn audio_query(
        &self,
        session_id: &str,
        audio: &AudioBlob,
    ) -> Result<AudioQueryReply, BackendError>;

    /// Fetch the exchanges the backend holds for a session.
    async fn conversation_history(
        &self,
        session_id: &str,
    ) -> Result<ConversationHistory, BackendError>;

    /// Drop the backend's context for a session.
    async fn clear_conversation(&self, session_id: &str) -> Result<(), BackendError>;
}

/// A parsed JSON response together with its HTTP status.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Value,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize a successful body, or turn an error status into
    /// `BackendError::Status`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, BackendError> {
        if !self.is_success() {
            return Err(BackendError::Status {
                status: self.status,
                message: error_message(&self.body),
            });
        }
        serde_json::from_value(self.body).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

/// Pull a human-readable message out of a backend error body.
fn error_message(body: &Value) -> String {
    ["error", "message", "reply"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

/// Build the multipart form the audio-query routes expect.
pub fn audio_form(session_id: &str, audio: &AudioBlob) -> Result<Form, BackendError> {
    let part = Part::bytes(audio.bytes.clone())
        .file_name(format!("audio.{}", audio.extension()))
        .mime_str(&audio.mime_type)?;
    Ok(Form::new()
        .part("audio", part)
        .text("session_id", session_id.to_string()))
}

/// reqwest-based client for either the backend or the proxy.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    routes: RouteTable,
}

impl HttpBackend {
    /// Create a client for `base_url` using the given route table.
    ///
    /// `timeout` bounds every request; `None` waits indefinitely.
    pub fn new(
        base_url: impl Into<String>,
        routes: RouteTable,
        timeout: Option<Duration>,
    ) -> Result<Self, BackendError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            routes,
        })
    }

    /// Client for the analytics backend described by `config`.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        Self::new(config.base_url.clone(), RouteTable::BACKEND, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of `prefix` with `session_id` appended as one encoded segment.
    fn session_url(&self, prefix: &str, session_id: &str) -> Result<Url, BackendError> {
        if !is_valid_session_id(session_id) {
            return Err(BackendError::InvalidSessionId(session_id.to_string()));
        }
        let mut url =
            Url::parse(&self.url(prefix)).map_err(|e| BackendError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.clone()))?
            .push(session_id);
        Ok(url)
    }

    /// POST an optional JSON body and parse the JSON answer.
    pub async fn post_json(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> Result<UpstreamResponse, BackendError> {
        let url = self.url(path);
        let mut request = self.client.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(url, request).await
    }

    /// POST a multipart form and parse the JSON answer.
    pub async fn post_multipart(
        &self,
        path: &str,
        form: Form,
    ) -> Result<UpstreamResponse, BackendError> {
        let url = self.url(path);
        let request = self.client.post(&url).multipart(form);
        self.send(url, request).await
    }

    pub async fn get(&self, path: &str) -> Result<UpstreamResponse, BackendError> {
        let url = self.url(path);
        let request = self.client.get(&url);
        self.send(url, request).await
    }

    /// GET `prefix/{session_id}`.
    pub async fn get_session(
        &self,
        prefix: &str,
        session_id: &str,
    ) -> Result<UpstreamResponse, BackendError> {
        let url = self.session_url(prefix, session_id)?;
        let request = self.client.get(url.clone());
        self.send(url.to_string(), request).await
    }

    /// DELETE `prefix/{session_id}`.
    pub async fn delete_session(
        &self,
        prefix: &str,
        session_id: &str,
    ) -> Result<UpstreamResponse, BackendError> {
        let url = self.session_url(prefix, session_id)?;
        let request = self.client.delete(url.clone());
        self.send(url.to_string(), request).await
    }

    async fn send(
        &self,
        url: String,
        request: RequestBuilder,
    ) -> Result<UpstreamResponse, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::from_transport(&url, e))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::from_transport(&url, e))?;

        let body: Value = serde_json::from_slice(&bytes).map_err(|e| {
            BackendError::InvalidResponse(format!("{} from {}: {}", status, url, e))
        })?;

        debug!(url = %url, status, "Backend responded");
        Ok(UpstreamResponse { status, body })
    }
}

#[async_trait]
impl AnalystBackend for HttpBackend {
    async fn start_session(&self) -> Result<Session, BackendError> {
        self.post_json(self.routes.start_session, None)
            .await?
            .into_typed()
    }

    async fn text_query(&self, session_id: &str, text: &str) -> Result<QueryReply, BackendError> {
        let body = serde_json::to_value(TextQueryRequest {
            text: text.to_string(),
            session_id: session_id.to_string(),
        })
        .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        self.post_json(self.routes.text_query, Some(&body))
            .await?
            .into_typed()
    }

    async fn audio_query(
        &self,
        session_id: &str,
        audio: &AudioBlob,
    ) -> Result<AudioQueryReply, BackendError> {
        let form = audio_form(session_id, audio)?;
        self.post_multipart(self.routes.audio_query, form)
            .await?
            .into_typed()
    }

    async fn conversation_history(
        &self,
        session_id: &str,
    ) -> Result<ConversationHistory, BackendError> {
        self.get_session(self.routes.conversation_history, session_id)
            .await?
            .into_typed()
    }

    async fn clear_conversation(&self, session_id: &str) -> Result<(), BackendError> {
        let response = self
            .delete_session(self.routes.clear_conversation, session_id)
            .await?;
        response.into_typed::<Value>().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Multipart, Path};
    use axum::http::StatusCode;
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use serde_json::json;

    /// Serve a minimal stand-in for the analytics backend on an ephemeral port.
    async fn spawn_fake_backend() -> String {
        let app = Router::new()
            .route(
                "/start-session",
                post(|| async { Json(json!({"session_id": "sess-1"})) }),
            )
            .route(
                "/query",
                post(|Json(body): Json<Value>| async move {
                    let text = body["text"].as_str().unwrap_or_default().to_string();
                    if text.trim().is_empty() {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"error": "Empty input provided"})),
                        );
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "reply": format!("echo: {} ({})", text, body["session_id"].as_str().unwrap_or("")),
                            "lang_code": "en-US",
                            "recommendations": ["Show weekly trend", "Top items"]
                        })),
                    )
                }),
            )
            .route(
                "/audio-query",
                post(|mut multipart: Multipart| async move {
                    let mut audio_len = 0usize;
                    let mut file_name = String::new();
                    let mut session = String::new();
                    while let Some(field) = multipart.next_field().await.unwrap() {
                        match field.name().unwrap_or_default() {
                            "audio" => {
                                file_name = field.file_name().unwrap_or_default().to_string();
                                audio_len = field.bytes().await.unwrap().len();
                            }
                            "session_id" => session = field.text().await.unwrap(),
                            _ => {}
                        }
                    }
                    Json(json!({
                        "transcript": format!("{} bytes in {} for {}", audio_len, file_name, session),
                        "reply": "Heard you.",
                        "audio": "AP8Q",
                        "audio_format": "mp3",
                        "recommendations": []
                    }))
                }),
            )
            .route(
                "/conversation-history/{id}",
                get(|Path(id): Path<String>| async move {
                    Json(json!({"history": [{"user": "hi", "bot": format!("hello {}", id), "language": "en", "timestamp": "2026-10-17T10:00:00"}]}))
                }),
            )
            .route(
                "/clear-conversation/{id}",
                delete(|Path(id): Path<String>| async move {
                    if id == "sess-1" {
                        (StatusCode::OK, Json(json!({"message": "Conversation cleared"})))
                    } else {
                        (StatusCode::NOT_FOUND, Json(json!({"error": "Session not found"})))
                    }
                }),
            )
            .route("/not-json", post(|| async { "plain text" }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// An address nothing is listening on.
    async fn dead_address() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    fn client(base_url: &str) -> HttpBackend {
        HttpBackend::new(base_url, RouteTable::BACKEND, Some(Duration::from_secs(5))).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let backend = client("http://127.0.0.1:5000/");
        assert_eq!(backend.base_url(), "http://127.0.0.1:5000");
        assert_eq!(backend.url("/query"), "http://127.0.0.1:5000/query");
    }

    #[test]
    fn test_session_url_is_one_encoded_segment() {
        let backend = client("http://127.0.0.1:5000");
        let url = backend
            .session_url("/conversation-history", "sess 1")
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:5000/conversation-history/sess%201");

        let err = backend
            .session_url("/conversation-history", "../health")
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidSessionId(_)));
    }

    #[test]
    fn test_from_config_uses_backend_routes() {
        let backend = HttpBackend::from_config(&BackendConfig::default()).unwrap();
        assert_eq!(backend.base_url(), "http://127.0.0.1:5000");
        assert_eq!(*backend.routes(), RouteTable::BACKEND);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(&json!({"error": "boom"})), "boom");
        assert_eq!(error_message(&json!({"reply": "Error getting response"})), "Error getting response");
        assert_eq!(error_message(&json!([1, 2])), "[1,2]");
    }

    #[tokio::test]
    async fn test_start_session() {
        let backend = client(&spawn_fake_backend().await);
        let session = backend.start_session().await.unwrap();
        assert_eq!(session.session_id, "sess-1");
    }

    #[tokio::test]
    async fn test_text_query_round_trip() {
        let backend = client(&spawn_fake_backend().await);
        let reply = backend.text_query("sess-1", "sales today?").await.unwrap();
        assert_eq!(reply.reply, "echo: sales today? (sess-1)");
        assert_eq!(reply.lang_code.as_deref(), Some("en-US"));
        assert_eq!(reply.recommendations, vec!["Show weekly trend", "Top items"]);
    }

    #[tokio::test]
    async fn test_text_query_error_status() {
        let backend = client(&spawn_fake_backend().await);
        let err = backend.text_query("sess-1", "   ").await.unwrap_err();
        match err {
            BackendError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Empty input provided");
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_audio_query_sends_multipart() {
        let backend = client(&spawn_fake_backend().await);
        let blob = AudioBlob::new(vec![1, 2, 3, 4], "audio/webm");
        let reply = backend.audio_query("sess-1", &blob).await.unwrap();
        assert_eq!(reply.transcript, "4 bytes in audio.webm for sess-1");
        assert_eq!(reply.reply.audio_payload(), Some(("AP8Q", "mp3")));
    }

    #[tokio::test]
    async fn test_conversation_history() {
        let backend = client(&spawn_fake_backend().await);
        let history = backend.conversation_history("sess-1").await.unwrap();
        assert_eq!(history.history.len(), 1);
        assert_eq!(history.history[0].bot, "hello sess-1");
    }

    #[tokio::test]
    async fn test_clear_conversation() {
        let backend = client(&spawn_fake_backend().await);
        backend.clear_conversation("sess-1").await.unwrap();

        let err = backend.clear_conversation("unknown").await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_dot_segment_session_id_never_leaves_client() {
        let backend = client(&dead_address().await);
        let err = backend.conversation_history("..").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidSessionId(ref id) if id == ".."));

        let err = backend.clear_conversation("x/../../health").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidSessionId(_)));
    }

    #[tokio::test]
    async fn test_non_json_response_is_rejected() {
        let backend = client(&spawn_fake_backend().await);
        let err = backend.post_json("/not-json", None).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let backend = client(&dead_address().await);
        let err = backend.start_session().await.unwrap_err();
        assert!(err.is_unreachable(), "unexpected error: {:?}", err);
    }
}
