use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Chat messages
// =============================================================================

/// Who authored a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Typed or spoken by the vendor.
    User,
    /// Produced by the analytics backend (or by the client on failure).
    Ai,
}

/// A single entry in the chat history.
///
/// Messages are immutable once appended to a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    /// The reply came with synthesized speech.
    #[serde(default)]
    pub has_audio: bool,
    /// The user message was spoken rather than typed.
    #[serde(default)]
    pub is_audio: bool,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub is_processing: bool,
}

impl Message {
    fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            content: content.into(),
            timestamp: Utc::now(),
            original_language: None,
            has_audio: false,
            is_audio: false,
            is_error: false,
            is_processing: false,
        }
    }

    /// A message authored by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageKind::User, content)
    }

    /// A message authored by the assistant.
    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Ai, content)
    }

    /// An assistant message reporting a failed request.
    pub fn error(content: impl Into<String>) -> Self {
        let mut msg = Self::new(MessageKind::Ai, content);
        msg.is_error = true;
        msg
    }

    /// Mark a user message as transcribed from a voice recording.
    pub fn spoken(mut self) -> Self {
        self.is_audio = true;
        self
    }

    pub fn with_audio(mut self, has_audio: bool) -> Self {
        self.has_audio = has_audio;
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.original_language = language;
        self
    }

    pub fn is_user(&self) -> bool {
        self.kind == MessageKind::User
    }
}

// =============================================================================
// Backend wire types
// =============================================================================

/// Response of `POST /start-session`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
}

/// Body of `POST /query`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextQueryRequest {
    pub text: String,
    pub session_id: String,
}

/// The backend's answer to a text or audio query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryReply {
    #[serde(default)]
    pub reply: String,
    /// Base64-encoded synthesized speech.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// Subtype of the audio payload, e.g. `mp3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_format: Option<String>,
    /// BCP-47 tag of the detected language, e.g. `hi-IN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl QueryReply {
    /// The audio payload and its subtype, when both are present and non-empty.
    pub fn audio_payload(&self) -> Option<(&str, &str)> {
        match (self.audio.as_deref(), self.audio_format.as_deref()) {
            (Some(audio), Some(format)) if !audio.is_empty() && !format.is_empty() => {
                Some((audio, format))
            }
            _ => None,
        }
    }

    pub fn has_audio(&self) -> bool {
        self.audio.as_deref().is_some_and(|a| !a.is_empty())
    }
}

/// The backend's answer to an audio query: the transcript plus a reply.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioQueryReply {
    #[serde(default)]
    pub transcript: String,
    #[serde(flatten)]
    pub reply: QueryReply,
}

/// One exchange stored by the backend for a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user: String,
    pub bot: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Response of `GET /conversation-history/{session_id}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

// =============================================================================
// Audio
// =============================================================================

/// A binary audio payload with its MIME type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl AudioBlob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension derived from the MIME subtype, e.g. `webm` for
    /// `audio/webm;codecs=opus`.
    pub fn extension(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .and_then(|t| t.split('/').nth(1))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("bin")
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Month-to-date order statistics.
///
/// Averages and ratios are `None` when there are no orders in the period.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_orders: u64,
    pub total_revenue: Option<f64>,
    pub avg_order_price: Option<f64>,
    pub avg_delivery_time: Option<f64>,
    pub avg_user_rating: Option<f64>,
    pub refunded_orders: u64,
    pub unique_users: u64,
    pub veg_order_ratio: Option<f64>,
    pub offer_usage_ratio: Option<f64>,
    /// Start of the aggregation window.
    pub period_start: DateTime<Utc>,
}

/// Divide `count` by `total`, or `None` when there is nothing to divide by.
pub fn ratio(count: u64, total: u64) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(count as f64 / total as f64)
    }
}
