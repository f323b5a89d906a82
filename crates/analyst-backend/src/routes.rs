//! Route tables for the two HTTP surfaces a client can target.

/// Paths of the conversation endpoints on one HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTable {
    pub start_session: &'static str,
    pub text_query: &'static str,
    pub audio_query: &'static str,
    /// Prefix; the session id is appended as a path segment.
    pub conversation_history: &'static str,
    /// Prefix; the session id is appended as a path segment.
    pub clear_conversation: &'static str,
    pub health: &'static str,
}

impl RouteTable {
    /// Routes served by the analytics backend itself.
    pub const BACKEND: RouteTable = RouteTable {
        start_session: "/start-session",
        text_query: "/query",
        audio_query: "/audio-query",
        conversation_history: "/conversation-history",
        clear_conversation: "/clear-conversation",
        health: "/health",
    };

    /// Same-origin routes served by the proxy server.
    pub const PROXY: RouteTable = RouteTable {
        start_session: "/api/start-session",
        text_query: "/api/text-query",
        audio_query: "/api/audio-query",
        conversation_history: "/api/conversation-history",
        clear_conversation: "/api/clear-conversation",
        health: "/api/backend-health",
    };

}

/// Whether `session_id` can stand as exactly one path segment.
///
/// Dot segments and characters that end or escape a segment are refused, so
/// an id can never address a different upstream route.
pub fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id != "."
        && session_id != ".."
        && !session_id
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_control())
}
