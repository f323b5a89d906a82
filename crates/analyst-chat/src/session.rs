//! Session context held by a chat client.

use chrono::{DateTime, Utc};

/// The backend conversation a client is attached to.
///
/// Created once the backend hands out a session id and invalidated when the
/// client ends the conversation. Queries are only sent while it is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    session_id: String,
    started_at: DateTime<Utc>,
    active: bool,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            started_at: Utc::now(),
            active: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_active(&self) -> bool {
        self.active && !self.session_id.is_empty()
    }

    pub fn invalidate(&mut self) {
        self.active = false;
    }
}
