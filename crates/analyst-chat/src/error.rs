//! Error types for the chat controller.

use analyst_backend::BackendError;
use analyst_core::error::AnalystError;

/// Errors from the chat controller and its audio devices.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("a request is already being processed")]
    Busy,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("no active session")]
    NoSession,
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("microphone unavailable: {0}")]
    MicrophoneUnavailable(String),
    #[error("recording is not in progress")]
    NotRecording,
    #[error("audio error: {0}")]
    Audio(String),
    #[error("audio is already playing")]
    PlaybackBusy,
    #[error("no response audio to replay")]
    NoAudio,
    #[error("no recommendation at index {0}")]
    NoRecommendation(usize),
}

impl From<ChatError> for AnalystError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Backend(e) => e.into(),
            ChatError::MicrophoneUnavailable(_)
            | ChatError::Audio(_)
            | ChatError::PlaybackBusy
            | ChatError::NoAudio => AnalystError::Audio(err.to_string()),
            other => AnalystError::Api(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(
            ChatError::Busy.to_string(),
            "a request is already being processed"
        );
        assert_eq!(
            ChatError::MessageTooLong(2000).to_string(),
            "message exceeds maximum length of 2000 characters"
        );
        assert_eq!(
            ChatError::MicrophoneUnavailable("permission denied".to_string()).to_string(),
            "microphone unavailable: permission denied"
        );
        assert_eq!(
            ChatError::NoRecommendation(4).to_string(),
            "no recommendation at index 4"
        );
    }

    #[test]
    fn test_chat_error_from_backend_error() {
        let err: ChatError = BackendError::InvalidResponse("not json".to_string()).into();
        assert!(matches!(err, ChatError::Backend(_)));
        assert!(err.to_string().contains("not json"));
    }

    #[test]
    fn test_into_analyst_error() {
        let err: AnalystError = ChatError::PlaybackBusy.into();
        assert!(matches!(err, AnalystError::Audio(_)));

        let err: AnalystError =
            ChatError::Backend(BackendError::InvalidResponse("x".to_string())).into();
        assert!(matches!(err, AnalystError::Backend(_)));

        let err: AnalystError = ChatError::Busy.into();
        assert!(matches!(err, AnalystError::Api(_)));
    }
}
