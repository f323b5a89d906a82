//! Chat controller: message history, input, recording and playback state.
//!
//! Each submission moves the controller `Idle -> Processing -> Idle`. The
//! processing flag is cleared on every path, and a failed request leaves an
//! error message in the history in addition to the returned `ChatError`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use analyst_backend::AnalystBackend;
use analyst_core::config::ChatConfig;
use analyst_core::types::{AudioBlob, ConversationHistory, Message, QueryReply};

use crate::audio::{reply_audio, Recorder};
use crate::error::ChatError;
use crate::playback::Player;
use crate::session::SessionContext;

/// Outcome of a submission that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The request reached the backend and its reply was recorded.
    Sent,
    /// Nothing to send (blank input or no active session); state untouched.
    Ignored,
}

/// Holds the processing flag raised until dropped, including when the
/// request future is cancelled mid-flight.
struct ProcessingGuard<'a>(&'a mut bool);

impl<'a> ProcessingGuard<'a> {
    fn raise(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// Outcome of `ChatController::toggle_recording`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingToggle {
    Started,
    Stopped(Submission),
}

pub struct ChatController {
    backend: Arc<dyn AnalystBackend>,
    session: Option<SessionContext>,
    messages: Vec<Message>,
    input: String,
    processing: bool,
    recommendations: Vec<String>,
    recorder: Recorder,
    player: Player,
    last_audio: Option<AudioBlob>,
    max_message_length: usize,
}

impl ChatController {
    /// Create a controller whose history starts with the welcome message.
    pub fn new(
        backend: Arc<dyn AnalystBackend>,
        recorder: Recorder,
        player: Player,
        config: &ChatConfig,
    ) -> Self {
        Self {
            backend,
            session: None,
            messages: vec![Message::ai(config.welcome_message.clone())],
            input: String::new(),
            processing: false,
            recommendations: Vec::new(),
            recorder,
            player,
            last_audio: None,
            max_message_length: config.max_message_length,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    pub fn last_audio(&self) -> Option<&AudioBlob> {
        self.last_audio.as_ref()
    }

    fn active_session_id(&self) -> Option<String> {
        self.session
            .as_ref()
            .filter(|s| s.is_active())
            .map(|s| s.id().to_string())
    }

    // -------------------------------------------------------------------------
    // Session lifecycle
    // -------------------------------------------------------------------------

    /// Obtain a session from the backend. An already active session is kept.
    pub async fn start_session(&mut self) -> Result<SessionContext, ChatError> {
        if let Some(session) = self.session.as_ref().filter(|s| s.is_active()) {
            return Ok(session.clone());
        }

        match self.backend.start_session().await {
            Ok(session) => {
                info!(session_id = %session.session_id, "Session started");
                let context = SessionContext::new(session.session_id);
                self.session = Some(context.clone());
                Ok(context)
            }
            Err(e) => {
                self.session = None;
                Err(self.record_failure("start session", e.into()))
            }
        }
    }

    /// Invalidate the session and ask the backend to drop its context.
    ///
    /// The session is invalidated even if the backend call fails.
    pub async fn end_session(&mut self) -> Result<(), ChatError> {
        let session_id = self.active_session_id().ok_or(ChatError::NoSession)?;
        if let Some(session) = self.session.as_mut() {
            session.invalidate();
        }
        self.recommendations.clear();
        info!(session_id = %session_id, "Session ended");

        if let Err(e) = self.backend.clear_conversation(&session_id).await {
            warn!(session_id = %session_id, error = %e, "Failed to clear backend conversation");
        }
        Ok(())
    }

    /// Exchanges the backend holds for the active session.
    pub async fn conversation_history(&self) -> Result<ConversationHistory, ChatError> {
        let session_id = self.active_session_id().ok_or(ChatError::NoSession)?;
        Ok(self.backend.conversation_history(&session_id).await?)
    }

    // -------------------------------------------------------------------------
    // Text input
    // -------------------------------------------------------------------------

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Send the current input box contents.
    pub async fn submit_input(&mut self) -> Result<Submission, ChatError> {
        let text = self.input.clone();
        self.process_text(&text).await
    }

    /// Send the recommendation at `index` as if it had been typed.
    pub async fn apply_recommendation(&mut self, index: usize) -> Result<Submission, ChatError> {
        let text = self
            .recommendations
            .get(index)
            .cloned()
            .ok_or(ChatError::NoRecommendation(index))?;
        self.process_text(&text).await
    }

    pub async fn process_text(&mut self, text: &str) -> Result<Submission, ChatError> {
        if text.trim().is_empty() {
            return Ok(Submission::Ignored);
        }
        let Some(session_id) = self.active_session_id() else {
            debug!("Text query ignored: no active session");
            return Ok(Submission::Ignored);
        };
        if self.processing {
            return Err(ChatError::Busy);
        }
        if text.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong(self.max_message_length));
        }

        self.messages.push(Message::user(text));
        self.input.clear();
        let result = {
            let _busy = ProcessingGuard::raise(&mut self.processing);
            self.backend.text_query(&session_id, text).await
        };

        match result {
            Ok(reply) => {
                debug!(session_id = %session_id, "Text query answered");
                self.record_reply(reply);
                Ok(Submission::Sent)
            }
            Err(e) => Err(self.record_failure("text query", e.into())),
        }
    }

    // -------------------------------------------------------------------------
    // Voice input
    // -------------------------------------------------------------------------

    /// Upload a recording. The transcript becomes the user message.
    pub async fn send_audio(&mut self, audio: AudioBlob) -> Result<Submission, ChatError> {
        let Some(session_id) = self.active_session_id() else {
            debug!("Audio query ignored: no active session");
            return Ok(Submission::Ignored);
        };
        if audio.is_empty() {
            debug!("Audio query ignored: empty recording");
            return Ok(Submission::Ignored);
        }
        if self.processing {
            return Err(ChatError::Busy);
        }

        let result = {
            let _busy = ProcessingGuard::raise(&mut self.processing);
            self.backend.audio_query(&session_id, &audio).await
        };

        match result {
            Ok(reply) => {
                debug!(session_id = %session_id, bytes = audio.len(), "Audio query answered");
                self.messages.push(Message::user(reply.transcript).spoken());
                self.record_reply(reply.reply);
                Ok(Submission::Sent)
            }
            Err(e) => Err(self.record_failure("audio query", e.into())),
        }
    }

    /// Start recording, or stop and send what was recorded.
    pub async fn toggle_recording(&mut self) -> Result<RecordingToggle, ChatError> {
        if self.recorder.is_recording() {
            let audio = self.recorder.stop()?;
            return self.send_audio(audio).await.map(RecordingToggle::Stopped);
        }

        if self.processing {
            return Err(ChatError::Busy);
        }
        if let Err(e) = self.recorder.start() {
            warn!(error = %e, "Error accessing microphone");
            return Err(e);
        }
        Ok(RecordingToggle::Started)
    }

    // -------------------------------------------------------------------------
    // Playback
    // -------------------------------------------------------------------------

    /// Play the most recent response audio again.
    pub fn replay_last_audio(&mut self) -> Result<(), ChatError> {
        let audio = self.last_audio.as_ref().ok_or(ChatError::NoAudio)?;
        self.player.play(audio)
    }

    pub fn stop_playback(&mut self) {
        self.player.stop();
    }

    fn record_reply(&mut self, reply: QueryReply) {
        let language = reply
            .lang_code
            .clone()
            .or_else(|| reply.original_language.clone());
        self.messages.push(
            Message::ai(reply.reply.clone())
                .with_audio(reply.has_audio())
                .with_language(language),
        );
        self.recommendations = reply.recommendations.clone();

        match reply_audio(&reply) {
            None => {}
            Some(Err(e)) => warn!(error = %e, "Discarding undecodable response audio"),
            Some(Ok(audio)) => {
                if let Err(e) = self.player.play(&audio) {
                    warn!(error = %e, "Response audio not played");
                }
                self.last_audio = Some(audio);
            }
        }
    }

    fn record_failure(&mut self, operation: &'static str, err: ChatError) -> ChatError {
        warn!(operation, error = %err, "Chat request failed");
        self.messages.push(Message::error(format!(
            "Sorry, I couldn't complete that request: {}",
            err
        )));
        err
    }
}
