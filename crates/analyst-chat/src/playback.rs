//! Single-slot response-audio player.
//!
//! Only one clip plays at a time:
//! - Idle -> Playing (a clip was handed to the sink)
//! - Playing -> Idle (the sink finished, failed, or was stopped)
//!
//! A play request while a clip is still running is rejected with
//! `ChatError::PlaybackBusy`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use analyst_core::types::AudioBlob;

use crate::error::ChatError;

/// Output device for decoded response audio.
pub trait AudioSink: Send {
    /// Begin playing `audio`. Returns once playback has started.
    fn start(&mut self, audio: &AudioBlob) -> Result<(), ChatError>;

    /// Whether the most recently started clip is still playing.
    fn is_active(&self) -> bool;

    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    Idle,
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Playing => write!(f, "Playing"),
        }
    }
}

impl PlaybackState {
    pub fn can_transition_to(&self, target: &PlaybackState) -> bool {
        matches!(
            (self, target),
            (PlaybackState::Idle, PlaybackState::Playing)
                | (PlaybackState::Playing, PlaybackState::Idle)
        )
    }
}

pub struct Player {
    sink: Box<dyn AudioSink>,
    state: PlaybackState,
}

impl Player {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            sink,
            state: PlaybackState::Idle,
        }
    }

    /// Current state, treating a finished sink as idle.
    pub fn state(&self) -> PlaybackState {
        if self.state == PlaybackState::Playing && !self.sink.is_active() {
            PlaybackState::Idle
        } else {
            self.state
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Start `audio` if the slot is free.
    pub fn play(&mut self, audio: &AudioBlob) -> Result<(), ChatError> {
        self.state = self.state();
        if !self.state.can_transition_to(&PlaybackState::Playing) {
            return Err(ChatError::PlaybackBusy);
        }

        if let Err(e) = self.sink.start(audio) {
            warn!(error = %e, "Error playing audio");
            return Err(e);
        }

        debug!(
            "Playback state: {} -> {} ({} bytes, {})",
            self.state,
            PlaybackState::Playing,
            audio.len(),
            audio.mime_type
        );
        self.state = PlaybackState::Playing;
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.state == PlaybackState::Playing {
            self.sink.stop();
            debug!("Playback state: Playing -> Idle (stopped)");
        }
        self.state = PlaybackState::Idle;
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Sink that records what it was asked to play.
///
/// Clones share state, so a test can keep one clone and hand the other to a
/// `Player`. A started clip stays active until `finish` is called.
#[derive(Clone, Default)]
pub struct MockSink {
    played: Arc<Mutex<Vec<AudioBlob>>>,
    active: Arc<AtomicBool>,
    failing: Arc<AtomicBool>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `start` fail.
    pub fn fail_playback(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Simulate the current clip reaching its end.
    pub fn finish(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn played(&self) -> Vec<AudioBlob> {
        self.played
            .lock()
            .map(|played| played.clone())
            .unwrap_or_default()
    }
}

impl AudioSink for MockSink {
    fn start(&mut self, audio: &AudioBlob) -> Result<(), ChatError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChatError::Audio("output device unavailable".to_string()));
        }
        if let Ok(mut played) = self.played.lock() {
            played.push(audio.clone());
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}
