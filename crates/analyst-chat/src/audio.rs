//! Audio capture and response-audio decoding.
//!
//! A `Microphone` hands out a `CaptureStream`; the `Recorder` drains the
//! stream's chunks into a single `audio/webm` blob when recording stops and
//! releases the stream afterwards.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, info};

use analyst_core::types::{AudioBlob, QueryReply};

use crate::error::ChatError;

/// MIME type of recorded voice queries.
pub const RECORDING_MIME: &str = "audio/webm";

/// Decode a base64 payload into a blob of the given MIME type.
pub fn base64_to_blob(data: &str, mime_type: &str) -> Result<AudioBlob, ChatError> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| ChatError::Audio(format!("invalid base64 audio: {}", e)))?;
    Ok(AudioBlob::new(bytes, mime_type))
}

/// Decode the synthesized speech attached to a reply, if it carries both a
/// payload and a format.
pub fn reply_audio(reply: &QueryReply) -> Option<Result<AudioBlob, ChatError>> {
    reply
        .audio_payload()
        .map(|(data, format)| base64_to_blob(data, &format!("audio/{}", format)))
}

// =============================================================================
// Capture
// =============================================================================

/// An input device that can be opened for recording.
pub trait Microphone: Send {
    /// Acquire the device. Permission denial maps to
    /// `ChatError::MicrophoneUnavailable`.
    fn open(&mut self) -> Result<Box<dyn CaptureStream>, ChatError>;
}

/// A live recording from a `Microphone`.
pub trait CaptureStream: Send {
    /// Next buffered chunk of encoded audio, `None` once drained.
    fn next_chunk(&mut self) -> Option<Vec<u8>>;

    /// Release the underlying device.
    fn release(&mut self);
}

/// Accumulates microphone chunks between `start` and `stop`.
pub struct Recorder {
    microphone: Box<dyn Microphone>,
    stream: Option<Box<dyn CaptureStream>>,
    chunks: Vec<Vec<u8>>,
}

impl Recorder {
    pub fn new(microphone: Box<dyn Microphone>) -> Self {
        Self {
            microphone,
            stream: None,
            chunks: Vec::new(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.stream.is_some()
    }

    pub fn start(&mut self) -> Result<(), ChatError> {
        if self.is_recording() {
            return Err(ChatError::Audio("already recording".to_string()));
        }
        let stream = self.microphone.open()?;
        self.chunks.clear();
        self.stream = Some(stream);
        info!("Recording started");
        Ok(())
    }

    /// Move whatever the stream has buffered so far into the recording.
    pub fn poll(&mut self) -> usize {
        let Some(stream) = self.stream.as_mut() else {
            return 0;
        };
        let mut pulled = 0;
        while let Some(chunk) = stream.next_chunk() {
            self.chunks.push(chunk);
            pulled += 1;
        }
        pulled
    }

    /// Finish recording and return the captured audio as one blob.
    pub fn stop(&mut self) -> Result<AudioBlob, ChatError> {
        self.poll();
        let mut stream = self.stream.take().ok_or(ChatError::NotRecording)?;
        stream.release();

        let chunks = std::mem::take(&mut self.chunks);
        let blob = AudioBlob::new(chunks.concat(), RECORDING_MIME);
        info!(chunks = chunks.len(), bytes = blob.len(), "Recording stopped");
        Ok(blob)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Microphone that replays canned chunks, or refuses access.
pub struct MockMicrophone {
    chunks: Vec<Vec<u8>>,
    denied: bool,
    open_streams: Arc<AtomicUsize>,
}

impl MockMicrophone {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks,
            denied: false,
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A microphone whose permission prompt is always declined.
    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::new(Vec::new())
        }
    }

    /// Counter of streams opened and not yet released.
    pub fn open_streams(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.open_streams)
    }
}

impl Microphone for MockMicrophone {
    fn open(&mut self) -> Result<Box<dyn CaptureStream>, ChatError> {
        if self.denied {
            return Err(ChatError::MicrophoneUnavailable(
                "permission denied".to_string(),
            ));
        }
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            chunks: self.chunks.iter().cloned().collect(),
            open_streams: Arc::clone(&self.open_streams),
            released: false,
        }))
    }
}

struct MockStream {
    chunks: VecDeque<Vec<u8>>,
    open_streams: Arc<AtomicUsize>,
    released: bool,
}

impl CaptureStream for MockStream {
    fn next_chunk(&mut self) -> Option<Vec<u8>> {
        self.chunks.pop_front()
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
            debug!("Mock capture stream released");
        }
    }
}
