//! Client-side chat for the merchant analyst.
//!
//! Holds the conversation state a vendor sees, drives text and voice queries
//! through an `AnalystBackend`, and plays synthesized reply audio.

pub mod audio;
pub mod controller;
pub mod error;
pub mod playback;
pub mod session;

pub use audio::{base64_to_blob, CaptureStream, Microphone, MockMicrophone, Recorder};
pub use controller::{ChatController, RecordingToggle, Submission};
pub use error::ChatError;
pub use playback::{AudioSink, MockSink, PlaybackState, Player};
pub use session::SessionContext;
