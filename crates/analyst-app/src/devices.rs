//! File-backed audio devices for the terminal chat.
//!
//! A terminal has no microphone or speaker, so recordings are read from a
//! file and reply audio is written to the data directory.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use analyst_chat::{AudioSink, CaptureStream, ChatError, Microphone};
use analyst_core::types::AudioBlob;

const CHUNK_SIZE: usize = 16 * 1024;

/// Microphone that "records" the contents of an audio file.
pub struct FileMicrophone {
    path: Option<PathBuf>,
}

impl FileMicrophone {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl Microphone for FileMicrophone {
    fn open(&mut self) -> Result<Box<dyn CaptureStream>, ChatError> {
        let path = self.path.as_ref().ok_or_else(|| {
            ChatError::MicrophoneUnavailable("no recording file configured (--recording)".to_string())
        })?;
        let data = std::fs::read(path)
            .map_err(|e| ChatError::MicrophoneUnavailable(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), bytes = data.len(), "Recording file opened");
        Ok(Box::new(FileStream {
            chunks: data.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect(),
        }))
    }
}

struct FileStream {
    chunks: VecDeque<Vec<u8>>,
}

impl CaptureStream for FileStream {
    fn next_chunk(&mut self) -> Option<Vec<u8>> {
        self.chunks.pop_front()
    }

    fn release(&mut self) {
        self.chunks.clear();
    }
}

/// Sink that saves each clip as `reply-<n>.<ext>` in a directory.
///
/// Writing completes synchronously, so a clip is never reported as active.
pub struct FileSink {
    dir: PathBuf,
    written: usize,
}

impl FileSink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            written: 0,
        }
    }
}

impl AudioSink for FileSink {
    fn start(&mut self, audio: &AudioBlob) -> Result<(), ChatError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| ChatError::Audio(format!("{}: {}", self.dir.display(), e)))?;
        self.written += 1;
        let path = self
            .dir
            .join(format!("reply-{}.{}", self.written, audio.extension()));
        std::fs::write(&path, &audio.bytes)
            .map_err(|e| ChatError::Audio(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), bytes = audio.len(), "Reply audio saved");
        Ok(())
    }

    fn is_active(&self) -> bool {
        false
    }

    fn stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyst_chat::Recorder;

    #[test]
    fn test_file_microphone_records_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("question.webm");
        let data: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let mut recorder = Recorder::new(Box::new(FileMicrophone::new(Some(path))));
        recorder.start().unwrap();
        let blob = recorder.stop().unwrap();
        assert_eq!(blob.bytes, data);
        assert_eq!(blob.mime_type, "audio/webm");
    }

    #[test]
    fn test_file_microphone_unavailable() {
        let mut mic = FileMicrophone::new(None);
        assert!(matches!(mic.open(), Err(ChatError::MicrophoneUnavailable(_))));

        let mut mic = FileMicrophone::new(Some(PathBuf::from("/nonexistent/rec.webm")));
        assert!(matches!(mic.open(), Err(ChatError::MicrophoneUnavailable(_))));
    }

    #[test]
    fn test_file_sink_writes_numbered_clips() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("replies"));

        sink.start(&AudioBlob::new(vec![0, 255, 16], "audio/mp3"))
            .unwrap();
        sink.start(&AudioBlob::new(vec![1], "audio/wav")).unwrap();
        assert!(!sink.is_active());

        let first = std::fs::read(dir.path().join("replies/reply-1.mp3")).unwrap();
        assert_eq!(first, vec![0, 255, 16]);
        assert!(dir.path().join("replies/reply-2.wav").exists());
    }
}
