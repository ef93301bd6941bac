//! Capability ports for speech synthesis and transcription.
//!
//! Both are thin, swappable boundaries: the controller never talks to an
//! audio device directly, it only issues `Command`s that the runner turns
//! into calls on these traits.

use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    /// `cancel()` was called while the utterance was playing.
    #[error("speech was interrupted")]
    Interrupted,
    #[error("speech synthesis failed: {0}")]
    Failed(String),
}

/// Failures while recording or transcribing an answer. The `Display` text
/// is shown to the candidate as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("Speech recognition is not supported in this environment.")]
    Unsupported,
    #[error("Microphone access was denied. Allow microphone access and try again.")]
    PermissionDenied,
    #[error("Speech recognition failed because of a network error.")]
    Network,
    #[error("No speech was detected. Try recording your answer again.")]
    NoSpeech,
    #[error("Speech recognition error: {0}")]
    Failed(String),
}

pub type SharedSpeechOutput = Arc<dyn SpeechOutput + Send + Sync>;
pub type SharedSpeechInput = Arc<dyn SpeechInput + Send + Sync>;

/// Renders text as audible speech.
#[async_trait]
pub trait SpeechOutput {
    /// Resolves once the utterance has been fully spoken, or with
    /// `SpeechError::Interrupted` after `cancel()`.
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;

    /// Stops whatever is currently being spoken.
    async fn cancel(&self);

    fn is_supported(&self) -> bool {
        true
    }
}

/// Records one spoken answer and yields its transcript.
#[async_trait]
pub trait SpeechInput {
    /// Records until the adapter's stopping condition and returns the
    /// transcript. At most one capture is outstanding at a time.
    async fn capture(&self) -> Result<String, CaptureError>;

    /// Aborts the in-flight capture. Whatever it would have returned is
    /// discarded.
    async fn stop(&self);

    fn is_supported(&self) -> bool {
        true
    }
}
