//! Speech platform traits
//!
//! These model the primitives a platform gives us (a browser's speech
//! synthesis and recognition objects, a desktop TTS engine, a terminal). The
//! agent crate wraps them in a `SpeechAdapter` with the cancel-previous and
//! error-flag semantics the voice loop relies on.

use async_trait::async_trait;
use thiserror::Error;

/// Synthesis failure reported by the platform
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("synthesis failed: {0}")]
pub struct SynthesisError(pub String);

/// Recognition failure reported by the platform
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// No speech was detected before the platform gave up
    #[error("no-speech")]
    NoSpeech,
    /// Recognition was intentionally stopped
    #[error("aborted")]
    Aborted,
    /// Microphone could not be opened
    #[error("audio-capture")]
    AudioCapture,
    /// Recognition could not be started at all
    #[error("start failed: {0}")]
    StartFailed(String),
    /// Any other platform error tag
    #[error("{0}")]
    Other(String),
}

/// Text-to-speech primitive
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Play `text`, returning once playback has finished
    async fn synthesize(&self, text: &str) -> Result<(), SynthesisError>;

    /// Stop any utterance currently playing
    fn cancel(&self);
}

/// Speech-to-text primitive, one utterance per call
#[async_trait]
pub trait SpeechRecognizer: Send + Sync + 'static {
    /// Capture one utterance.
    ///
    /// `Ok(None)` means the pass ended without any result.
    async fn recognize(&self) -> Result<Option<String>, RecognitionError>;

    /// Finish the current pass gracefully
    fn stop(&self);

    /// Cancel the current pass; a pending `recognize` fails with `Aborted`
    fn abort(&self);
}
