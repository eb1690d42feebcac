//! Speech I/O adapter
//!
//! Wraps the platform synthesizer and recognizer behind `speak` / `listen`
//! and keeps the small state snapshot a front end renders: whether we are
//! speaking or listening, the last transcript and the last error string.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

use loominary_core::{RecognitionError, SpeechRecognizer, SpeechSynthesizer};

pub const SYNTHESIS_UNSUPPORTED: &str = "Speech Synthesis not supported";
pub const SYNTHESIS_FAILED: &str = "Speech Synthesis failed";
pub const RECOGNITION_UNSUPPORTED: &str = "Speech Recognition not supported";
pub const AUDIO_CAPTURE_FAILED: &str = "Microphone capture failed. Please ensure your microphone is connected and you have granted permission.";

/// Why a listen pass failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenError {
    /// Recognition was intentionally cancelled
    #[error("aborted")]
    Aborted,

    #[error("{}", AUDIO_CAPTURE_FAILED)]
    AudioCapture,

    #[error("{}", RECOGNITION_UNSUPPORTED)]
    NotSupported,

    #[error("Speech recognition error: {0}")]
    Other(String),
}

impl ListenError {
    /// Aborts are expected when a session is ended
    pub fn is_benign(&self) -> bool {
        matches!(self, ListenError::Aborted)
    }
}

/// Observable speech state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceState {
    pub is_listening: bool,
    pub is_speaking: bool,
    pub transcript: String,
    pub error: Option<String>,
}

/// Speech adapter over optional platform primitives
pub struct SpeechAdapter {
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    state_tx: watch::Sender<VoiceState>,
    /// Held for the duration of a recognition pass
    listen_lock: Mutex<()>,
}

impl SpeechAdapter {
    pub fn new(
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
    ) -> Self {
        let (state_tx, _) = watch::channel(VoiceState::default());
        Self {
            synthesizer,
            recognizer,
            state_tx,
            listen_lock: Mutex::new(()),
        }
    }

    /// Current snapshot
    pub fn state(&self) -> VoiceState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<VoiceState> {
        self.state_tx.subscribe()
    }

    /// Speak `text`, cancelling whatever is playing.
    ///
    /// Always completes; failures only show up in the error string.
    pub async fn speak(&self, text: &str) {
        let Some(synthesizer) = &self.synthesizer else {
            self.state_tx
                .send_modify(|s| s.error = Some(SYNTHESIS_UNSUPPORTED.to_string()));
            return;
        };

        synthesizer.cancel();
        self.state_tx.send_modify(|s| s.is_speaking = true);

        match synthesizer.synthesize(text).await {
            Ok(()) => self.state_tx.send_modify(|s| s.is_speaking = false),
            Err(e) => {
                tracing::error!(error = %e, "Speech synthesis failed");
                self.state_tx.send_modify(|s| {
                    s.is_speaking = false;
                    s.error = Some(SYNTHESIS_FAILED.to_string());
                });
            },
        }
    }

    /// Capture one utterance.
    ///
    /// An empty string means nothing usable was heard.
    pub async fn listen(&self) -> Result<String, ListenError> {
        let Some(recognizer) = &self.recognizer else {
            self.state_tx
                .send_modify(|s| s.error = Some(RECOGNITION_UNSUPPORTED.to_string()));
            return Err(ListenError::NotSupported);
        };

        // Reset any pass still running before starting ours
        recognizer.stop();
        let _pass = self.listen_lock.lock().await;

        self.state_tx.send_modify(|s| {
            s.is_listening = true;
            s.transcript.clear();
            s.error = None;
        });

        let outcome = recognizer.recognize().await;

        match outcome {
            Ok(Some(transcript)) => {
                self.state_tx.send_modify(|s| {
                    s.is_listening = false;
                    s.transcript = transcript.clone();
                });
                Ok(transcript)
            },
            Ok(None) | Err(RecognitionError::NoSpeech) => {
                self.state_tx.send_modify(|s| s.is_listening = false);
                Ok(String::new())
            },
            Err(RecognitionError::StartFailed(reason)) => {
                tracing::warn!(%reason, "Recognition start attempt failed");
                self.state_tx.send_modify(|s| s.is_listening = false);
                Ok(String::new())
            },
            Err(RecognitionError::Aborted) => {
                self.state_tx.send_modify(|s| s.is_listening = false);
                Err(ListenError::Aborted)
            },
            Err(RecognitionError::AudioCapture) => {
                let err = ListenError::AudioCapture;
                self.fail_listening(&err);
                Err(err)
            },
            Err(RecognitionError::Other(tag)) => {
                tracing::error!(%tag, "Speech recognition error");
                let err = ListenError::Other(tag);
                self.fail_listening(&err);
                Err(err)
            },
        }
    }

    fn fail_listening(&self, err: &ListenError) {
        self.state_tx.send_modify(|s| {
            s.is_listening = false;
            s.error = Some(err.to_string());
        });
    }

    /// Stop both directions gracefully
    pub fn stop(&self) {
        if let Some(recognizer) = &self.recognizer {
            recognizer.stop();
        }
        self.silence();
    }

    /// Stop both directions; a pending `listen` fails with `Aborted`
    pub fn abort(&self) {
        if let Some(recognizer) = &self.recognizer {
            recognizer.abort();
        }
        self.silence();
    }

    fn silence(&self) {
        if let Some(synthesizer) = &self.synthesizer {
            synthesizer.cancel();
        }
        self.state_tx.send_modify(|s| {
            s.is_listening = false;
            s.is_speaking = false;
        });
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn adapter(script: Vec<Scripted>) -> (SpeechAdapter, Arc<RecordingSynth>) {
        let synth = Arc::new(RecordingSynth::default());
        let adapter = SpeechAdapter::new(
            Some(synth.clone()),
            Some(Arc::new(ScriptedRecognizer::new(script))),
        );
        (adapter, synth)
    }

    #[tokio::test]
    async fn test_speak_cancels_previous_utterance() {
        let (adapter, synth) = adapter(vec![]);
        adapter.speak("first").await;
        adapter.speak("second").await;

        assert_eq!(*synth.spoken.lock(), vec!["first", "second"]);
        assert_eq!(*synth.cancels.lock(), 2);
        assert!(!adapter.state().is_speaking);
        assert!(adapter.state().error.is_none());
    }

    #[tokio::test]
    async fn test_speak_failure_sets_error() {
        let synth = Arc::new(RecordingSynth {
            fail: true,
            ..Default::default()
        });
        let adapter = SpeechAdapter::new(Some(synth), None);
        adapter.speak("hello").await;
        assert_eq!(adapter.state().error.as_deref(), Some(SYNTHESIS_FAILED));

        let adapter = SpeechAdapter::new(None, None);
        adapter.speak("hello").await;
        assert_eq!(adapter.state().error.as_deref(), Some(SYNTHESIS_UNSUPPORTED));
    }

    #[tokio::test]
    async fn test_listen_outcomes() {
        let (adapter, _) = adapter(vec![
            Ok(Some("photosynthesis".to_string())),
            Err(RecognitionError::NoSpeech),
            Ok(None),
            Err(RecognitionError::StartFailed("busy".to_string())),
            Err(RecognitionError::Aborted),
            Err(RecognitionError::AudioCapture),
            Err(RecognitionError::Other("network".to_string())),
        ]);

        assert_eq!(adapter.listen().await.unwrap(), "photosynthesis");
        assert_eq!(adapter.state().transcript, "photosynthesis");

        assert_eq!(adapter.listen().await.unwrap(), "");
        assert_eq!(adapter.listen().await.unwrap(), "");
        assert_eq!(adapter.listen().await.unwrap(), "");

        assert_eq!(adapter.listen().await.unwrap_err(), ListenError::Aborted);
        assert!(adapter.state().error.is_none());

        assert_eq!(adapter.listen().await.unwrap_err(), ListenError::AudioCapture);
        assert_eq!(adapter.state().error.as_deref(), Some(AUDIO_CAPTURE_FAILED));

        let err = adapter.listen().await.unwrap_err();
        assert_eq!(err.to_string(), "Speech recognition error: network");
        assert!(!adapter.state().is_listening);
    }

    #[tokio::test]
    async fn test_listen_without_recognizer() {
        let adapter = SpeechAdapter::new(None, None);
        assert_eq!(adapter.listen().await.unwrap_err(), ListenError::NotSupported);
        assert_eq!(adapter.state().error.as_deref(), Some(RECOGNITION_UNSUPPORTED));
    }

    #[tokio::test]
    async fn test_abort_fails_pending_listen() {
        let (adapter, _) = adapter(vec![]);
        let adapter = Arc::new(adapter);

        let pending = {
            let adapter = adapter.clone();
            tokio::spawn(async move { adapter.listen().await })
        };

        // Wait until the pass is running
        let mut rx = adapter.subscribe();
        rx.wait_for(|s| s.is_listening).await.unwrap();

        adapter.abort();
        assert_eq!(pending.await.unwrap().unwrap_err(), ListenError::Aborted);
        assert!(!adapter.state().is_listening);
    }
}
