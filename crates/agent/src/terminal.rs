//! Terminal speech primitives
//!
//! Prompts are printed and answers are typed, one line per utterance. A line
//! that does not arrive within the silence timeout counts as no speech.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex, Notify};

use loominary_core::{RecognitionError, SpeechRecognizer, SpeechSynthesizer, SynthesisError};

const SPEAKER_PREFIX: &str = "Tutor: ";
const LISTEN_PROMPT: &str = "> ";

/// Stdin/stdout stand-in for a voice device
pub struct TerminalSpeech {
    lines: Mutex<mpsc::Receiver<String>>,
    output: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    silence_timeout: Duration,
    stopped: Notify,
    aborted: Notify,
}

impl TerminalSpeech {
    /// Read from stdin and write to stdout
    pub fn stdio(silence_timeout: Duration) -> Self {
        Self::new(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            silence_timeout,
        )
    }

    /// Must be called inside a tokio runtime; input is read by a background
    /// task so a pending line survives an aborted pass.
    pub fn new<R, W>(input: R, output: W, silence_timeout: Duration) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut lines = input.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read terminal input");
                        break;
                    },
                }
            }
        });

        Self {
            lines: Mutex::new(rx),
            output: Mutex::new(Box::new(output)),
            silence_timeout,
            stopped: Notify::new(),
            aborted: Notify::new(),
        }
    }

    async fn write(&self, text: &str) -> std::io::Result<()> {
        let mut output = self.output.lock().await;
        output.write_all(text.as_bytes()).await?;
        output.flush().await
    }
}

#[async_trait]
impl SpeechSynthesizer for TerminalSpeech {
    async fn synthesize(&self, text: &str) -> Result<(), SynthesisError> {
        self.write(&format!("{}{}\n", SPEAKER_PREFIX, text))
            .await
            .map_err(|e| SynthesisError(e.to_string()))
    }

    /// Printed text cannot be taken back
    fn cancel(&self) {}
}

#[async_trait]
impl SpeechRecognizer for TerminalSpeech {
    async fn recognize(&self) -> Result<Option<String>, RecognitionError> {
        let mut lines = self.lines.lock().await;
        if let Err(e) = self.write(LISTEN_PROMPT).await {
            return Err(RecognitionError::StartFailed(e.to_string()));
        }

        tokio::select! {
            _ = self.aborted.notified() => Err(RecognitionError::Aborted),
            _ = self.stopped.notified() => Ok(None),
            line = tokio::time::timeout(self.silence_timeout, lines.recv()) => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        Err(RecognitionError::NoSpeech)
                    } else {
                        Ok(Some(line.to_string()))
                    }
                },
                Ok(None) => Err(RecognitionError::Other("input-closed".to_string())),
                Err(_) => Err(RecognitionError::NoSpeech),
            },
        }
    }

    // Only a pass already waiting is interrupted
    fn stop(&self) {
        self.stopped.notify_waiters();
    }

    fn abort(&self) {
        self.aborted.notify_waiters();
    }
}
