//! Study session client
//!
//! Features:
//! - Speech adapter over platform synthesis/recognition primitives
//! - Socratic voice loop (quiz and doubt modes)
//! - Per-course cache of analyses and recent mistakes
//! - HTTP client for the study API
//! - Course chat polling
//! - Terminal speech for the `loominary-voice` CLI

pub mod chat;
pub mod client;
pub mod course_cache;
pub mod speech;
pub mod terminal;
pub mod voice_loop;

pub use chat::{ChatBackend, ChatPoller};
pub use client::{LoginResponse, StudyClient};
pub use course_cache::{analysis_key, mistakes_key, CourseCache, FileCourseStore};
pub use speech::{ListenError, SpeechAdapter, VoiceState};
pub use terminal::TerminalSpeech;
pub use voice_loop::{doubt_welcome, TurnClient, VoiceSession, VoiceSessionEvent};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("{0}")]
    Speech(#[from] ListenError),

    #[error("Turn error: {0}")]
    Turn(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-2xx response from the study API
    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AgentError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AgentError::Api { status: 401, .. })
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AgentError::Serialization(err.to_string())
        } else {
            AgentError::Network(err.to_string())
        }
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Serialization(err.to_string())
    }
}

impl From<loominary_core::Error> for AgentError {
    fn from(err: loominary_core::Error) -> Self {
        use loominary_core::Error;
        match err {
            Error::InvalidInput(msg) => AgentError::InvalidInput(msg),
            Error::Serialization(msg) => AgentError::Serialization(msg),
            Error::Network(msg) => AgentError::Network(msg),
            Error::Llm(msg) => AgentError::Turn(msg),
            Error::Storage(msg) | Error::Speech(msg) => AgentError::Storage(msg),
        }
    }
}
