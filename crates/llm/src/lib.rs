//! LLM integration for the study assistant
//!
//! Features:
//! - OpenAI-compatible chat completions backend (Groq by default)
//! - Per-document analysis with Socratic voice configuration
//! - Quiz / doubt turn evaluation
//! - JSON Schema validation of model output
//! - Deterministic mock mode when no credential is configured

pub mod analysis;
pub mod backend;
pub mod prompt;
pub mod schema;
pub mod turn;

pub use analysis::{combine_documents, truncate_chars, AnalysisService, SourceDocument};
pub use backend::{
    FinishReason, GenerationOptions, GenerationResult, LlmBackend, OpenAIBackend, OpenAIConfig,
};
pub use prompt::{socratic_voice_config, Message, MockTemplates, PromptBuilder, Role};
pub use turn::TurnService;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    /// Caller supplied unusable input; message is user facing
    #[error("{0}")]
    InvalidInput(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for loominary_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::InvalidInput(msg) => loominary_core::Error::InvalidInput(msg),
            other => loominary_core::Error::Llm(other.to_string()),
        }
    }
}
