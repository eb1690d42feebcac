//! Core traits and types for the study assistant
//!
//! This crate provides foundational types used across all other crates:
//! - Document analysis and quiz turn wire types
//! - The rolling recent-mistakes list
//! - Course chat and user types
//! - Speech and storage traits
//! - Error types

pub mod analysis;
pub mod chat;
pub mod error;
pub mod mistakes;
pub mod traits;
pub mod turn;

pub use analysis::{CourseAnalysis, DocumentAnalysis, Pitfall, VoiceConfig};
pub use chat::{ChatMessage, MessageAuthor, User};
pub use error::{Error, Result};
pub use mistakes::{RecentMistakes, RECENT_MISTAKES_CAPACITY};
pub use turn::{AnswerStatus, InteractionMode, TurnAnalysis, TurnRequest, TurnResult};

pub use traits::{
    CourseStore, InMemoryCourseStore, RecognitionError, SpeechRecognizer, SpeechSynthesizer,
    SynthesisError,
};
