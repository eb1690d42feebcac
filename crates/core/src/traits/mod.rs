//! Core traits
//!
//! ```text
//! Speech:
//!   - SpeechSynthesizer: text -> audible playback
//!   - SpeechRecognizer: microphone -> transcript
//!
//! Storage:
//!   - CourseStore: opaque blobs keyed by string (per-course client cache)
//! ```

mod speech;
mod store;

pub use speech::{RecognitionError, SpeechRecognizer, SpeechSynthesizer, SynthesisError};
pub use store::{CourseStore, InMemoryCourseStore};
