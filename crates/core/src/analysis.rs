//! Document analysis types
//!
//! These mirror the `/api/analyze` payload and are also what gets cached per
//! course on the client side.

use serde::{Deserialize, Serialize};

/// A conceptual pitfall with its correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitfall {
    pub pitfall: String,
    pub correction: String,
}

impl Pitfall {
    pub fn new(pitfall: impl Into<String>, correction: impl Into<String>) -> Self {
        Self {
            pitfall: pitfall.into(),
            correction: correction.into(),
        }
    }
}

/// Voice tutor configuration attached to every analysed document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub system_prompt: String,
    pub first_question: String,
}

/// Structured analysis of a single uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    pub file_name: String,
    pub summary: String,
    pub questions: Vec<String>,
    pub mistakes: Vec<Pitfall>,
    pub voice_config: VoiceConfig,
}

/// Analysis of a set of documents (one upload, or a whole course)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseAnalysis {
    pub documents: Vec<DocumentAnalysis>,
}

impl CourseAnalysis {
    pub fn new(documents: Vec<DocumentAnalysis>) -> Self {
        Self { documents }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Append documents from a later upload, keeping upload order
    pub fn extend(&mut self, other: CourseAnalysis) {
        self.documents.extend(other.documents);
    }

    /// Remove every document with the given file name.
    ///
    /// Returns the number of removed documents.
    pub fn remove(&mut self, file_name: &str) -> usize {
        let before = self.documents.len();
        self.documents.retain(|d| d.file_name != file_name);
        before - self.documents.len()
    }

    pub fn find(&self, file_name: &str) -> Option<&DocumentAnalysis> {
        self.documents.iter().find(|d| d.file_name == file_name)
    }
}
