//! Document analysis service
//!
//! Turns extracted lecture notes into one [`DocumentAnalysis`] per file.
//! Without a usable credential every file gets a deterministic mock
//! analysis so the rest of the product stays usable.

use std::sync::Arc;

use loominary_config::Settings;
use loominary_core::{CourseAnalysis, DocumentAnalysis, Pitfall};
use serde::Deserialize;

use crate::backend::{GenerationOptions, LlmBackend, OpenAIBackend, OpenAIConfig};
use crate::prompt::{socratic_voice_config, MockTemplates, PromptBuilder, ANALYSIS_USER_MESSAGE};
use crate::{schema, LlmError};

/// Text extracted from one uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub file_name: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            text: text.into(),
        }
    }
}

/// Analysis as returned by the model, before voice configs are attached
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    documents: Vec<RawDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    file_name: String,
    summary: String,
    questions: Vec<String>,
    mistakes: Vec<Pitfall>,
}

impl From<RawDocument> for DocumentAnalysis {
    fn from(raw: RawDocument) -> Self {
        let voice_config = socratic_voice_config(&raw.file_name, &raw.summary, &raw.questions);
        DocumentAnalysis {
            file_name: raw.file_name,
            summary: raw.summary,
            questions: raw.questions,
            mistakes: raw.mistakes,
            voice_config,
        }
    }
}

/// Per-document analysis over an OpenAI-compatible backend
#[derive(Clone)]
pub struct AnalysisService {
    backend: Option<Arc<dyn LlmBackend>>,
    temperature: f32,
    max_chars: usize,
}

impl AnalysisService {
    /// `None` puts the service in mock mode
    pub fn new(backend: Option<Arc<dyn LlmBackend>>, settings: &Settings) -> Self {
        Self {
            backend,
            temperature: settings.llm.analysis_temperature,
            max_chars: settings.analysis.max_chars,
        }
    }

    /// Build with a Groq backend when a credential resolves, mock otherwise
    pub fn from_settings(settings: &Settings) -> Result<Self, LlmError> {
        let backend = shared_backend(settings)?;
        Ok(Self::new(backend, settings))
    }

    pub fn is_mock(&self) -> bool {
        self.backend.is_none()
    }

    /// Backend reachability; `None` in mock mode
    pub async fn backend_available(&self) -> Option<bool> {
        match &self.backend {
            Some(backend) => Some(backend.is_available().await),
            None => None,
        }
    }

    /// Model in use, if any
    pub fn model_name(&self) -> Option<&str> {
        self.backend.as_ref().map(|b| b.model_name())
    }

    /// Analyse each document independently
    pub async fn analyze(&self, documents: &[SourceDocument]) -> Result<CourseAnalysis, LlmError> {
        if documents.is_empty() {
            return Err(LlmError::InvalidInput("No files provided".to_string()));
        }

        if documents.iter().all(|d| d.text.trim().is_empty()) {
            return Err(LlmError::InvalidInput(
                "Could not extract text from any of the files".to_string(),
            ));
        }

        let backend = match &self.backend {
            Some(backend) => backend,
            None => {
                tracing::info!(files = documents.len(), "No LLM credential, serving mock analysis");
                return Ok(CourseAnalysis::new(
                    documents
                        .iter()
                        .map(|d| MockTemplates::document(&d.file_name))
                        .collect(),
                ));
            },
        };

        let combined = combine_documents(documents);
        let notes = truncate_chars(&combined, self.max_chars);

        let messages = PromptBuilder::new()
            .analysis_system_prompt(notes)
            .user_message(ANALYSIS_USER_MESSAGE)
            .build();

        let result = backend
            .generate(&messages, GenerationOptions::json(self.temperature))
            .await?;

        tracing::debug!(
            files = documents.len(),
            chars = notes.chars().count(),
            time_ms = result.total_time_ms,
            "Analysis completion received"
        );

        parse_analysis(&result.text)
    }
}

/// Resolve the credential and build the shared backend, if any
pub(crate) fn shared_backend(settings: &Settings) -> Result<Option<Arc<dyn LlmBackend>>, LlmError> {
    match settings.llm.resolve_api_key() {
        Some(key) => {
            let backend = OpenAIBackend::new(OpenAIConfig::from_settings(&settings.llm, key))?;
            Ok(Some(Arc::new(backend)))
        },
        None => Ok(None),
    }
}

/// Join extracted texts with per-file markers
pub fn combine_documents(documents: &[SourceDocument]) -> String {
    documents.iter().fold(String::new(), |mut acc, doc| {
        acc.push_str("\n\n--- CONTENT FROM FILE: ");
        acc.push_str(&doc.file_name);
        acc.push_str(" ---\n");
        acc.push_str(&doc.text);
        acc
    })
}

/// First `max_chars` characters, never splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn parse_analysis(content: &str) -> Result<CourseAnalysis, LlmError> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| LlmError::InvalidResponse(format!("Model returned invalid JSON: {}", e)))?;

    schema::validate_analysis(&value)?;

    let raw: RawAnalysis =
        serde_json::from_value(value).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    Ok(CourseAnalysis::new(
        raw.documents.into_iter().map(DocumentAnalysis::from).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FinishReason, GenerationResult};
    use crate::prompt::{Message, Role};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Returns a canned completion and records what it was asked
    struct ScriptedBackend {
        reply: String,
        seen: Mutex<Vec<(Vec<Message>, GenerationOptions)>>,
    }

    impl ScriptedBackend {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn generate(
            &self,
            messages: &[Message],
            options: GenerationOptions,
        ) -> Result<GenerationResult, LlmError> {
            self.seen.lock().push((messages.to_vec(), options));
            Ok(GenerationResult {
                text: self.reply.clone(),
                tokens: 0,
                total_time_ms: 1,
                finish_reason: FinishReason::Stop,
            })
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_mock_analysis_per_file() {
        let service = AnalysisService::new(None, &Settings::default());
        assert!(service.is_mock());

        let docs = vec![
            SourceDocument::new("notes.txt", "Newton's laws"),
            SourceDocument::new("lab.pdf", "Pendulum"),
        ];
        let analysis = service.analyze(&docs).await.unwrap();

        assert_eq!(analysis.documents.len(), 2);
        let first = &analysis.documents[0];
        assert_eq!(first.file_name, "notes.txt");
        assert!(first.summary.starts_with("[MOCK]"));
        assert_eq!(first.questions.len(), 2);
        assert_eq!(analysis.documents[1].file_name, "lab.pdf");
    }

    #[tokio::test]
    async fn test_input_errors() {
        let service = AnalysisService::new(None, &Settings::default());

        let err = service.analyze(&[]).await.unwrap_err();
        assert_eq!(err.to_string(), "No files provided");

        let err = service
            .analyze(&[SourceDocument::new("blank.txt", "  \n\t")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Could not extract text from any of the files");
    }

    #[tokio::test]
    async fn test_live_analysis_attaches_voice_config() {
        let backend = ScriptedBackend::new(
            r#"{"documents":[{"fileName":"thermo.pdf","summary":"Energy flows.","questions":["Why does entropy grow?","What is heat?"],"mistakes":[{"pitfall":"Heat is temperature","correction":"Heat is energy transfer"}]}]}"#,
        );
        let service = AnalysisService::new(Some(backend.clone()), &Settings::default());

        let analysis = service
            .analyze(&[SourceDocument::new("thermo.pdf", "First law...")])
            .await
            .unwrap();

        let doc = &analysis.documents[0];
        assert_eq!(doc.voice_config.first_question, "Why does entropy grow?");
        assert!(doc.voice_config.system_prompt.contains("Energy flows."));

        let seen = backend.seen.lock();
        let (messages, options) = &seen[0];
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0]
            .content
            .contains("--- CONTENT FROM FILE: thermo.pdf ---\nFirst law..."));
        assert!(options.json_mode);
        assert_eq!(options.temperature, Some(0.3));
    }

    #[tokio::test]
    async fn test_invalid_model_output_is_an_error() {
        let service = AnalysisService::new(
            Some(ScriptedBackend::new(r#"{"documents":[{"fileName":"a"}]}"#)),
            &Settings::default(),
        );
        let err = service
            .analyze(&[SourceDocument::new("a", "text")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));

        let service = AnalysisService::new(
            Some(ScriptedBackend::new("not json")),
            &Settings::default(),
        );
        assert!(service.analyze(&[SourceDocument::new("a", "text")]).await.is_err());
    }

    #[tokio::test]
    async fn test_notes_are_truncated() {
        let backend = ScriptedBackend::new(r#"{"documents":[]}"#);
        let mut settings = Settings::default();
        settings.analysis.max_chars = 40;
        let service = AnalysisService::new(Some(backend.clone()), &settings);

        service
            .analyze(&[SourceDocument::new("long.txt", "x".repeat(500))])
            .await
            .unwrap();

        let seen = backend.seen.lock();
        let system = &seen[0].0[0].content;
        assert!(!system.contains(&"x".repeat(41)));
    }

    #[test]
    fn test_combine_and_truncate() {
        let combined = combine_documents(&[
            SourceDocument::new("a.txt", "alpha"),
            SourceDocument::new("b.txt", "beta"),
        ]);
        assert_eq!(
            combined,
            "\n\n--- CONTENT FROM FILE: a.txt ---\nalpha\n\n--- CONTENT FROM FILE: b.txt ---\nbeta"
        );

        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
