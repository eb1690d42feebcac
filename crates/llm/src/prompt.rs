//! Prompt Building and Management
//!
//! Constructs prompts for document analysis and for quiz/doubt turns, plus
//! the fixed responses served in mock mode.

use serde::{Deserialize, Serialize};
use std::fmt;

use loominary_core::{
    AnswerStatus, DocumentAnalysis, InteractionMode, Pitfall, TurnAnalysis, TurnRequest,
    TurnResult, VoiceConfig,
};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Prompt builder
#[derive(Debug, Default)]
pub struct PromptBuilder {
    messages: Vec<Message>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// System prompt for the per-document conceptual analysis
    pub fn analysis_system_prompt(mut self, notes: &str) -> Self {
        let system = format!(
            r#"You are an elite academic tutor and conceptual analyst. You have been provided with one or more study documents.

TASK:
Analyze EACH document independently and generate a structured JSON response.
Your analysis must be DEEP and CONCEPTUAL. Avoid generic summaries or obvious questions.

FOR EACH DOCUMENT:
1. fileName: The exact name of the file.
2. summary: A high-level conceptual summary. Don't just list topics; explain the fundamental theories, "why" it matters, and the core intellectual architecture of the material (3-4 sentences).
3. questions: 3-4 deep, Socratic practice questions. These should test first principles and "how" things relate, not just rote memorization.
4. mistakes: Identify 1-2 subtle conceptual pitfalls where students often trip up, and provide corrective insights.

Output JSON structure:
{{
  "documents": [
    {{
      "fileName": "string",
      "summary": "string",
      "questions": ["string", "string", ...],
      "mistakes": [
        {{ "pitfall": "string", "correction": "string" }}
      ]
    }},
    ...
  ]
}}

NOTES CONTENT TO ANALYZE:
{notes}"#
        );

        self.messages.push(Message::system(system));
        self
    }

    /// System prompt for one quiz or doubt turn
    pub fn turn_system_prompt(mut self, request: &TurnRequest) -> Self {
        let system = match request.mode {
            InteractionMode::Quiz => format!(
                r#"You are a Socratic Revision Assistant for the document "{file}".

DOCUMENT CONTEXT:
{summary}

YOUR TASK:
1. Evaluate the user's answer to "{question}".
2. Provide a spoken response that acknowledges the answer and asks the next question.
3. Provide a structured analysis for the UI.

OUTPUT FORMAT (JSON ONLY):
{{
  "spokenResponse": "Brief feedback + next question. Keep under 40 words. No markdown.",
  "analysis": {{
    "status": "correct | incorrect | partial",
    "feedback": "Concise feedback on their answer.",
    "mistakes": ["List any conceptual errors or missing points"],
    "suggestions": ["Specific tips to improve their understanding of this specific topic"]
  }}
}}

RULES:
- Focus on 'why' and 'how'.
- Be encouraging."#,
                file = request.file_name,
                summary = request.document_summary,
                question = request.current_question,
            ),
            InteractionMode::Doubt => format!(
                r#"You are a Doubt Clearing Assistant for the document "{file}".

DOCUMENT CONTEXT:
{summary}

YOUR TASK:
1. Directly answer the user's question.
2. Provide structured analysis for the UI if applicable.

OUTPUT FORMAT (JSON ONLY):
{{
  "spokenResponse": "Direct answer. Keep under 50 words. No markdown.",
  "analysis": {{
    "status": "explained",
    "feedback": "Summary of the explanation.",
    "mistakes": [],
    "suggestions": ["Related concepts to look into"]
  }}
}}

RULES:
- Be concise and clear."#,
                file = request.file_name,
                summary = request.document_summary,
            ),
        };

        self.messages.push(Message::system(system));
        self
    }

    /// The student's utterance, phrased for the mode
    pub fn turn_user_message(self, request: &TurnRequest) -> Self {
        let content = match request.mode {
            InteractionMode::Quiz => format!(
                "My answer to \"{}\" is: \"{}\"",
                request.current_question, request.user_answer
            ),
            InteractionMode::Doubt => format!(
                "I have a doubt: \"{}\" (referring to what we discussed: {})",
                request.user_answer, request.current_question
            ),
        };
        self.user_message(&content)
    }

    pub fn user_message(mut self, message: &str) -> Self {
        self.messages.push(Message::user(message));
        self
    }

    pub fn build(self) -> Vec<Message> {
        self.messages
    }
}

/// User message paired with the analysis system prompt
pub const ANALYSIS_USER_MESSAGE: &str =
    "Perform a deep conceptual analysis of each document provided.";

/// Voice tutor configuration derived from an analysed document
pub fn socratic_voice_config(file_name: &str, summary: &str, questions: &[String]) -> VoiceConfig {
    let system_prompt = format!(
        r#"You are a Socratic Revision Assistant for the document "{file_name}".

RULES:
1. ASK ONLY ONE QUESTION AT A TIME about "{file_name}".
2. FEEDBACK: Give brief feedback on the user's answer, then ask the next question.
3. CONCISE: Keep responses under 15 words.
4. FOCUS: Stay strictly on the content summarized for this document: {summary}"#
    );

    let first_question = questions
        .first()
        .filter(|q| !q.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| format!("Ready to start the quiz for {}?", file_name));

    VoiceConfig {
        system_prompt,
        first_question,
    }
}

/// Fixed responses served when no credential is configured
pub struct MockTemplates;

impl MockTemplates {
    pub const QUIZ_RESPONSE: &'static str = "That's an interesting perspective. Since I'm in mock mode without an API key, I'll just say good job! What else can you tell me about this?";

    pub const DOUBT_RESPONSE: &'static str = "In mock mode, I can't answer specific questions, but I'm sure it's a great doubt! Please set your API key to get real answers.";

    /// Deterministic analysis for one uploaded file
    pub fn document(file_name: &str) -> DocumentAnalysis {
        DocumentAnalysis {
            file_name: file_name.to_string(),
            summary: format!(
                "[MOCK] This is an individual summary for {}. To see real AI analysis, ensure GROQ_API_KEY is set.",
                file_name
            ),
            questions: vec![
                format!("How does {} contribute to the overall subject?", file_name),
                "What is the most important concept in this specific file?".to_string(),
            ],
            mistakes: vec![Pitfall::new(
                "Confusing this document's scope with another",
                "Focus on the unique data provided in this specific file.",
            )],
            voice_config: VoiceConfig {
                system_prompt: format!(
                    "You are a Socratic tutor for the document: {}. Ask short questions one-by-one.",
                    file_name
                ),
                first_question: format!("Ready to quiz on {}? What is the main theme?", file_name),
            },
        }
    }

    /// Deterministic turn result for the mode
    pub fn turn(mode: InteractionMode) -> TurnResult {
        let (spoken, status, feedback) = match mode {
            InteractionMode::Quiz => (
                Self::QUIZ_RESPONSE,
                AnswerStatus::Correct,
                "Mock mode: answers are not evaluated.",
            ),
            InteractionMode::Doubt => (
                Self::DOUBT_RESPONSE,
                AnswerStatus::Explained,
                "Mock mode: doubts are not answered.",
            ),
        };

        TurnResult {
            spoken_response: spoken.to_string(),
            analysis: TurnAnalysis {
                status,
                feedback: feedback.to_string(),
                mistakes: Vec::new(),
                suggestions: vec!["Set GROQ_API_KEY to enable real feedback.".to_string()],
            },
        }
    }
}
