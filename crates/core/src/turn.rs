//! Quiz / doubt turn types

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the voice session is doing with the student
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    /// Tutor asks questions and evaluates answers
    #[default]
    Quiz,
    /// Student asks questions and the tutor explains
    Doubt,
}

impl InteractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionMode::Quiz => "quiz",
            InteractionMode::Doubt => "doubt",
        }
    }

    /// Spoken when nothing was recognised during a listen pass
    pub fn clarification(&self) -> &'static str {
        match self {
            InteractionMode::Quiz => {
                "I'm sorry, I didn't catch that. Could you please repeat your answer?"
            },
            InteractionMode::Doubt => {
                "I'm sorry, I didn't hear your doubt clearly. Can you ask that again?"
            },
        }
    }
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict on a student's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    Correct,
    Incorrect,
    Partial,
    /// Doubt mode: the tutor explained something
    Explained,
}

impl AnswerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerStatus::Correct => "correct",
            AnswerStatus::Incorrect => "incorrect",
            AnswerStatus::Partial => "partial",
            AnswerStatus::Explained => "explained",
        }
    }
}

/// One student utterance plus the context needed to evaluate it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    #[serde(default)]
    pub user_answer: String,
    #[serde(default)]
    pub current_question: String,
    #[serde(default)]
    pub document_summary: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub mode: InteractionMode,
}

/// Structured feedback shown next to the spoken response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnAnalysis {
    pub status: AnswerStatus,
    pub feedback: String,
    #[serde(default)]
    pub mistakes: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Result of one quiz or doubt turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResult {
    pub spoken_response: String,
    pub analysis: TurnAnalysis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_mode_defaults_to_quiz() {
        let req: TurnRequest =
            serde_json::from_str(r#"{"userAnswer":"friction opposes motion"}"#).unwrap();
        assert_eq!(req.mode, InteractionMode::Quiz);
        assert_eq!(req.user_answer, "friction opposes motion");
        assert!(req.current_question.is_empty());
    }

    #[test]
    fn test_result_wire_format() {
        let result: TurnResult = serde_json::from_value(serde_json::json!({
            "spokenResponse": "Nice. Next?",
            "analysis": {
                "status": "partial",
                "feedback": "Almost",
                "mistakes": ["missed normal force"],
                "suggestions": []
            }
        }))
        .unwrap();
        assert_eq!(result.analysis.status, AnswerStatus::Partial);
        assert_eq!(result.analysis.mistakes.len(), 1);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["spokenResponse"], "Nice. Next?");
    }

    #[test]
    fn test_clarification_differs_by_mode() {
        assert!(InteractionMode::Quiz.clarification().contains("repeat your answer"));
        assert!(InteractionMode::Doubt.clarification().contains("ask that again"));
    }
}
