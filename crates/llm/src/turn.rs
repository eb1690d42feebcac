//! Quiz / doubt turn service

use std::sync::Arc;

use loominary_config::Settings;
use loominary_core::{TurnRequest, TurnResult};

use crate::analysis::shared_backend;
use crate::backend::{GenerationOptions, LlmBackend};
use crate::prompt::{MockTemplates, PromptBuilder};
use crate::{schema, LlmError};

/// Evaluates one student utterance against the document context
#[derive(Clone)]
pub struct TurnService {
    backend: Option<Arc<dyn LlmBackend>>,
    temperature: f32,
}

impl TurnService {
    /// `None` puts the service in mock mode
    pub fn new(backend: Option<Arc<dyn LlmBackend>>, settings: &Settings) -> Self {
        Self {
            backend,
            temperature: settings.llm.turn_temperature,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, LlmError> {
        let backend = shared_backend(settings)?;
        Ok(Self::new(backend, settings))
    }

    pub fn is_mock(&self) -> bool {
        self.backend.is_none()
    }

    pub async fn evaluate(&self, request: &TurnRequest) -> Result<TurnResult, LlmError> {
        let Some(backend) = &self.backend else {
            return Ok(MockTemplates::turn(request.mode));
        };

        let messages = PromptBuilder::new()
            .turn_system_prompt(request)
            .turn_user_message(request)
            .build();

        let result = backend
            .generate(&messages, GenerationOptions::json(self.temperature))
            .await?;

        tracing::debug!(
            mode = %request.mode,
            time_ms = result.total_time_ms,
            "Turn completion received"
        );

        let value: serde_json::Value = serde_json::from_str(&result.text)
            .map_err(|e| LlmError::InvalidResponse(format!("Model returned invalid JSON: {}", e)))?;

        schema::validate_turn(&value)?;

        serde_json::from_value(value).map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}
