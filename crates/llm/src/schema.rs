//! JSON Schema validation of model output
//!
//! JSON mode only guarantees syntactically valid JSON, so completions are
//! checked against the expected shape before they are deserialized.

use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::LlmError;

static ANALYSIS_SCHEMA: Lazy<Result<JSONSchema, String>> = Lazy::new(|| {
    compile(&json!({
        "type": "object",
        "required": ["documents"],
        "properties": {
            "documents": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["fileName", "summary", "questions", "mistakes"],
                    "properties": {
                        "fileName": { "type": "string" },
                        "summary": { "type": "string" },
                        "questions": { "type": "array", "items": { "type": "string" } },
                        "mistakes": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["pitfall", "correction"],
                                "properties": {
                                    "pitfall": { "type": "string" },
                                    "correction": { "type": "string" }
                                }
                            }
                        }
                    }
                }
            }
        }
    }))
});

static TURN_SCHEMA: Lazy<Result<JSONSchema, String>> = Lazy::new(|| {
    compile(&json!({
        "type": "object",
        "required": ["spokenResponse", "analysis"],
        "properties": {
            "spokenResponse": { "type": "string", "minLength": 1 },
            "analysis": {
                "type": "object",
                "required": ["status", "feedback"],
                "properties": {
                    "status": { "enum": ["correct", "incorrect", "partial", "explained"] },
                    "feedback": { "type": "string" },
                    "mistakes": { "type": "array", "items": { "type": "string" } },
                    "suggestions": { "type": "array", "items": { "type": "string" } }
                }
            }
        }
    }))
});

fn compile(schema: &Value) -> Result<JSONSchema, String> {
    JSONSchema::compile(schema).map_err(|e| e.to_string())
}

fn check(schema: &Lazy<Result<JSONSchema, String>>, instance: &Value) -> Result<(), LlmError> {
    let schema = schema
        .as_ref()
        .map_err(|e| LlmError::Configuration(format!("Invalid schema: {}", e)))?;

    schema.validate(instance).map_err(|errors| {
        let details: Vec<String> = errors.map(|e| e.to_string()).collect();
        LlmError::InvalidResponse(details.join("; "))
    })
}

/// Validate an analysis completion (`{documents: [...]}`)
pub fn validate_analysis(instance: &Value) -> Result<(), LlmError> {
    check(&ANALYSIS_SCHEMA, instance)
}

/// Validate a turn completion (`{spokenResponse, analysis}`)
pub fn validate_turn(instance: &Value) -> Result<(), LlmError> {
    check(&TURN_SCHEMA, instance)
}
