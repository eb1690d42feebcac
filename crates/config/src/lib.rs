//! Configuration management for the study assistant
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/`
//! - Environment variables (`LOOMINARY__` prefix, `__` separator)
//! - The conventional `GROQ_API_KEY` variable for the LLM credential

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, AnalysisConfig, AuthConfig, ChatConfig, ClientConfig, LlmSettings,
    ObservabilityConfig, PersistenceConfig, RuntimeEnvironment, ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
