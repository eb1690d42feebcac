//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{analysis, auth, chat, llm};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion endpoint
    #[serde(default)]
    pub llm: LlmSettings,

    /// Document analysis limits
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Course chat
    #[serde(default)]
    pub chat: ChatConfig,

    /// Session tokens
    #[serde(default)]
    pub auth: AuthConfig,

    /// ScyllaDB persistence
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Voice client (CLI) configuration
    #[serde(default)]
    pub client: ClientConfig,
}

impl Settings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_llm()?;
        self.validate_limits()?;
        self.validate_auth()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        // Request timeout wraps the upstream LLM call
        if self.server.timeout_seconds <= self.llm.timeout_seconds {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: format!(
                    "Timeout must exceed llm.timeout_seconds ({})",
                    self.llm.timeout_seconds
                ),
            });
        }

        if self.environment.is_production()
            && self.server.cors_enabled
            && self.server.cors_origins.iter().any(|o| o == "*")
        {
            return Err(ConfigError::InvalidValue {
                field: "server.cors_origins".to_string(),
                message: "Wildcard origin is not allowed in production".to_string(),
            });
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        if self.llm.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField("llm.endpoint".to_string()));
        }

        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::MissingField("llm.model".to_string()));
        }

        for (field, value) in [
            ("llm.analysis_temperature", self.llm.analysis_temperature),
            ("llm.turn_temperature", self.llm.turn_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("Must be between 0.0 and 2.0, got {}", value),
                });
            }
        }

        Ok(())
    }

    fn validate_limits(&self) -> Result<(), ConfigError> {
        if self.analysis.max_chars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analysis.max_chars".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.chat.history_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chat.history_limit".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.chat.poll_interval_ms < 100 {
            return Err(ConfigError::InvalidValue {
                field: "chat.poll_interval_ms".to_string(),
                message: format!(
                    "Poll interval too low (minimum 100ms), got {}",
                    self.chat.poll_interval_ms
                ),
            });
        }

        Ok(())
    }

    fn validate_auth(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::MissingField("auth.jwt_secret".to_string()));
        }

        if self.environment.is_strict() && self.auth.jwt_secret == default_jwt_secret() {
            return Err(ConfigError::InvalidValue {
                field: "auth.jwt_secret".to_string(),
                message: "The development secret must be replaced outside development"
                    .to_string(),
            });
        }

        if self.environment.is_production() && self.auth.jwt_secret.len() < 32 {
            return Err(ConfigError::InvalidValue {
                field: "auth.jwt_secret".to_string(),
                message: "Secret must be at least 32 bytes in production".to_string(),
            });
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Multipart upload limit in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_timeout() -> u64 {
    120
}
fn default_max_upload_bytes() -> usize {
    analysis::MAX_UPLOAD_BYTES
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// OpenAI-compatible completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Base URL, `/chat/completions` is appended
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Credential; falls back to the conventional environment variables
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_analysis_temperature")]
    pub analysis_temperature: f32,

    #[serde(default = "default_turn_temperature")]
    pub turn_temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
}

fn default_llm_endpoint() -> String {
    llm::DEFAULT_ENDPOINT.to_string()
}
fn default_llm_model() -> String {
    llm::DEFAULT_MODEL.to_string()
}
fn default_analysis_temperature() -> f32 {
    llm::ANALYSIS_TEMPERATURE
}
fn default_turn_temperature() -> f32 {
    llm::TURN_TEMPERATURE
}
fn default_max_tokens() -> usize {
    llm::DEFAULT_MAX_TOKENS
}
fn default_llm_timeout() -> u64 {
    60
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: None,
            analysis_temperature: default_analysis_temperature(),
            turn_temperature: default_turn_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_llm_timeout(),
        }
    }
}

impl LlmSettings {
    /// Usable credential, if any.
    ///
    /// The configured key wins; otherwise `NEXT_PUBLIC_GROQ_API_KEY` and
    /// `GROQ_API_KEY` are consulted. Blank values and the `dummy_key`
    /// placeholder count as absent, which puts the services in mock mode.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Same as [`resolve_api_key`](Self::resolve_api_key) with an injected
    /// environment lookup.
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.api_key
            .clone()
            .into_iter()
            .chain(llm::API_KEY_ENV_VARS.iter().filter_map(|name| lookup(name)))
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty() && key != llm::DUMMY_API_KEY)
    }
}

/// Document analysis limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Characters of combined text sent to the model
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_max_chars() -> usize {
    analysis::MAX_CHARS
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

/// Course chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_history_limit() -> usize {
    chat::HISTORY_LIMIT
}
fn default_poll_interval() -> u64 {
    chat::POLL_INTERVAL_MS
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Session token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_hours: u64,
}

fn default_jwt_secret() -> String {
    "loominary-development-secret".to_string()
}
fn default_token_ttl() -> u64 {
    auth::TOKEN_TTL_HOURS
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_hours: default_token_ttl(),
        }
    }
}

/// ScyllaDB persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// In-memory stores are used when disabled
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,

    #[serde(default = "default_keyspace")]
    pub keyspace: String,

    #[serde(default = "default_replication_factor")]
    pub replication_factor: u32,
}

fn default_scylla_hosts() -> Vec<String> {
    vec!["127.0.0.1:9042".to_string()]
}
fn default_keyspace() -> String {
    "loominary".to_string()
}
fn default_replication_factor() -> u32 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable the Prometheus recorder and `/metrics`
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Voice client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server the CLI talks to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Directory backing the course cache
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Silence after which a listen pass counts as no speech
    #[serde(default = "default_listen_timeout")]
    pub listen_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".loominary")
}
fn default_listen_timeout() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            data_dir: default_data_dir(),
            listen_timeout_secs: default_listen_timeout(),
        }
    }
}

/// Load settings from files and environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::with_name("config/default").required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("LOOMINARY")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(
        environment = ?settings.environment,
        model = %settings.llm.model,
        persistence = settings.persistence.enabled,
        "Settings loaded"
    );

    Ok(settings)
}
