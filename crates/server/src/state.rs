//! Application State
//!
//! Shared state across all handlers.

use parking_lot::RwLock;
use std::sync::Arc;

use loominary_config::{load_settings, Settings};
use loominary_llm::{AnalysisService, LlmError, TurnService};
use loominary_persistence::{MessageStore, PersistenceLayer, UserStore};

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Wrapped in RwLock for hot-reload support
    pub config: Arc<RwLock<Settings>>,
    analysis: Arc<RwLock<AnalysisService>>,
    turns: Arc<RwLock<TurnService>>,
    pub messages: Arc<dyn MessageStore>,
    pub users: Arc<dyn UserStore>,
    /// Environment name for config reload
    env: Option<String>,
}

impl AppState {
    /// State over in-memory stores
    pub fn new(config: Settings) -> Result<Self, LlmError> {
        Self::with_persistence(config, PersistenceLayer::in_memory())
    }

    pub fn with_persistence(config: Settings, persistence: PersistenceLayer) -> Result<Self, LlmError> {
        let analysis = AnalysisService::from_settings(&config)?;
        let turns = TurnService::from_settings(&config)?;
        Ok(Self::from_parts(config, analysis, turns, persistence))
    }

    /// Assemble from prebuilt services
    pub fn from_parts(
        config: Settings,
        analysis: AnalysisService,
        turns: TurnService,
        persistence: PersistenceLayer,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            analysis: Arc::new(RwLock::new(analysis)),
            turns: Arc::new(RwLock::new(turns)),
            messages: persistence.messages,
            users: persistence.users,
            env: None,
        }
    }

    /// Environment name used when reloading
    pub fn with_env(mut self, env: Option<String>) -> Self {
        self.env = env;
        self
    }

    /// Reload configuration from files and rebuild the LLM services.
    ///
    /// Stores, CORS and the listen address keep their startup values.
    pub fn reload_config(&self) -> Result<(), String> {
        let new_config = load_settings(self.env.as_deref())
            .map_err(|e| format!("Failed to reload config: {}", e))?;

        let analysis = AnalysisService::from_settings(&new_config)
            .map_err(|e| format!("Failed to rebuild analysis service: {}", e))?;
        let turns = TurnService::from_settings(&new_config)
            .map_err(|e| format!("Failed to rebuild turn service: {}", e))?;

        *self.analysis.write() = analysis;
        *self.turns.write() = turns;
        *self.config.write() = new_config;

        tracing::info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Get a read guard to the current configuration
    pub fn get_config(&self) -> parking_lot::RwLockReadGuard<'_, Settings> {
        self.config.read()
    }

    /// Snapshot of the analysis service; cheap to clone
    pub fn analysis(&self) -> AnalysisService {
        self.analysis.read().clone()
    }

    pub fn turns(&self) -> TurnService {
        self.turns.read().clone()
    }

    pub fn is_mock(&self) -> bool {
        self.analysis.read().is_mock()
    }
}
