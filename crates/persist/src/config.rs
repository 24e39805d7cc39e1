use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default prefix for generated scenario names ("Scenario #3").
pub const DEFAULT_SCENARIO_PREFIX: &str = "Scenario";

/// Errors loading an [`EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Engine settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Restore cached simulations on undo/redo unless a call says otherwise.
    pub simulation_follows_history: bool,
    pub scenario_name_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            simulation_follows_history: false,
            scenario_name_prefix: DEFAULT_SCENARIO_PREFIX.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}
