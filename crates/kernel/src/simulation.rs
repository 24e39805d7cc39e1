use crate::model::HydraulicModel;
use aquifer_common::ModelVersion;
use serde::{Deserialize, Serialize};

/// Outcome class reported by the simulation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationStatus {
    Success,
    Warning,
    Failure,
}

/// Result of one run of the external simulation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub status: SimulationStatus,
    /// Engine report text.
    pub report: String,
}

/// The external engine: a pure function of the model.
///
/// Invoked by the host, never by the persistence layer. Results are pushed
/// back through the persistence facade tagged with the model version the
/// run started from.
pub trait SimulationRunner {
    fn simulate(&self, model: &HydraulicModel) -> SimulationResult;
}

/// Cached simulation state of one snapshot.
///
/// Every non-idle variant is tagged with the model version it was computed
/// against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SimulationState {
    #[default]
    Idle,
    Running {
        model_version: ModelVersion,
    },
    Success {
        model_version: ModelVersion,
        result: SimulationResult,
    },
    Warning {
        model_version: ModelVersion,
        result: SimulationResult,
    },
    Failure {
        model_version: ModelVersion,
        result: SimulationResult,
    },
}

impl SimulationState {
    pub fn running(model_version: ModelVersion) -> Self {
        Self::Running { model_version }
    }

    /// Wrap a finished result, picking the variant from its status.
    pub fn finished(model_version: ModelVersion, result: SimulationResult) -> Self {
        match result.status {
            SimulationStatus::Success => Self::Success {
                model_version,
                result,
            },
            SimulationStatus::Warning => Self::Warning {
                model_version,
                result,
            },
            SimulationStatus::Failure => Self::Failure {
                model_version,
                result,
            },
        }
    }

    /// Version tag, `None` when idle.
    pub fn model_version(&self) -> Option<&ModelVersion> {
        match self {
            Self::Idle => None,
            Self::Running { model_version }
            | Self::Success { model_version, .. }
            | Self::Warning { model_version, .. }
            | Self::Failure { model_version, .. } => Some(model_version),
        }
    }

    pub fn result(&self) -> Option<&SimulationResult> {
        match self {
            Self::Success { result, .. }
            | Self::Warning { result, .. }
            | Self::Failure { result, .. } => Some(result),
            Self::Idle | Self::Running { .. } => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether a finished result exists.
    pub fn is_finished(&self) -> bool {
        self.result().is_some()
    }

    /// Non-idle and computed against a different model version.
    pub fn is_outdated(&self, current: &ModelVersion) -> bool {
        self.model_version().is_some_and(|v| v != current)
    }
}
