//! Transactional facade over the worktree.
//!
//! All edits, history steps and branch switches go through [`Persistence`].
//! Each call runs to completion synchronously; a call that fails has not
//! touched any snapshot.

use crate::config::EngineConfig;
use crate::error::PersistError;
use crate::snapshot::{HistoryDirection, Snapshot};
use crate::worktree::{ScenarioMeta, Worktree};
use aquifer_author::MomentLog;
use aquifer_common::{ModelVersion, SnapshotId};
use aquifer_kernel::{HydraulicModel, ModelMetadata, Moment, SimulationState};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Name and settings of the open document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub name: String,
    pub metadata: ModelMetadata,
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            metadata: ModelMetadata::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransactOptions {
    /// Keep the cached simulation (it becomes outdated) instead of clearing it.
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryOptions {
    /// Restore the simulation cached at the target position, if any.
    /// `None` defers to [`EngineConfig::simulation_follows_history`].
    pub restore_simulation: Option<bool>,
}

/// What happened to a delivered simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Accepted,
    /// Tagged with a version the snapshot has moved past; discarded.
    Stale,
}

/// Simulations seen at each log position of one snapshot.
type PositionCache = BTreeMap<usize, SimulationState>;

pub struct Persistence {
    worktree: Worktree,
    document: DocumentMeta,
    config: EngineConfig,
    simulation_cache: HashMap<SnapshotId, PositionCache>,
}

impl Persistence {
    /// An empty, untitled document.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_worktree(
            Worktree::new(HydraulicModel::new()),
            DocumentMeta::default(),
            config,
        )
    }

    pub fn with_worktree(worktree: Worktree, document: DocumentMeta, config: EngineConfig) -> Self {
        Self {
            worktree,
            document,
            config,
            simulation_cache: HashMap::new(),
        }
    }

    pub fn worktree(&self) -> &Worktree {
        &self.worktree
    }

    pub fn document(&self) -> &DocumentMeta {
        &self.document
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn active(&self) -> &Snapshot {
        self.worktree.active()
    }

    pub fn model(&self) -> &HydraulicModel {
        self.active().model()
    }

    pub fn moment_log(&self) -> &MomentLog {
        self.active().moment_log()
    }

    pub fn simulation(&self) -> &SimulationState {
        self.active().simulation()
    }

    pub fn model_version(&self) -> &ModelVersion {
        self.active().model_version()
    }

    pub fn can_undo(&self) -> bool {
        self.moment_log().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.moment_log().can_redo()
    }

    /// Whether edits to the active snapshot are currently rejected.
    pub fn is_main_readonly(&self) -> bool {
        self.active().is_locked()
    }

    pub fn is_snapshot_locked(&self, snapshot_id: &SnapshotId) -> Result<bool, PersistError> {
        self.worktree
            .snapshot(snapshot_id)
            .map(Snapshot::is_locked)
            .ok_or_else(|| PersistError::UnknownSnapshot(snapshot_id.clone()))
    }

    /// Apply an edit to the active snapshot and record it in its history.
    ///
    /// Rejected with `LockedBranch` when the active snapshot is a locked main.
    /// A non-quiet edit clears the cached simulation; a quiet one leaves it in
    /// place, tagged with the previous version.
    pub fn transact(
        &mut self,
        moment: Moment,
        options: TransactOptions,
    ) -> Result<ModelVersion, PersistError> {
        let snapshot_id = self.worktree.active_snapshot_id().clone();
        if self.active().is_locked() {
            tracing::warn!(
                snapshot = %snapshot_id,
                note = %moment.note,
                "edit rejected: snapshot is locked"
            );
            return Err(PersistError::LockedBranch { snapshot_id });
        }
        let snapshot = self.snapshot_mut(&snapshot_id)?;
        let position = snapshot.moment_log().cursor();
        let note = moment.note.clone();
        let version = snapshot.record(moment).clone();
        if !options.quiet {
            snapshot.set_simulation(SimulationState::Idle);
        }
        if let Some(cache) = self.simulation_cache.get_mut(&snapshot_id) {
            cache.retain(|at, _| *at <= position);
        }
        tracing::debug!(
            snapshot = %snapshot_id,
            %note,
            version = %version,
            quiet = options.quiet,
            "transact"
        );
        Ok(version)
    }

    /// Undo or redo on the active snapshot.
    ///
    /// Allowed on a locked main: the lock forbids new edits, not navigation of
    /// existing history. Returns `None` at the history boundary.
    pub fn history_control(
        &mut self,
        direction: HistoryDirection,
        options: HistoryOptions,
    ) -> Result<Option<ModelVersion>, PersistError> {
        let snapshot_id = self.worktree.active_snapshot_id().clone();
        let restore = options
            .restore_simulation
            .unwrap_or(self.config.simulation_follows_history);
        let cache = self.simulation_cache.get(&snapshot_id);
        let snapshot = self
            .worktree
            .snapshot_mut(&snapshot_id)
            .ok_or_else(|| PersistError::UnknownSnapshot(snapshot_id.clone()))?;
        if !snapshot.step(direction) {
            return Ok(None);
        }
        let position = snapshot.moment_log().cursor();
        let cached = cache
            .filter(|_| restore)
            .and_then(|cache| cache.get(&position))
            .and_then(|sim| sim.model_version().map(|v| (v.clone(), sim.clone())));
        let restored = cached.is_some();
        match cached {
            Some((version, simulation)) => {
                snapshot.set_model_version(version);
                snapshot.set_simulation(simulation);
            }
            None => snapshot.set_model_version(ModelVersion::fresh()),
        }
        let version = snapshot.model_version().clone();
        tracing::debug!(
            snapshot = %snapshot_id,
            ?direction,
            position,
            restored,
            version = %version,
            "history step"
        );
        Ok(Some(version))
    }

    /// Replace the active snapshot's model with an imported one and rename
    /// the document. Permitted even on a locked main.
    pub fn transact_import(
        &mut self,
        model: HydraulicModel,
        metadata: ModelMetadata,
        name: impl Into<String>,
    ) -> Result<ModelVersion, PersistError> {
        let snapshot_id = self.worktree.active_snapshot_id().clone();
        let snapshot = self.snapshot_mut(&snapshot_id)?;
        snapshot.reset(model);
        let version = snapshot.model_version().clone();
        self.simulation_cache.remove(&snapshot_id);
        self.document = DocumentMeta {
            name: name.into(),
            metadata,
        };
        tracing::info!(snapshot = %snapshot_id, document = %self.document.name, "model imported");
        Ok(version)
    }

    /// Install `worktree` with `snapshot_id` active. No snapshot contents change.
    pub fn apply_snapshot(
        &mut self,
        mut worktree: Worktree,
        snapshot_id: &SnapshotId,
    ) -> Result<(), PersistError> {
        worktree.set_active(snapshot_id).inspect_err(|err| {
            tracing::warn!(error = %err, "apply_snapshot aborted");
        })?;
        self.worktree = worktree;
        tracing::info!(snapshot = %snapshot_id, "snapshot applied");
        Ok(())
    }

    /// Deliver a finished (or running) simulation for `snapshot_id`.
    ///
    /// Results tagged with a version the snapshot has since moved past are
    /// dropped and reported as `Stale`. The snapshot need not be active.
    pub fn sync_snapshot_simulation(
        &mut self,
        snapshot_id: &SnapshotId,
        simulation: SimulationState,
    ) -> Result<SyncOutcome, PersistError> {
        let snapshot = self.snapshot_mut(snapshot_id)?;
        if simulation.is_outdated(snapshot.model_version()) {
            tracing::debug!(
                snapshot = %snapshot_id,
                current = %snapshot.model_version(),
                "discarding stale simulation result"
            );
            return Ok(SyncOutcome::Stale);
        }
        let position = snapshot.moment_log().cursor();
        snapshot.set_simulation(simulation.clone());
        if simulation.is_finished() {
            self.simulation_cache
                .entry(snapshot_id.clone())
                .or_default()
                .insert(position, simulation);
        }
        tracing::debug!(snapshot = %snapshot_id, position, "simulation synced");
        Ok(SyncOutcome::Accepted)
    }

    /// Drop per-snapshot ephemeral caches. The worktree is not touched.
    pub fn delete_snapshot_from_cache(&mut self, snapshot_id: &SnapshotId) {
        self.simulation_cache.remove(snapshot_id);
    }

    /// Branch a scenario off main. The active snapshot does not change.
    pub fn create_scenario(&mut self) -> ScenarioMeta {
        let (worktree, meta) = self
            .worktree
            .create_scenario_with(&self.config.scenario_name_prefix, Utc::now());
        self.worktree = worktree;
        tracing::info!(scenario = %meta.id, name = %meta.name, "scenario created");
        meta
    }

    pub fn switch_to_snapshot(&mut self, snapshot_id: &SnapshotId) -> Result<(), PersistError> {
        let (worktree, snapshot) = self
            .worktree
            .switch_to_snapshot(snapshot_id)
            .inspect_err(|err| tracing::warn!(error = %err, "switch aborted"))?;
        self.apply_snapshot(worktree, snapshot.id())
    }

    /// Switch back to the last scenario from main, or to main otherwise.
    pub fn toggle_scenario(&mut self) -> Result<SnapshotId, PersistError> {
        let target = self.worktree.toggle_target().clone();
        self.switch_to_snapshot(&target)?;
        Ok(target)
    }

    /// Delete a scenario and its caches. Returns the id active afterwards.
    pub fn delete_scenario(
        &mut self,
        scenario_id: &SnapshotId,
    ) -> Result<SnapshotId, PersistError> {
        let (worktree, active) = self
            .worktree
            .delete_scenario(scenario_id)
            .inspect_err(|err| tracing::warn!(error = %err, "delete aborted"))?;
        self.apply_snapshot(worktree, active.id())?;
        self.delete_snapshot_from_cache(scenario_id);
        tracing::info!(scenario = %scenario_id, "scenario deleted");
        Ok(active.id().clone())
    }

    pub fn rename_scenario(
        &mut self,
        scenario_id: &SnapshotId,
        name: impl Into<String>,
    ) -> Result<(), PersistError> {
        let name = name.into();
        self.worktree = self
            .worktree
            .rename_scenario(scenario_id, name.as_str())
            .inspect_err(|err| tracing::warn!(error = %err, "rename aborted"))?;
        tracing::info!(scenario = %scenario_id, %name, "scenario renamed");
        Ok(())
    }

    fn snapshot_mut(&mut self, snapshot_id: &SnapshotId) -> Result<&mut Snapshot, PersistError> {
        self.worktree
            .snapshot_mut(snapshot_id)
            .ok_or_else(|| PersistError::UnknownSnapshot(snapshot_id.clone()))
    }
}

impl Default for Persistence {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
