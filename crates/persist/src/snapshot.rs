use crate::error::PersistError;
use aquifer_author::{LogEntry, MomentLog};
use aquifer_common::{ModelVersion, SnapshotId};
use aquifer_kernel::{HydraulicModel, Moment, SimulationState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lock state of a snapshot. Only main ever becomes locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    #[default]
    Unlocked,
    Locked,
}

/// Direction of a history step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDirection {
    Undo,
    Redo,
}

/// The materialized state of one branch.
///
/// `base` is the model the log starts from: the imported model for main, the
/// branch point for a scenario. Models sit behind `Arc` and are replaced, never
/// mutated, so a changed model is always a different allocation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    id: SnapshotId,
    base: Arc<HydraulicModel>,
    model: Arc<HydraulicModel>,
    moment_log: MomentLog,
    model_version: ModelVersion,
    simulation: SimulationState,
    status: SnapshotStatus,
}

impl Snapshot {
    /// A snapshot whose history starts at `model`.
    pub fn new(id: SnapshotId, model: HydraulicModel, model_version: ModelVersion) -> Self {
        let model = Arc::new(model);
        Self {
            id,
            base: Arc::clone(&model),
            model,
            moment_log: MomentLog::new(),
            model_version,
            simulation: SimulationState::Idle,
            status: SnapshotStatus::Unlocked,
        }
    }

    /// Branch a new snapshot off `source`'s current model.
    ///
    /// The model is deep-copied so the branch shares no state with its source.
    pub fn branch_from(source: &Snapshot, id: SnapshotId) -> Self {
        let copy: HydraulicModel = (*source.model).clone();
        Self::new(id, copy, ModelVersion::fresh())
    }

    /// Rebuild a snapshot from a base model and a stored log, replaying the
    /// applied entries to materialize the current model.
    ///
    /// Every stored inverse must equal the one recomputed against the model it
    /// was recorded on, and undoing the applied entries must land back on
    /// `base`. Otherwise the log could not be walked and the load fails.
    pub(crate) fn from_log(
        id: SnapshotId,
        base: HydraulicModel,
        moment_log: MomentLog,
        model_version: ModelVersion,
    ) -> Result<Self, PersistError> {
        let mismatch = || PersistError::ReplayMismatch {
            snapshot_id: id.clone(),
        };
        let mut walked = base.clone();
        for entry in moment_log.entries() {
            if *entry.inverse != walked.invert_moment(&entry.moment) {
                return Err(mismatch());
            }
            walked = walked.apply_moment(&entry.moment);
        }
        let model = replay_onto(&base, moment_log.applied());
        let unwound = moment_log
            .applied()
            .iter()
            .rev()
            .fold(model.clone(), |model, entry| model.apply_moment(&entry.inverse));
        if unwound != base {
            return Err(mismatch());
        }
        Ok(Self {
            id,
            base: Arc::new(base),
            model: Arc::new(model),
            moment_log,
            model_version,
            simulation: SimulationState::Idle,
            status: SnapshotStatus::Unlocked,
        })
    }

    pub fn id(&self) -> &SnapshotId {
        &self.id
    }

    /// Current model.
    pub fn model(&self) -> &Arc<HydraulicModel> {
        &self.model
    }

    /// Model the log starts from.
    pub fn base(&self) -> &Arc<HydraulicModel> {
        &self.base
    }

    pub fn moment_log(&self) -> &MomentLog {
        &self.moment_log
    }

    pub fn model_version(&self) -> &ModelVersion {
        &self.model_version
    }

    pub fn simulation(&self) -> &SimulationState {
        &self.simulation
    }

    pub fn status(&self) -> SnapshotStatus {
        self.status
    }

    pub fn is_locked(&self) -> bool {
        self.status == SnapshotStatus::Locked
    }

    /// Whether the cached simulation was computed against an older model.
    pub fn is_simulation_outdated(&self) -> bool {
        self.simulation.is_outdated(&self.model_version)
    }

    /// Re-derive the current model from `base` and the applied log entries.
    pub fn replay(&self) -> HydraulicModel {
        replay_onto(&self.base, self.moment_log.applied())
    }

    /// Check that replaying the log reproduces the current model.
    pub fn verify_replay(&self) -> Result<(), PersistError> {
        if self.replay() == *self.model {
            Ok(())
        } else {
            Err(PersistError::ReplayMismatch {
                snapshot_id: self.id.clone(),
            })
        }
    }

    pub(crate) fn set_status(&mut self, status: SnapshotStatus) {
        self.status = status;
    }

    pub(crate) fn set_simulation(&mut self, simulation: SimulationState) {
        self.simulation = simulation;
    }

    pub(crate) fn set_model_version(&mut self, version: ModelVersion) {
        self.model_version = version;
    }

    /// Apply `moment`, log it with its inverse, and bump the model version.
    /// Lock checks are the caller's job.
    pub(crate) fn record(&mut self, moment: Moment) -> &ModelVersion {
        let inverse = self.model.invert_moment(&moment);
        self.model = Arc::new(self.model.apply_moment(&moment));
        self.moment_log.append(moment, inverse);
        self.model_version = ModelVersion::fresh();
        &self.model_version
    }

    /// Move one step through the log. Returns false at the boundary, in which
    /// case nothing changed. The caller decides the new model version.
    pub(crate) fn step(&mut self, direction: HistoryDirection) -> bool {
        let diff = match direction {
            HistoryDirection::Undo => self.moment_log.undo(),
            HistoryDirection::Redo => self.moment_log.redo(),
        };
        let Some(diff) = diff else {
            return false;
        };
        self.model = Arc::new(self.model.apply_moment(&diff));
        true
    }

    /// Start over from `model` with an empty log and no simulation.
    pub(crate) fn reset(&mut self, model: HydraulicModel) {
        let model = Arc::new(model);
        self.base = Arc::clone(&model);
        self.model = model;
        self.moment_log = MomentLog::new();
        self.model_version = ModelVersion::fresh();
        self.simulation = SimulationState::Idle;
    }
}

fn replay_onto(base: &HydraulicModel, entries: &[LogEntry]) -> HydraulicModel {
    entries
        .iter()
        .fold(base.clone(), |model, entry| model.apply_moment(&entry.moment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquifer_common::AssetId;
    use aquifer_kernel::Asset;

    fn add(id: u64) -> Moment {
        Moment::new(format!("add J{id}"))
            .put_asset(Asset::junction(AssetId(id), format!("J{id}")))
    }

    fn empty_main() -> Snapshot {
        Snapshot::new(SnapshotId::main(), HydraulicModel::new(), ModelVersion::initial())
    }

    #[test]
    fn new_snapshot_is_unlocked_and_idle() {
        let snap = empty_main();
        assert_eq!(snap.status(), SnapshotStatus::Unlocked);
        assert!(snap.simulation().is_idle());
        assert_eq!(snap.model_version().as_str(), "v0");
        assert!(Arc::ptr_eq(snap.model(), snap.base()));
    }

    #[test]
    fn record_replaces_model_and_bumps_version() {
        let mut snap = empty_main();
        let before = Arc::clone(snap.model());
        snap.record(add(1));
        assert!(!Arc::ptr_eq(&before, snap.model()));
        assert_eq!(snap.model().asset_count(), 1);
        assert_ne!(snap.model_version(), &ModelVersion::initial());
        assert_eq!(snap.moment_log().cursor(), 1);
    }

    #[test]
    fn step_walks_history() {
        let mut snap = empty_main();
        snap.record(add(1));
        snap.record(add(2));

        assert!(snap.step(HistoryDirection::Undo));
        assert_eq!(snap.model().asset_count(), 1);
        assert!(snap.step(HistoryDirection::Undo));
        assert_eq!(snap.model().asset_count(), 0);
        assert!(!snap.step(HistoryDirection::Undo));

        assert!(snap.step(HistoryDirection::Redo));
        assert!(snap.step(HistoryDirection::Redo));
        assert!(!snap.step(HistoryDirection::Redo));
        assert_eq!(snap.model().asset_count(), 2);
    }

    #[test]
    fn replay_matches_after_edits_and_undo() {
        let mut snap = empty_main();
        snap.record(add(1));
        snap.record(add(2));
        snap.record(Moment::new("drop J1").delete_asset(AssetId(1)));
        snap.step(HistoryDirection::Undo);
        snap.verify_replay().unwrap();
        assert_eq!(snap.replay(), **snap.model());
    }

    #[test]
    fn replay_mismatch_detected() {
        let mut snap = empty_main();
        snap.record(add(1));
        // Swap the model behind the log's back.
        snap.model = Arc::new(HydraulicModel::new());
        assert_eq!(
            snap.verify_replay(),
            Err(PersistError::ReplayMismatch {
                snapshot_id: SnapshotId::main()
            })
        );
    }

    #[test]
    fn branch_is_a_deep_copy() {
        let mut main = empty_main();
        main.record(add(1));
        let branch = Snapshot::branch_from(&main, SnapshotId::scenario());
        assert_eq!(**branch.model(), **main.model());
        assert!(!Arc::ptr_eq(branch.model(), main.model()));
        assert!(branch.moment_log().is_empty());
        assert_eq!(branch.moment_log().cursor(), 0);
    }

    #[test]
    fn reset_clears_history() {
        let mut snap = empty_main();
        snap.record(add(1));
        let imported = HydraulicModel::new()
            .apply_moment(&add(5))
            .apply_moment(&add(6));
        snap.reset(imported.clone());
        assert_eq!(**snap.model(), imported);
        assert!(snap.moment_log().is_empty());
        assert!(snap.simulation().is_idle());
        snap.verify_replay().unwrap();
    }

    #[test]
    fn from_log_rebuilds_model_at_cursor() {
        let mut snap = empty_main();
        snap.record(add(1));
        snap.record(add(2));
        snap.step(HistoryDirection::Undo);

        let rebuilt = Snapshot::from_log(
            SnapshotId::main(),
            HydraulicModel::new(),
            snap.moment_log().clone(),
            snap.model_version().clone(),
        )
        .unwrap();
        assert_eq!(**rebuilt.model(), **snap.model());
        assert!(rebuilt.moment_log().can_redo());
    }

    #[test]
    fn from_log_rejects_wrong_inverse() {
        let log = MomentLog::from_parts(
            vec![LogEntry {
                moment: Arc::new(add(1)),
                inverse: Arc::new(Moment::new("bogus")),
            }],
            1,
        )
        .unwrap();
        let err = Snapshot::from_log(
            SnapshotId::main(),
            HydraulicModel::new(),
            log,
            ModelVersion::initial(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            PersistError::ReplayMismatch {
                snapshot_id: SnapshotId::main()
            }
        );
    }

    #[test]
    fn from_log_checks_redo_future_too() {
        let mut snap = empty_main();
        snap.record(add(1));
        snap.record(add(2));
        let mut entries = snap.moment_log().entries().to_vec();
        entries[1].inverse = Arc::new(Moment::new("drop J1").delete_asset(AssetId(1)));
        let log = MomentLog::from_parts(entries, 1).unwrap();
        assert!(
            Snapshot::from_log(
                SnapshotId::main(),
                HydraulicModel::new(),
                log,
                ModelVersion::initial(),
            )
            .is_err()
        );
    }
}
