//! The worktree: main plus scenario snapshots, and the pure operations over it.
//!
//! Operations take `&self` and return a new `Worktree`; the caller decides
//! when to commit it. A failed operation returns an error and no worktree.

use crate::config::DEFAULT_SCENARIO_PREFIX;
use crate::error::PersistError;
use crate::snapshot::{Snapshot, SnapshotStatus};
use aquifer_common::{ModelVersion, SnapshotId};
use aquifer_kernel::HydraulicModel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Naming and ordering metadata of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioMeta {
    pub id: SnapshotId,
    pub name: String,
    /// Allocation number used for default naming; never reused.
    pub number: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Worktree {
    main_id: SnapshotId,
    snapshots: BTreeMap<SnapshotId, Snapshot>,
    active_snapshot_id: SnapshotId,
    scenarios: BTreeMap<SnapshotId, ScenarioMeta>,
    last_active_scenario_id: Option<SnapshotId>,
    highest_scenario_number: u32,
}

impl Worktree {
    /// A worktree holding only an unlocked main at the initial version.
    pub fn new(model: HydraulicModel) -> Self {
        let main_id = SnapshotId::main();
        let main = Snapshot::new(main_id.clone(), model, ModelVersion::initial());
        Self {
            snapshots: BTreeMap::from([(main_id.clone(), main)]),
            active_snapshot_id: main_id.clone(),
            main_id,
            scenarios: BTreeMap::new(),
            last_active_scenario_id: None,
            highest_scenario_number: 0,
        }
    }

    /// Assemble a worktree from stored parts, validating ids and re-deriving
    /// the main lock.
    pub(crate) fn from_parts(
        main_id: SnapshotId,
        snapshots: BTreeMap<SnapshotId, Snapshot>,
        active_snapshot_id: SnapshotId,
        scenarios: BTreeMap<SnapshotId, ScenarioMeta>,
        last_active_scenario_id: Option<SnapshotId>,
        highest_scenario_number: u32,
    ) -> Result<Self, PersistError> {
        if !snapshots.contains_key(&main_id) {
            return Err(PersistError::UnknownSnapshot(main_id));
        }
        if !snapshots.contains_key(&active_snapshot_id) {
            return Err(PersistError::UnknownSnapshot(active_snapshot_id));
        }
        if let Some(missing) = scenarios.keys().find(|id| !snapshots.contains_key(*id)) {
            return Err(PersistError::UnknownSnapshot(missing.clone()));
        }
        if scenarios.contains_key(&main_id) {
            return Err(PersistError::NotAScenario(main_id));
        }
        if let Some(orphan) = snapshots
            .keys()
            .find(|id| **id != main_id && !scenarios.contains_key(*id))
        {
            return Err(PersistError::UnknownSnapshot(orphan.clone()));
        }
        if let Some(number) = scenarios
            .values()
            .map(|meta| meta.number)
            .max()
            .filter(|number| *number > highest_scenario_number)
        {
            return Err(PersistError::ScenarioCounterBehind {
                counter: highest_scenario_number,
                number,
            });
        }
        let mut worktree = Self {
            main_id,
            snapshots,
            active_snapshot_id,
            scenarios,
            last_active_scenario_id: None,
            highest_scenario_number,
        };
        worktree.last_active_scenario_id =
            last_active_scenario_id.filter(|id| worktree.scenarios.contains_key(id));
        worktree.sync_main_lock();
        Ok(worktree)
    }

    pub fn main_id(&self) -> &SnapshotId {
        &self.main_id
    }

    pub fn main(&self) -> &Snapshot {
        &self.snapshots[&self.main_id]
    }

    pub fn active_snapshot_id(&self) -> &SnapshotId {
        &self.active_snapshot_id
    }

    pub fn active(&self) -> &Snapshot {
        &self.snapshots[&self.active_snapshot_id]
    }

    pub fn snapshot(&self, id: &SnapshotId) -> Option<&Snapshot> {
        self.snapshots.get(id)
    }

    pub fn snapshots(&self) -> &BTreeMap<SnapshotId, Snapshot> {
        &self.snapshots
    }

    pub fn scenario(&self, id: &SnapshotId) -> Option<&ScenarioMeta> {
        self.scenarios.get(id)
    }

    pub fn scenarios(&self) -> &BTreeMap<SnapshotId, ScenarioMeta> {
        &self.scenarios
    }

    /// Scenarios in creation order.
    pub fn scenarios_in_order(&self) -> Vec<&ScenarioMeta> {
        let mut ordered: Vec<_> = self.scenarios.values().collect();
        ordered.sort_by_key(|meta| (meta.created_at, meta.number));
        ordered
    }

    pub fn last_active_scenario_id(&self) -> Option<&SnapshotId> {
        self.last_active_scenario_id.as_ref()
    }

    pub fn highest_scenario_number(&self) -> u32 {
        self.highest_scenario_number
    }

    pub fn is_main_active(&self) -> bool {
        self.active_snapshot_id == self.main_id
    }

    pub fn is_main_locked(&self) -> bool {
        self.main().is_locked()
    }

    /// Main is locked exactly when at least one scenario exists.
    pub fn lock_invariant_holds(&self) -> bool {
        self.is_main_locked() == !self.scenarios.is_empty()
    }

    /// Where a "toggle" should go: back to the last scenario when on main and
    /// it still exists, otherwise to main.
    pub fn toggle_target(&self) -> &SnapshotId {
        match &self.last_active_scenario_id {
            Some(id) if self.is_main_active() && self.scenarios.contains_key(id) => id,
            _ => &self.main_id,
        }
    }

    /// Branch a new scenario off main with the default name prefix.
    pub fn create_scenario(&self) -> (Worktree, ScenarioMeta) {
        self.create_scenario_with(DEFAULT_SCENARIO_PREFIX, Utc::now())
    }

    /// Branch a new scenario off main's current model, named
    /// `"{prefix} #{n}"`. Locks main. The active snapshot is unchanged.
    pub fn create_scenario_with(
        &self,
        prefix: &str,
        created_at: DateTime<Utc>,
    ) -> (Worktree, ScenarioMeta) {
        let mut next = self.clone();
        let number = next.highest_scenario_number + 1;
        let id = SnapshotId::scenario();
        let meta = ScenarioMeta {
            id: id.clone(),
            name: format!("{prefix} #{number}"),
            number,
            created_at,
        };
        let snapshot = Snapshot::branch_from(next.main(), id.clone());
        next.snapshots.insert(id.clone(), snapshot);
        next.scenarios.insert(id, meta.clone());
        next.highest_scenario_number = number;
        next.sync_main_lock();
        (next, meta)
    }

    /// Make `snapshot_id` active. Leaving a scenario records it as the last
    /// active scenario.
    pub fn switch_to_snapshot(
        &self,
        snapshot_id: &SnapshotId,
    ) -> Result<(Worktree, Snapshot), PersistError> {
        let target = self
            .snapshots
            .get(snapshot_id)
            .ok_or_else(|| PersistError::UnknownSnapshot(snapshot_id.clone()))?
            .clone();
        let mut next = self.clone();
        if next.active_snapshot_id != *snapshot_id
            && next.scenarios.contains_key(&next.active_snapshot_id)
        {
            next.last_active_scenario_id = Some(next.active_snapshot_id.clone());
        }
        next.active_snapshot_id = snapshot_id.clone();
        Ok((next, target))
    }

    /// Remove a scenario. If it was active, main becomes active. Unlocks main
    /// when no scenarios remain. Returns the snapshot active afterwards.
    pub fn delete_scenario(
        &self,
        scenario_id: &SnapshotId,
    ) -> Result<(Worktree, Snapshot), PersistError> {
        self.require_scenario(scenario_id)?;
        let mut next = self.clone();
        next.snapshots.remove(scenario_id);
        next.scenarios.remove(scenario_id);
        if next.active_snapshot_id == *scenario_id {
            next.active_snapshot_id = next.main_id.clone();
        }
        if next.last_active_scenario_id.as_ref() == Some(scenario_id) {
            next.last_active_scenario_id = None;
        }
        next.sync_main_lock();
        let active = next.active().clone();
        Ok((next, active))
    }

    /// Change a scenario's display name only.
    pub fn rename_scenario(
        &self,
        scenario_id: &SnapshotId,
        name: impl Into<String>,
    ) -> Result<Worktree, PersistError> {
        self.require_scenario(scenario_id)?;
        let mut next = self.clone();
        if let Some(meta) = next.scenarios.get_mut(scenario_id) {
            meta.name = name.into();
        }
        Ok(next)
    }

    pub(crate) fn snapshot_mut(&mut self, id: &SnapshotId) -> Option<&mut Snapshot> {
        self.snapshots.get_mut(id)
    }

    pub(crate) fn set_active(&mut self, snapshot_id: &SnapshotId) -> Result<(), PersistError> {
        if !self.snapshots.contains_key(snapshot_id) {
            return Err(PersistError::UnknownSnapshot(snapshot_id.clone()));
        }
        self.active_snapshot_id = snapshot_id.clone();
        Ok(())
    }

    fn require_scenario(&self, id: &SnapshotId) -> Result<(), PersistError> {
        if *id == self.main_id {
            return Err(PersistError::NotAScenario(id.clone()));
        }
        if !self.scenarios.contains_key(id) {
            return Err(PersistError::UnknownSnapshot(id.clone()));
        }
        Ok(())
    }

    fn sync_main_lock(&mut self) {
        let status = if self.scenarios.is_empty() {
            SnapshotStatus::Unlocked
        } else {
            SnapshotStatus::Locked
        };
        if let Some(main) = self.snapshots.get_mut(&self.main_id) {
            main.set_status(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquifer_common::AssetId;
    use aquifer_kernel::{Asset, Moment};
    use chrono::Duration;

    fn model_with(ids: &[u64]) -> HydraulicModel {
        ids.iter().fold(HydraulicModel::new(), |m, id| {
            let junction = Asset::junction(AssetId(*id), format!("J{id}"));
            m.apply_moment(&Moment::new("add").put_asset(junction))
        })
    }

    #[test]
    fn new_worktree_has_only_unlocked_main() {
        let wt = Worktree::new(HydraulicModel::new());
        assert_eq!(wt.snapshots().len(), 1);
        assert!(wt.is_main_active());
        assert!(!wt.is_main_locked());
        assert!(wt.lock_invariant_holds());
        assert_eq!(wt.highest_scenario_number(), 0);
    }

    #[test]
    fn create_scenario_locks_main_and_copies_model() {
        let wt = Worktree::new(model_with(&[1]));
        let (wt, meta) = wt.create_scenario();
        assert_eq!(meta.name, "Scenario #1");
        assert_eq!(meta.number, 1);
        assert!(wt.is_main_locked());
        assert!(wt.is_main_active());
        assert!(wt.lock_invariant_holds());

        let scenario = wt.snapshot(&meta.id).unwrap();
        assert_eq!(**scenario.model(), **wt.main().model());
        assert_eq!(scenario.moment_log().cursor(), 0);
        assert!(scenario.moment_log().is_empty());
        assert!(!scenario.is_locked());
    }

    #[test]
    fn create_scenario_is_pure() {
        let wt = Worktree::new(HydraulicModel::new());
        let (_next, _) = wt.create_scenario();
        assert!(wt.scenarios().is_empty());
        assert!(!wt.is_main_locked());
    }

    #[test]
    fn scenario_numbers_never_reused() {
        let wt = Worktree::new(HydraulicModel::new());
        let (wt, first) = wt.create_scenario();
        let (wt, second) = wt.create_scenario();
        let (wt, _) = wt.delete_scenario(&second.id).unwrap();
        let (wt, third) = wt.create_scenario();
        assert_eq!(first.number, 1);
        assert_eq!(third.number, 3);
        assert_eq!(third.name, "Scenario #3");
        assert_eq!(wt.highest_scenario_number(), 3);
    }

    #[test]
    fn custom_prefix_used_for_names() {
        let wt = Worktree::new(HydraulicModel::new());
        let (_, meta) = wt.create_scenario_with("Variant", Utc::now());
        assert_eq!(meta.name, "Variant #1");
    }

    #[test]
    fn switch_records_last_active_scenario() {
        let wt = Worktree::new(HydraulicModel::new());
        let (wt, meta) = wt.create_scenario();
        let (wt, snap) = wt.switch_to_snapshot(&meta.id).unwrap();
        assert_eq!(snap.id(), &meta.id);
        assert_eq!(wt.active_snapshot_id(), &meta.id);
        assert!(wt.last_active_scenario_id().is_none());

        let main_id = wt.main_id().clone();
        let (wt, _) = wt.switch_to_snapshot(&main_id).unwrap();
        assert_eq!(wt.last_active_scenario_id(), Some(&meta.id));
        assert_eq!(wt.toggle_target(), &meta.id);
    }

    #[test]
    fn switch_to_unknown_is_error() {
        let wt = Worktree::new(HydraulicModel::new());
        let bogus = SnapshotId("nope".into());
        assert_eq!(
            wt.switch_to_snapshot(&bogus).unwrap_err(),
            PersistError::UnknownSnapshot(bogus)
        );
    }

    #[test]
    fn delete_active_scenario_falls_back_to_main_and_unlocks() {
        let wt = Worktree::new(HydraulicModel::new());
        let (wt, meta) = wt.create_scenario();
        let (wt, _) = wt.switch_to_snapshot(&meta.id).unwrap();
        let (wt, active) = wt.delete_scenario(&meta.id).unwrap();
        assert!(active.id().is_main());
        assert!(wt.is_main_active());
        assert!(!wt.is_main_locked());
        assert!(wt.lock_invariant_holds());
        assert!(wt.snapshot(&meta.id).is_none());
    }

    #[test]
    fn delete_one_of_two_keeps_lock() {
        let wt = Worktree::new(HydraulicModel::new());
        let (wt, a) = wt.create_scenario();
        let (wt, b) = wt.create_scenario();
        let (wt, _) = wt.switch_to_snapshot(&b.id).unwrap();
        let (wt, _) = wt.switch_to_snapshot(&a.id).unwrap();
        assert_eq!(wt.last_active_scenario_id(), Some(&b.id));

        let (wt, active) = wt.delete_scenario(&b.id).unwrap();
        assert_eq!(active.id(), &a.id);
        assert!(wt.is_main_locked());
        assert!(wt.last_active_scenario_id().is_none());
    }

    #[test]
    fn delete_main_is_rejected() {
        let wt = Worktree::new(HydraulicModel::new());
        let (wt, _) = wt.create_scenario();
        let main_id = wt.main_id().clone();
        assert_eq!(
            wt.delete_scenario(&main_id).unwrap_err(),
            PersistError::NotAScenario(main_id)
        );
    }

    #[test]
    fn rename_only_touches_meta() {
        let wt = Worktree::new(model_with(&[1]));
        let (wt, meta) = wt.create_scenario();
        let renamed = wt.rename_scenario(&meta.id, "Fire flow").unwrap();
        assert_eq!(renamed.scenario(&meta.id).unwrap().name, "Fire flow");
        assert_eq!(renamed.scenario(&meta.id).unwrap().number, 1);
        assert!(renamed.is_main_locked());
        assert_eq!(
            renamed.snapshot(&meta.id).unwrap().model_version(),
            wt.snapshot(&meta.id).unwrap().model_version()
        );
    }

    #[test]
    fn rename_unknown_or_main_is_error() {
        let wt = Worktree::new(HydraulicModel::new());
        let main_id = wt.main_id().clone();
        assert!(matches!(
            wt.rename_scenario(&main_id, "x"),
            Err(PersistError::NotAScenario(_))
        ));
        assert!(matches!(
            wt.rename_scenario(&SnapshotId("ghost".into()), "x"),
            Err(PersistError::UnknownSnapshot(_))
        ));
    }

    #[test]
    fn scenarios_listed_in_creation_order() {
        let t0 = Utc::now();
        let wt = Worktree::new(HydraulicModel::new());
        let (wt, late) = wt.create_scenario_with("S", t0 + Duration::seconds(10));
        let (wt, early) = wt.create_scenario_with("S", t0);
        let order: Vec<_> = wt.scenarios_in_order().iter().map(|m| m.id.clone()).collect();
        assert_eq!(order, vec![early.id, late.id]);
    }

    #[test]
    fn toggle_target_defaults_to_main() {
        let wt = Worktree::new(HydraulicModel::new());
        assert!(wt.toggle_target().is_main());
    }
}
