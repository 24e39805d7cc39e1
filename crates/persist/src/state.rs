//! Serializable worktree layout.
//!
//! Only the base model and the moment sequence of each snapshot are stored;
//! current models are rebuilt by replay on load. Simulation caches are
//! ephemeral and never stored.

use crate::error::PersistError;
use crate::snapshot::Snapshot;
use crate::worktree::{ScenarioMeta, Worktree};
use aquifer_author::{LogEntry, MomentLog};
use aquifer_common::{ModelVersion, SnapshotId};
use aquifer_kernel::{HydraulicModel, Moment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub moment: Moment,
    pub inverse: Moment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub id: SnapshotId,
    pub model_version: ModelVersion,
    pub base: HydraulicModel,
    pub moments: Vec<PersistedEntry>,
    pub cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedWorktree {
    pub main_id: SnapshotId,
    pub active_snapshot_id: SnapshotId,
    pub snapshots: Vec<PersistedSnapshot>,
    pub scenarios: Vec<ScenarioMeta>,
    pub highest_scenario_number: u32,
    pub last_active_scenario_id: Option<SnapshotId>,
}

impl PersistedWorktree {
    pub fn from_worktree(worktree: &Worktree) -> Self {
        let snapshots = worktree
            .snapshots()
            .values()
            .map(|snapshot| PersistedSnapshot {
                id: snapshot.id().clone(),
                model_version: snapshot.model_version().clone(),
                base: (**snapshot.base()).clone(),
                moments: snapshot
                    .moment_log()
                    .entries()
                    .iter()
                    .map(|entry| PersistedEntry {
                        moment: (*entry.moment).clone(),
                        inverse: (*entry.inverse).clone(),
                    })
                    .collect(),
                cursor: snapshot.moment_log().cursor(),
            })
            .collect();
        Self {
            main_id: worktree.main_id().clone(),
            active_snapshot_id: worktree.active_snapshot_id().clone(),
            snapshots,
            scenarios: worktree
                .scenarios_in_order()
                .into_iter()
                .cloned()
                .collect(),
            highest_scenario_number: worktree.highest_scenario_number(),
            last_active_scenario_id: worktree.last_active_scenario_id().cloned(),
        }
    }

    /// Rebuild the worktree by replaying each snapshot's moments up to its cursor.
    ///
    /// Fails with `ReplayMismatch` when a stored inverse does not undo its
    /// moment, and with `ScenarioCounterBehind` when the stored counter would
    /// hand out a number already taken.
    pub fn into_worktree(self) -> Result<Worktree, PersistError> {
        let mut snapshots = BTreeMap::new();
        for stored in self.snapshots {
            let len = stored.moments.len();
            let entries = stored
                .moments
                .into_iter()
                .map(|entry| LogEntry {
                    moment: Arc::new(entry.moment),
                    inverse: Arc::new(entry.inverse),
                })
                .collect();
            let log = MomentLog::from_parts(entries, stored.cursor).ok_or_else(|| {
                PersistError::CursorOutOfRange {
                    snapshot_id: stored.id.clone(),
                    cursor: stored.cursor,
                    len,
                }
            })?;
            let snapshot =
                Snapshot::from_log(stored.id.clone(), stored.base, log, stored.model_version)?;
            snapshots.insert(stored.id, snapshot);
        }
        let scenarios = self
            .scenarios
            .into_iter()
            .map(|meta| (meta.id.clone(), meta))
            .collect();
        Worktree::from_parts(
            self.main_id,
            snapshots,
            self.active_snapshot_id,
            scenarios,
            self.last_active_scenario_id,
            self.highest_scenario_number,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{HistoryOptions, Persistence, TransactOptions};
    use crate::snapshot::HistoryDirection;
    use aquifer_common::AssetId;
    use aquifer_kernel::Asset;

    fn add_junction(id: u64) -> Moment {
        Moment::new(format!("add J{id}"))
            .put_asset(Asset::junction(AssetId(id), format!("J{id}")))
    }

    fn edited() -> Persistence {
        let mut p = Persistence::default();
        p.transact(add_junction(1), TransactOptions::default()).unwrap();
        p.transact(add_junction(2), TransactOptions::default()).unwrap();
        let scenario = p.create_scenario();
        p.switch_to_snapshot(&scenario.id).unwrap();
        p.transact(add_junction(3), TransactOptions::default()).unwrap();
        p.transact(add_junction(4), TransactOptions::default()).unwrap();
        p.history_control(HistoryDirection::Undo, HistoryOptions::default())
            .unwrap();
        p
    }

    #[test]
    fn round_trip_rebuilds_models_and_cursors() {
        let p = edited();
        let stored = PersistedWorktree::from_worktree(p.worktree());
        let rebuilt = stored.clone().into_worktree().unwrap();

        assert_eq!(rebuilt.active_snapshot_id(), p.worktree().active_snapshot_id());
        assert!(rebuilt.is_main_locked());
        assert_eq!(rebuilt.highest_scenario_number(), 1);
        for (id, original) in p.worktree().snapshots() {
            let restored = rebuilt.snapshot(id).unwrap();
            assert_eq!(**restored.model(), **original.model());
            assert_eq!(restored.moment_log().cursor(), original.moment_log().cursor());
            assert_eq!(restored.moment_log().len(), original.moment_log().len());
            assert_eq!(restored.model_version(), original.model_version());
            assert!(restored.simulation().is_idle());
        }
        assert_eq!(PersistedWorktree::from_worktree(&rebuilt), stored);
    }

    #[test]
    fn cursor_past_end_is_rejected() {
        let mut stored = PersistedWorktree::from_worktree(edited().worktree());
        stored.snapshots[0].cursor = 99;
        assert!(matches!(
            stored.into_worktree(),
            Err(PersistError::CursorOutOfRange { cursor: 99, .. })
        ));
    }

    #[test]
    fn missing_active_snapshot_is_rejected() {
        let mut stored = PersistedWorktree::from_worktree(edited().worktree());
        stored.active_snapshot_id = SnapshotId("ghost".into());
        assert!(matches!(
            stored.into_worktree(),
            Err(PersistError::UnknownSnapshot(_))
        ));
    }

    #[test]
    fn lock_is_rederived_not_stored() {
        let mut stored = PersistedWorktree::from_worktree(edited().worktree());
        stored.scenarios.clear();
        let main_id = stored.main_id.clone();
        stored.snapshots.retain(|s| s.id == main_id);
        stored.active_snapshot_id = main_id;
        let rebuilt = stored.into_worktree().unwrap();
        assert!(!rebuilt.is_main_locked());
        assert!(rebuilt.last_active_scenario_id().is_none());
    }

    fn stored_snapshot<'a>(
        stored: &'a mut PersistedWorktree,
        id: &SnapshotId,
    ) -> &'a mut PersistedSnapshot {
        stored.snapshots.iter_mut().find(|s| &s.id == id).unwrap()
    }

    #[test]
    fn wrong_inverse_fails_on_load() {
        let mut stored = PersistedWorktree::from_worktree(edited().worktree());
        let main = stored_snapshot(&mut stored, &SnapshotId::main());
        main.moments[0].inverse = Moment::new("bogus");
        assert_eq!(
            stored.into_worktree().unwrap_err(),
            PersistError::ReplayMismatch {
                snapshot_id: SnapshotId::main()
            }
        );
    }

    #[test]
    fn wrong_inverse_in_redo_future_fails_on_load() {
        let p = edited();
        let scenario_id = p.worktree().active_snapshot_id().clone();
        let mut stored = PersistedWorktree::from_worktree(p.worktree());
        let snapshot = stored_snapshot(&mut stored, &scenario_id);
        assert_eq!(snapshot.cursor, 1);
        snapshot.moments[1].inverse = Moment::new("bogus");
        assert!(matches!(
            stored.into_worktree(),
            Err(PersistError::ReplayMismatch { snapshot_id }) if snapshot_id == scenario_id
        ));
    }

    #[test]
    fn counter_behind_scenario_numbers_is_rejected() {
        let mut stored = PersistedWorktree::from_worktree(edited().worktree());
        stored.highest_scenario_number = 0;
        assert_eq!(
            stored.into_worktree().unwrap_err(),
            PersistError::ScenarioCounterBehind {
                counter: 0,
                number: 1
            }
        );
    }

    #[test]
    fn loaded_counter_keeps_numbers_unique() {
        let stored = PersistedWorktree::from_worktree(edited().worktree());
        let (worktree, created) = stored.into_worktree().unwrap().create_scenario();
        assert_eq!(created.number, 2);
        assert_eq!(created.name, "Scenario #2");
        let mut numbers: Vec<_> = worktree.scenarios().values().map(|m| m.number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        assert_eq!(numbers.len(), 2);
    }
}
