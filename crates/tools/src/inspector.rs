use aquifer_common::SnapshotId;
use aquifer_persist::{Persistence, Snapshot, Worktree};

/// Worktree inspector for developer tooling.
///
/// Provides read-only queries against engine state for debugging and
/// development UI.
pub struct WorktreeInspector;

impl WorktreeInspector {
    /// Produce a summary of the whole worktree.
    pub fn summary(persistence: &Persistence) -> WorktreeSummary {
        let worktree = persistence.worktree();
        let active = worktree.active();
        WorktreeSummary {
            document: persistence.document().name.clone(),
            active: active.id().clone(),
            main_locked: worktree.is_main_locked(),
            scenario_count: worktree.scenarios().len(),
            asset_count: active.model().asset_count(),
            cursor: active.moment_log().cursor(),
            history_len: active.moment_log().len(),
            model_version: active.model_version().to_string(),
            simulation_outdated: active.is_simulation_outdated(),
        }
    }

    /// Scenarios in creation order, with per-branch state.
    pub fn list_scenarios(worktree: &Worktree) -> Vec<ScenarioInfo> {
        worktree
            .scenarios_in_order()
            .into_iter()
            .filter_map(|meta| {
                worktree.snapshot(&meta.id).map(|snapshot| ScenarioInfo {
                    id: meta.id.clone(),
                    name: meta.name.clone(),
                    number: meta.number,
                    active: worktree.active_snapshot_id() == &meta.id,
                    asset_count: snapshot.model().asset_count(),
                    edits: snapshot.moment_log().cursor(),
                })
            })
            .collect()
    }

    /// Notes of the applied moments of a snapshot, oldest first.
    pub fn history_notes(snapshot: &Snapshot) -> Vec<String> {
        snapshot
            .moment_log()
            .applied()
            .iter()
            .map(|entry| entry.moment.note.clone())
            .collect()
    }
}

/// Summary of engine state for the inspector.
#[derive(Debug, Clone)]
pub struct WorktreeSummary {
    pub document: String,
    pub active: SnapshotId,
    pub main_locked: bool,
    pub scenario_count: usize,
    pub asset_count: usize,
    pub cursor: usize,
    pub history_len: usize,
    pub model_version: String,
    pub simulation_outdated: bool,
}

impl std::fmt::Display for WorktreeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: active={} main_locked={} scenarios={} assets={} history={}/{} version={}{}",
            self.document,
            self.active,
            self.main_locked,
            self.scenario_count,
            self.asset_count,
            self.cursor,
            self.history_len,
            self.model_version,
            if self.simulation_outdated { " (simulation outdated)" } else { "" },
        )
    }
}

/// One row of the scenario listing.
#[derive(Debug, Clone)]
pub struct ScenarioInfo {
    pub id: SnapshotId,
    pub name: String,
    pub number: u32,
    pub active: bool,
    pub asset_count: usize,
    pub edits: usize,
}

impl std::fmt::Display for ScenarioInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} [{}] assets={} edits={}",
            if self.active { "*" } else { " " },
            self.name,
            self.id,
            self.asset_count,
            self.edits,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquifer_common::AssetId;
    use aquifer_kernel::{Asset, Moment};
    use aquifer_persist::TransactOptions;

    fn add(p: &mut Persistence, id: u64) {
        p.transact(
            Moment::new(format!("add J{id}"))
                .put_asset(Asset::junction(AssetId(id), format!("J{id}"))),
            TransactOptions::default(),
        )
        .unwrap();
    }

    #[test]
    fn summary_empty_document() {
        let p = Persistence::default();
        let summary = WorktreeInspector::summary(&p);
        assert!(summary.active.is_main());
        assert_eq!(summary.asset_count, 0);
        assert_eq!(summary.history_len, 0);
        assert!(!summary.main_locked);
        assert_eq!(summary.model_version, "v0");
    }

    #[test]
    fn summary_display() {
        let mut p = Persistence::default();
        add(&mut p, 1);
        p.create_scenario();
        let s = format!("{}", WorktreeInspector::summary(&p));
        assert!(s.contains("main_locked=true"));
        assert!(s.contains("history=1/1"));
    }

    #[test]
    fn list_scenarios_marks_active() {
        let mut p = Persistence::default();
        add(&mut p, 1);
        let first = p.create_scenario();
        let second = p.create_scenario();
        p.switch_to_snapshot(&second.id).unwrap();
        add(&mut p, 2);

        let rows = WorktreeInspector::list_scenarios(p.worktree());
        assert_eq!(rows.len(), 2);
        let by_id = |id: &SnapshotId| rows.iter().find(|r| &r.id == id).unwrap();
        assert!(!by_id(&first.id).active);
        assert!(by_id(&second.id).active);
        assert_eq!(by_id(&second.id).asset_count, 2);
        assert_eq!(by_id(&second.id).edits, 1);
        assert!(format!("{}", by_id(&second.id)).starts_with('*'));
    }

    #[test]
    fn history_notes_follow_cursor() {
        let mut p = Persistence::default();
        add(&mut p, 1);
        add(&mut p, 2);
        p.history_control(
            aquifer_persist::HistoryDirection::Undo,
            aquifer_persist::HistoryOptions::default(),
        )
        .unwrap();
        assert_eq!(WorktreeInspector::history_notes(p.active()), vec!["add J1"]);
    }
}
