use aquifer_common::SnapshotId;

/// Errors from worktree operations and the persistence facade.
///
/// Every operation that returns one of these leaves the worktree and its
/// snapshots exactly as they were.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    #[error("snapshot {snapshot_id} is locked; edits must target a scenario")]
    LockedBranch { snapshot_id: SnapshotId },
    #[error("unknown snapshot {0}")]
    UnknownSnapshot(SnapshotId),
    #[error("snapshot {0} is not a scenario")]
    NotAScenario(SnapshotId),
    #[error("replaying the moment log of {snapshot_id} does not reproduce its model")]
    ReplayMismatch { snapshot_id: SnapshotId },
    #[error("cursor {cursor} of {snapshot_id} is past the end of its {len} log entries")]
    CursorOutOfRange {
        snapshot_id: SnapshotId,
        cursor: usize,
        len: usize,
    },
    #[error("scenario counter {counter} is behind existing scenario number {number}")]
    ScenarioCounterBehind { counter: u32, number: u32 },
}
