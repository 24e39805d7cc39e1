//! Persistence: snapshots, the scenario worktree, the transactional facade,
//! and the file-backed document store.
//!
//! # Invariants
//! - Main is locked if and only if at least one scenario exists.
//! - The active snapshot id always names an existing snapshot.
//! - A scenario starts as a structural copy of main at creation time and never
//!   sees main's later edits.
//! - Replaying a snapshot's applied moments onto its base reproduces its model.
//! - A simulation result is only accepted while its version tag still matches
//!   the target snapshot.

pub mod config;
pub mod error;
pub mod persistence;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod worktree;

pub use config::{ConfigError, DEFAULT_SCENARIO_PREFIX, EngineConfig};
pub use error::PersistError;
pub use persistence::{
    DocumentMeta, HistoryOptions, Persistence, SyncOutcome, TransactOptions,
};
pub use snapshot::{HistoryDirection, Snapshot, SnapshotStatus};
pub use state::{PersistedEntry, PersistedSnapshot, PersistedWorktree};
pub use store::{RevisionChain, RevisionLink, StoreError, StoreMeta, WorktreeStore};
pub use worktree::{ScenarioMeta, Worktree};
