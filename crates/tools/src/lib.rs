//! Developer tooling: worktree inspector and a deterministic stand-in for the
//! simulation engine.
//!
//! # Invariants
//! - Tools only read engine state; they never mutate a worktree.

pub mod inspector;
pub mod topology;

pub use inspector::{ScenarioInfo, WorktreeInspector, WorktreeSummary};
pub use topology::TopologyRunner;
