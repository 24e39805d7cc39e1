//! Shared identifiers for the aquifer editing engine.
//!
//! # Invariants
//! - The main snapshot id is a reserved constant; scenario ids never collide with it.
//! - A `ModelVersion` token is never reissued for a different model state.

mod types;

pub use types::{
    AssetId, CurveId, CustomerPointId, MAIN_SNAPSHOT_ID, ModelVersion, PatternId, SnapshotId,
};
