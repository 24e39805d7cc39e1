use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Reserved identifier of the main snapshot.
pub const MAIN_SNAPSHOT_ID: &str = "main";

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a network asset (junction, pipe, tank, pump, ...).
    AssetId
);
numeric_id!(
    /// Identifier of a pump/valve curve.
    CurveId
);
numeric_id!(
    /// Identifier of a demand pattern.
    PatternId
);
numeric_id!(
    /// Identifier of a customer demand point.
    CustomerPointId
);

/// Identity of a branch in the worktree: the main line or a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    /// The reserved main snapshot id.
    pub fn main() -> Self {
        Self(MAIN_SNAPSHOT_ID.to_string())
    }

    /// Allocate a fresh scenario id.
    pub fn scenario() -> Self {
        Self(format!("scenario-{}", Uuid::new_v4().simple()))
    }

    pub fn is_main(&self) -> bool {
        self.0 == MAIN_SNAPSHOT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token identifying one model state of one snapshot.
///
/// Bumped on every successful mutation. Derived data (simulation results) is
/// tagged with the version it was computed from and is stale once the tags differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelVersion(pub String);

impl ModelVersion {
    /// Version of a freshly created, never-edited document.
    pub fn initial() -> Self {
        Self("v0".to_string())
    }

    /// A token that has never been issued before.
    pub fn fresh() -> Self {
        Self(format!("v-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModelVersion {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_ids_are_unique_and_not_main() {
        let a = SnapshotId::scenario();
        let b = SnapshotId::scenario();
        assert_ne!(a, b);
        assert!(!a.is_main());
        assert!(SnapshotId::main().is_main());
    }

    #[test]
    fn fresh_versions_never_repeat() {
        let a = ModelVersion::fresh();
        let b = ModelVersion::fresh();
        assert_ne!(a, b);
        assert_ne!(a, ModelVersion::initial());
    }

    #[test]
    fn initial_version_is_v0() {
        assert_eq!(ModelVersion::default().as_str(), "v0");
    }
}
