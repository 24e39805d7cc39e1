//! Model kernel: the hydraulic network model, moments (atomic edits) and the
//! simulation seam.
//!
//! # Invariants
//! - Models are persistent by convention: applying a moment yields a new model
//!   and leaves the input untouched.
//! - A moment applied to the model it was inverted against, followed by its
//!   inverse, reproduces that model exactly.

pub mod model;
pub mod moment;
pub mod simulation;

pub use model::{
    Asset, AssetKind, CustomerPoint, Curve, FlowUnits, HeadlossFormula, HydraulicModel,
    LinkStatus, ModelMetadata, Pattern, ValveType,
};
pub use moment::Moment;
pub use simulation::{SimulationResult, SimulationRunner, SimulationState, SimulationStatus};
