use crate::moment::Moment;
use aquifer_common::{AssetId, CurveId, CustomerPointId, PatternId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Open/closed state of a link asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkStatus {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValveType {
    PressureReducing,
    PressureSustaining,
    FlowControl,
    ThrottleControl,
}

/// Kind-specific properties of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssetKind {
    Junction {
        elevation: f64,
        base_demand: f64,
        pattern: Option<PatternId>,
    },
    Reservoir {
        head: f64,
    },
    Tank {
        elevation: f64,
        initial_level: f64,
        min_level: f64,
        max_level: f64,
        diameter: f64,
    },
    Pipe {
        connections: [AssetId; 2],
        length: f64,
        diameter: f64,
        roughness: f64,
        status: LinkStatus,
    },
    Pump {
        connections: [AssetId; 2],
        curve: Option<CurveId>,
        status: LinkStatus,
    },
    Valve {
        connections: [AssetId; 2],
        valve_type: ValveType,
        setting: f64,
        status: LinkStatus,
    },
}

/// A node or link of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub label: String,
    pub kind: AssetKind,
}

impl Asset {
    /// A junction at zero elevation with no demand.
    pub fn junction(id: AssetId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            kind: AssetKind::Junction {
                elevation: 0.0,
                base_demand: 0.0,
                pattern: None,
            },
        }
    }

    pub fn reservoir(id: AssetId, label: impl Into<String>, head: f64) -> Self {
        Self {
            id,
            label: label.into(),
            kind: AssetKind::Reservoir { head },
        }
    }

    /// An open 100 m pipe with default diameter and roughness.
    pub fn pipe(id: AssetId, label: impl Into<String>, start: AssetId, end: AssetId) -> Self {
        Self {
            id,
            label: label.into(),
            kind: AssetKind::Pipe {
                connections: [start, end],
                length: 100.0,
                diameter: 300.0,
                roughness: 130.0,
                status: LinkStatus::Open,
            },
        }
    }

    /// Endpoints if this asset is a link.
    pub fn connections(&self) -> Option<[AssetId; 2]> {
        match &self.kind {
            AssetKind::Pipe { connections, .. }
            | AssetKind::Pump { connections, .. }
            | AssetKind::Valve { connections, .. } => Some(*connections),
            AssetKind::Junction { .. } | AssetKind::Reservoir { .. } | AssetKind::Tank { .. } => {
                None
            }
        }
    }

    pub fn is_link(&self) -> bool {
        self.connections().is_some()
    }

    pub fn is_node(&self) -> bool {
        !self.is_link()
    }
}

/// A pump head or valve curve as (x, y) points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub id: CurveId,
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

/// A time pattern of demand multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub label: String,
    pub multipliers: Vec<f64>,
}

/// A metered demand point, optionally allocated to a pipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerPoint {
    pub id: CustomerPointId,
    pub coordinates: [f64; 2],
    pub demand: f64,
    pub connection: Option<AssetId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowUnits {
    #[default]
    LitersPerSecond,
    CubicMetersPerHour,
    GallonsPerMinute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeadlossFormula {
    #[default]
    HazenWilliams,
    DarcyWeisbach,
    ChezyManning,
}

/// Document-level settings supplied alongside an imported model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub flow_units: FlowUnits,
    pub headloss_formula: HeadlossFormula,
}

/// The hydraulic network model.
///
/// Persistent by convention: `apply_moment` returns a new model and never
/// mutates `self`, so holders can detect change by comparing references.
///
/// Uses BTreeMap for deterministic iteration order, which keeps
/// `fingerprint()` and structural equality independent of edit order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HydraulicModel {
    assets: BTreeMap<AssetId, Asset>,
    curves: BTreeMap<CurveId, Curve>,
    patterns: BTreeMap<PatternId, Pattern>,
    customer_points: BTreeMap<CustomerPointId, CustomerPoint>,
}

impl HydraulicModel {
    /// An empty network.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assets(&self) -> &BTreeMap<AssetId, Asset> {
        &self.assets
    }

    pub fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.assets.get(&id)
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn curves(&self) -> &BTreeMap<CurveId, Curve> {
        &self.curves
    }

    pub fn patterns(&self) -> &BTreeMap<PatternId, Pattern> {
        &self.patterns
    }

    pub fn customer_points(&self) -> &BTreeMap<CustomerPointId, CustomerPoint> {
        &self.customer_points
    }

    /// Links with `node` as one of their endpoints.
    pub fn links_at(&self, node: AssetId) -> impl Iterator<Item = &Asset> {
        self.assets
            .values()
            .filter(move |asset| asset.connections().is_some_and(|c| c.contains(&node)))
    }

    /// Produce the model that results from applying `moment`.
    ///
    /// Within each entity kind deletions run before puts, so a moment that
    /// deletes and puts the same id ends with the put value.
    pub fn apply_moment(&self, moment: &Moment) -> Self {
        let mut next = self.clone();
        apply_entries(
            &mut next.assets,
            &moment.delete_assets,
            &moment.put_assets,
            |a| a.id,
        );
        apply_entries(
            &mut next.curves,
            &moment.delete_curves,
            &moment.put_curves,
            |c| c.id,
        );
        apply_entries(
            &mut next.patterns,
            &moment.delete_patterns,
            &moment.put_patterns,
            |p| p.id,
        );
        apply_entries(
            &mut next.customer_points,
            &moment.delete_customer_points,
            &moment.put_customer_points,
            |c| c.id,
        );
        next
    }

    /// Compute the moment that undoes `moment` when applied to
    /// `self.apply_moment(moment)`. `self` must be the pre-edit model.
    pub fn invert_moment(&self, moment: &Moment) -> Moment {
        let mut inverse = Moment::new(moment.note.clone());
        invert_entries(
            &self.assets,
            moment
                .delete_assets
                .iter()
                .copied()
                .chain(moment.put_assets.iter().map(|a| a.id)),
            &mut inverse.put_assets,
            &mut inverse.delete_assets,
        );
        invert_entries(
            &self.curves,
            moment
                .delete_curves
                .iter()
                .copied()
                .chain(moment.put_curves.iter().map(|c| c.id)),
            &mut inverse.put_curves,
            &mut inverse.delete_curves,
        );
        invert_entries(
            &self.patterns,
            moment
                .delete_patterns
                .iter()
                .copied()
                .chain(moment.put_patterns.iter().map(|p| p.id)),
            &mut inverse.put_patterns,
            &mut inverse.delete_patterns,
        );
        invert_entries(
            &self.customer_points,
            moment
                .delete_customer_points
                .iter()
                .copied()
                .chain(moment.put_customer_points.iter().map(|c| c.id)),
            &mut inverse.put_customer_points,
            &mut inverse.delete_customer_points,
        );
        inverse
    }

    /// Deterministic content hash over canonical (BTreeMap) order.
    ///
    /// FNV-1a over the debug representation; good enough to compare states in
    /// tooling output, not a substitute for structural equality.
    pub fn fingerprint(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in format!("{self:?}").bytes() {
            h ^= byte as u64;
            h = h.wrapping_mul(0x0100_0000_01b3);
        }
        h
    }
}

fn apply_entries<K: Ord + Copy, V: Clone>(
    map: &mut BTreeMap<K, V>,
    deletes: &[K],
    puts: &[V],
    key: impl Fn(&V) -> K,
) {
    for id in deletes {
        map.remove(id);
    }
    for value in puts {
        map.insert(key(value), value.clone());
    }
}

fn invert_entries<K: Ord + Copy, V: Clone>(
    pre: &BTreeMap<K, V>,
    touched: impl Iterator<Item = K>,
    puts: &mut Vec<V>,
    deletes: &mut Vec<K>,
) {
    let touched: BTreeSet<K> = touched.collect();
    for id in touched {
        match pre.get(&id) {
            Some(old) => puts.push(old.clone()),
            None => deletes.push(id),
        }
    }
}
