use crate::model::{Asset, CustomerPoint, Curve, Pattern};
use aquifer_common::{AssetId, CurveId, CustomerPointId, PatternId};
use serde::{Deserialize, Serialize};

/// One atomic edit to the model, expressed as per-kind put/delete lists.
///
/// Moments are positional diffs: applying one twice is only idempotent if the
/// model did not change in between. A moment with every list empty is the
/// identity edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Moment {
    /// Human-readable description for history views.
    pub note: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub put_assets: Vec<Asset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete_assets: Vec<AssetId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub put_curves: Vec<Curve>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete_curves: Vec<CurveId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub put_patterns: Vec<Pattern>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete_patterns: Vec<PatternId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub put_customer_points: Vec<CustomerPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete_customer_points: Vec<CustomerPointId>,
}

impl Moment {
    /// An empty moment carrying only a note.
    pub fn new(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            ..Self::default()
        }
    }

    pub fn put_asset(mut self, asset: Asset) -> Self {
        self.put_assets.push(asset);
        self
    }

    pub fn delete_asset(mut self, id: AssetId) -> Self {
        self.delete_assets.push(id);
        self
    }

    pub fn put_curve(mut self, curve: Curve) -> Self {
        self.put_curves.push(curve);
        self
    }

    pub fn delete_curve(mut self, id: CurveId) -> Self {
        self.delete_curves.push(id);
        self
    }

    pub fn put_pattern(mut self, pattern: Pattern) -> Self {
        self.put_patterns.push(pattern);
        self
    }

    pub fn delete_pattern(mut self, id: PatternId) -> Self {
        self.delete_patterns.push(id);
        self
    }

    pub fn put_customer_point(mut self, point: CustomerPoint) -> Self {
        self.put_customer_points.push(point);
        self
    }

    pub fn delete_customer_point(mut self, id: CustomerPointId) -> Self {
        self.delete_customer_points.push(id);
        self
    }

    /// Whether this is the identity edit.
    pub fn is_empty(&self) -> bool {
        self.put_assets.is_empty()
            && self.delete_assets.is_empty()
            && self.put_curves.is_empty()
            && self.delete_curves.is_empty()
            && self.put_patterns.is_empty()
            && self.delete_patterns.is_empty()
            && self.put_customer_points.is_empty()
            && self.delete_customer_points.is_empty()
    }

    /// Total number of put and delete entries across all kinds.
    pub fn change_count(&self) -> usize {
        self.put_assets.len()
            + self.delete_assets.len()
            + self.put_curves.len()
            + self.delete_curves.len()
            + self.put_patterns.len()
            + self.delete_patterns.len()
            + self.put_customer_points.len()
            + self.delete_customer_points.len()
    }
}
