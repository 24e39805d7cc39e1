use aquifer_kernel::{
    AssetKind, HydraulicModel, SimulationResult, SimulationRunner, SimulationStatus,
};

/// Connectivity check posing as a simulation run.
///
/// Fails when a link references a missing node, warns about nodes with no
/// links or a network without any source (reservoir or tank), succeeds
/// otherwise. Deterministic, so it is suitable for demos and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyRunner;

impl SimulationRunner for TopologyRunner {
    fn simulate(&self, model: &HydraulicModel) -> SimulationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for asset in model.assets().values() {
            let Some(ends) = asset.connections() else {
                continue;
            };
            for end in ends {
                match model.asset(end) {
                    Some(node) if node.is_node() => {}
                    _ => errors.push(format!("link {} references missing node {end}", asset.label)),
                }
            }
        }

        let mut has_source = false;
        for asset in model.assets().values().filter(|a| a.is_node()) {
            if matches!(asset.kind, AssetKind::Reservoir { .. } | AssetKind::Tank { .. }) {
                has_source = true;
            }
            if model.links_at(asset.id).next().is_none() {
                warnings.push(format!("node {} is isolated", asset.label));
            }
        }
        if model.asset_count() > 0 && !has_source {
            warnings.push("network has no reservoir or tank".to_string());
        }

        let status = if !errors.is_empty() {
            SimulationStatus::Failure
        } else if !warnings.is_empty() {
            SimulationStatus::Warning
        } else {
            SimulationStatus::Success
        };
        tracing::debug!(?status, errors = errors.len(), warnings = warnings.len(), "topology run");
        errors.extend(warnings);
        SimulationResult {
            status,
            report: errors.join("\n"),
        }
    }
}
