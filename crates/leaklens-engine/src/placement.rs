//! Greedy deterministic sensor auto-placement.
//!
//! Candidate nodes are consumed in a fixed priority order until the target
//! count is reached: mainlines without a sensor first (ascending label),
//! then junctions by outgoing degree (descending, ties by label), then
//! branches with the same sort. Labels are `MAIN_<nn>`, `JUNC_<nn>`, and
//! `BRANCH_<nn>` with per-kind zero-padded counters.

use std::collections::HashSet;

use leaklens_core::{CoreError, CoreResult, NetworkId, NodeKind, SensorKind};
use tracing::{info, instrument};

use crate::domain::{NetworkNode, Sensor};
use crate::repository::Stores;
use crate::topology::TopologyService;

/// Default number of sensors to place.
pub const DEFAULT_TARGET_COUNT: usize = 12;

/// Upper bound on the target count.
pub const MAX_TARGET_COUNT: usize = 1000;

/// Chooses sensor locations on an imported network.
#[derive(Clone)]
pub struct PlacementService {
    stores: Stores,
    topology: TopologyService,
}

impl PlacementService {
    /// Creates the service over a repository bundle.
    #[must_use]
    pub fn new(stores: Stores) -> Self {
        Self {
            topology: TopologyService::new(stores.clone()),
            stores,
        }
    }

    /// Places up to `target_count` sensors and returns the created ones.
    ///
    /// Nodes that already carry a sensor are skipped. Each sensor derives
    /// its DMA from the host node's mainline.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when `target_count` is zero or above
    /// [`MAX_TARGET_COUNT`].
    #[instrument(skip(self), fields(network = %network))]
    pub async fn auto_place(
        &self,
        network: NetworkId,
        target_count: usize,
    ) -> CoreResult<Vec<Sensor>> {
        if target_count == 0 || target_count > MAX_TARGET_COUNT {
            return Err(CoreError::invalid_input(format!(
                "targetCount must be in 1..={MAX_TARGET_COUNT}, got {target_count}"
            )));
        }

        let graph = self.topology.graph(network).await?;
        let existing = self.stores.sensors.for_network(network).await?;
        let occupied: HashSet<_> = existing.iter().map(|s| s.node_id).collect();

        // Per-kind counters continue past labels from earlier placements
        let next_suffix = |prefix: &str| -> usize {
            existing
                .iter()
                .filter_map(|s| s.label.strip_prefix(prefix)?.strip_prefix('_')?.parse::<usize>().ok())
                .max()
                .unwrap_or(0)
        };
        let mut counters = [
            next_suffix("MAIN"),
            next_suffix("JUNC"),
            next_suffix("BRANCH"),
        ];

        let free = |n: &&NetworkNode| !occupied.contains(&n.id);

        let mut mainlines: Vec<&NetworkNode> = graph
            .iter()
            .filter(|n| n.kind == NodeKind::Mainline)
            .filter(free)
            .collect();
        mainlines.sort_by(|a, b| a.label.cmp(&b.label));

        let by_degree = |a: &&NetworkNode, b: &&NetworkNode| {
            let da = graph.children(a.id).len();
            let db = graph.children(b.id).len();
            db.cmp(&da).then_with(|| a.label.cmp(&b.label))
        };
        let mut junctions: Vec<&NetworkNode> = graph
            .iter()
            .filter(|n| n.kind == NodeKind::Junction)
            .filter(free)
            .collect();
        junctions.sort_by(by_degree);
        let mut branches: Vec<&NetworkNode> = graph
            .iter()
            .filter(|n| n.kind == NodeKind::Branch)
            .filter(free)
            .collect();
        branches.sort_by(by_degree);

        let mut created = Vec::new();
        for node in mainlines
            .into_iter()
            .chain(junctions)
            .chain(branches)
            .take(target_count)
        {
            let (prefix, slot) = match node.kind {
                NodeKind::Mainline => ("MAIN", 0),
                NodeKind::Junction => ("JUNC", 1),
                _ => ("BRANCH", 2),
            };
            counters[slot] += 1;
            let label = format!("{prefix}_{:02}", counters[slot]);

            let mut sensor = Sensor::new(network, label, SensorKind::for_node(node.kind), node.id);
            if let Some(partition) = self.topology.partition_for_node(network, node.id).await? {
                sensor = sensor.with_partition(partition.id);
            }
            self.stores.sensors.insert(sensor.clone()).await?;
            created.push(sensor);
        }

        info!(count = created.len(), "sensors auto-placed");
        Ok(created)
    }
}
