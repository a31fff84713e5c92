//! Time-windowed mass-balance detection.
//!
//! For every sensor the detector takes the arithmetic mean of its readings
//! over `[T - W, T]`; a sensor with no readings in the window contributes
//! nothing. At a node, inflow is the sum of means of sensors on the parent
//! and outflow the sum over sensors on the children; at a DMA, inflow comes
//! from the DMA's MAINLINE_FLOW meters and outflow from its household
//! meters. An imbalance above the threshold persists a [`LeakDetection`]
//! whose severity follows the imbalance magnitude.

use std::collections::HashMap;

use chrono::Duration;
use leaklens_core::{
    utils, CoreError, CoreResult, NetworkId, NodeId, NodeKind, PartitionId, SensorId, SensorKind,
    Timestamp, DEFAULT_THRESHOLD_LPS, DEFAULT_WINDOW_SECS,
};
use tracing::{info, instrument, warn};

use crate::domain::{LeakDetection, Sensor};
use crate::repository::Stores;
use crate::topology::{TopologyGraph, TopologyService};

/// Parameters of one detection run.
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    /// Network to analyze
    pub network_id: NetworkId,
    /// Analysis instant `T`
    pub timestamp: Timestamp,
    /// Imbalance threshold in L/s
    pub threshold_lps: f64,
    /// Aggregation window in seconds
    pub window_secs: i64,
    /// Restrict to a single node
    pub node_id: Option<NodeId>,
    /// Restrict to a DMA
    pub partition_id: Option<PartitionId>,
}

impl DetectionRequest {
    /// A request with the default threshold (5 L/s) and window (300 s).
    #[must_use]
    pub fn new(network_id: NetworkId, timestamp: Timestamp) -> Self {
        Self {
            network_id,
            timestamp,
            threshold_lps: DEFAULT_THRESHOLD_LPS,
            window_secs: DEFAULT_WINDOW_SECS,
            node_id: None,
            partition_id: None,
        }
    }

    /// Overrides the threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold_lps: f64) -> Self {
        self.threshold_lps = threshold_lps;
        self
    }

    /// Overrides the window.
    #[must_use]
    pub fn with_window(mut self, window_secs: i64) -> Self {
        self.window_secs = window_secs;
        self
    }

    /// Scopes the run to one node.
    #[must_use]
    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node_id = Some(node);
        self
    }

    /// Scopes the run to one DMA.
    #[must_use]
    pub fn with_partition(mut self, partition: PartitionId) -> Self {
        self.partition_id = Some(partition);
        self
    }

    fn validate(&self) -> CoreResult<()> {
        if self.threshold_lps < 0.0 {
            return Err(CoreError::invalid_input(format!(
                "threshold must be non-negative, got {}",
                self.threshold_lps
            )));
        }
        if self.window_secs <= 0 {
            return Err(CoreError::invalid_input(format!(
                "time window must be positive, got {} s",
                self.window_secs
            )));
        }
        Ok(())
    }
}

/// Conservation-law leak detector.
#[derive(Clone)]
pub struct MassBalanceDetector {
    stores: Stores,
    topology: TopologyService,
}

impl MassBalanceDetector {
    /// Creates the detector over a repository bundle.
    #[must_use]
    pub fn new(stores: Stores) -> Self {
        Self {
            topology: TopologyService::new(stores.clone()),
            stores,
        }
    }

    /// Runs detection and persists one record per violated scope.
    ///
    /// Without a node or partition scope, every JUNCTION and BRANCH node is
    /// checked; failures of individual scopes are logged and skipped.
    #[instrument(skip(self, request), fields(network = %request.network_id))]
    pub async fn detect(&self, request: &DetectionRequest) -> CoreResult<Vec<LeakDetection>> {
        request.validate()?;

        let graph = self.topology.graph(request.network_id).await?;
        let sensors = self.stores.sensors.for_network(request.network_id).await?;
        let means = self.window_means(request, &sensors).await?;
        let by_node = sensors_by_node(&sensors);

        let mut detections = Vec::new();

        if let Some(partition_id) = request.partition_id {
            let partition = self.stores.partitions.get(partition_id).await?;
            let imbalance = self
                .dma_imbalance(partition_id, &graph, &by_node, &means)
                .await?;
            if imbalance > request.threshold_lps {
                detections.push(
                    LeakDetection::new(
                        request.network_id,
                        partition.mainline_id,
                        imbalance,
                        request.timestamp,
                    )
                    .with_partition(partition_id)
                    .with_parameters(request.window_secs, request.threshold_lps),
                );
            }
        } else if let Some(node_id) = request.node_id {
            // Fails loudly for unknown nodes in single-node scope
            let _ = self.stores.nodes.get(node_id).await?;
            let imbalance = node_imbalance(&graph, &by_node, &means, node_id);
            if imbalance > request.threshold_lps {
                detections.push(
                    LeakDetection::new(request.network_id, node_id, imbalance, request.timestamp)
                        .with_parameters(request.window_secs, request.threshold_lps),
                );
            }
        } else {
            // Multi-scope sweep over junctions and branches
            let mut scopes: Vec<&crate::domain::NetworkNode> = graph
                .iter()
                .filter(|n| n.kind.is_balance_scope())
                .collect();
            scopes.sort_by(|a, b| a.label.cmp(&b.label));

            for node in scopes {
                let imbalance = node_imbalance(&graph, &by_node, &means, node.id);
                if !imbalance.is_finite() {
                    warn!(node = %node.label, "skipping scope with non-finite imbalance");
                    continue;
                }
                if imbalance > request.threshold_lps {
                    detections.push(
                        LeakDetection::new(
                            request.network_id,
                            node.id,
                            imbalance,
                            request.timestamp,
                        )
                        .with_parameters(request.window_secs, request.threshold_lps),
                    );
                }
            }
        }

        for detection in &detections {
            self.stores.detections.insert(detection.clone()).await?;
        }
        if !detections.is_empty() {
            info!(count = detections.len(), "mass-balance violations detected");
        }

        Ok(detections)
    }

    /// Windowed mean per sensor over `[T - W, T]`.
    async fn window_means(
        &self,
        request: &DetectionRequest,
        sensors: &[Sensor],
    ) -> CoreResult<HashMap<SensorId, f64>> {
        let from = request.timestamp - Duration::seconds(request.window_secs);
        let mut means = HashMap::new();
        for sensor in sensors.iter().filter(|s| s.is_active) {
            let readings = self
                .stores
                .readings
                .in_window(sensor.id, from, request.timestamp)
                .await?;
            let values: Vec<f64> = readings.iter().map(|r| r.flow_lps).collect();
            if let Some(mean) = utils::mean(&values) {
                means.insert(sensor.id, mean);
            }
        }
        Ok(means)
    }

    /// DMA rule: MAINLINE_FLOW meters in, household meters out, both
    /// restricted to the DMA's subtree.
    async fn dma_imbalance(
        &self,
        partition: PartitionId,
        graph: &TopologyGraph,
        by_node: &HashMap<NodeId, Vec<&Sensor>>,
        means: &HashMap<SensorId, f64>,
    ) -> CoreResult<f64> {
        let members = self.topology.nodes_in_dma(partition).await?;

        let mut inflow = 0.0;
        let mut outflow = 0.0;
        for node_id in &members {
            let Some(sensors) = by_node.get(node_id) else {
                continue;
            };
            let is_household = graph
                .node(*node_id)
                .map(|n| n.kind == NodeKind::Household)
                .unwrap_or(false);
            for sensor in sensors {
                let Some(mean) = means.get(&sensor.id) else {
                    continue;
                };
                if is_household || sensor.kind == SensorKind::HouseholdFlow {
                    outflow += mean;
                } else if sensor.kind == SensorKind::MainlineFlow {
                    inflow += mean;
                }
            }
        }
        Ok(inflow - outflow)
    }
}

/// Node rule: sensors on the parent feed in, sensors on the children feed
/// out. Sensors without readings in the window contribute nothing.
fn node_imbalance(
    graph: &TopologyGraph,
    by_node: &HashMap<NodeId, Vec<&Sensor>>,
    means: &HashMap<SensorId, f64>,
    node: NodeId,
) -> f64 {
    let sum_for = |id: NodeId| -> f64 {
        by_node
            .get(&id)
            .map(|sensors| {
                sensors
                    .iter()
                    .filter_map(|s| means.get(&s.id))
                    .sum::<f64>()
            })
            .unwrap_or(0.0)
    };

    let inflow = graph.parent(node).map(sum_for).unwrap_or(0.0);
    let outflow: f64 = graph.children(node).iter().map(|c| sum_for(*c)).sum();
    inflow - outflow
}

fn sensors_by_node(sensors: &[Sensor]) -> HashMap<NodeId, Vec<&Sensor>> {
    let mut by_node: HashMap<NodeId, Vec<&Sensor>> = HashMap::new();
    for sensor in sensors.iter().filter(|s| s.is_active) {
        by_node.entry(sensor.node_id).or_default().push(sensor);
    }
    by_node
}
