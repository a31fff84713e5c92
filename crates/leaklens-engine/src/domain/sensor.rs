//! Flow sensors.

use leaklens_core::{NetworkId, NodeId, PartitionId, SensorId, SensorKind};
use serde::{Deserialize, Serialize};

/// A flow meter mounted on a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    /// Unique id
    pub id: SensorId,
    /// Owning network
    pub network_id: NetworkId,
    /// Human-readable label, unique within the network
    pub label: String,
    /// Meter kind
    pub kind: SensorKind,
    /// Host node
    pub node_id: NodeId,
    /// DMA the sensor belongs to; derived from the host node when absent
    pub partition_id: Option<PartitionId>,
    /// Inactive sensors are ignored by detection and matrix generation
    pub is_active: bool,
}

impl Sensor {
    /// Creates an active sensor on the given node.
    #[must_use]
    pub fn new(
        network_id: NetworkId,
        label: impl Into<String>,
        kind: SensorKind,
        node_id: NodeId,
    ) -> Self {
        Self {
            id: SensorId::new(),
            network_id,
            label: label.into(),
            kind,
            node_id,
            partition_id: None,
            is_active: true,
        }
    }

    /// Assigns the DMA.
    #[must_use]
    pub fn with_partition(mut self, partition: PartitionId) -> Self {
        self.partition_id = Some(partition);
        self
    }
}
