//! Repository abstraction over the persisted data model.
//!
//! One async trait per aggregate, so a backend can be swapped without
//! touching the services. The bundled backend is [`MemoryStore`], which
//! keeps every table behind a `parking_lot::RwLock` and enforces the
//! uniqueness invariants of the data model.
//!
//! Persistence is the authoritative store: services re-read through these
//! traits rather than caching across requests.

mod memory;

pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;
use leaklens_core::{
    CoreResult, DetectionId, NetworkId, NodeId, PartitionId, SensorId, Timestamp,
};

use crate::domain::{
    LeakDetection, Network, NetworkNode, Partition, Reading, SensitivityEntry, Sensor,
};

/// Networks.
#[async_trait]
pub trait NetworkStore: Send + Sync {
    /// Persists a network.
    async fn insert(&self, network: Network) -> CoreResult<()>;

    /// Fetches a network; `NotFound` when unknown.
    async fn get(&self, id: NetworkId) -> CoreResult<Network>;
}

/// Network nodes.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Persists a node; `Conflict` when `(network_id, label)` already
    /// exists.
    async fn insert(&self, node: NetworkNode) -> CoreResult<()>;

    /// Fetches a node; `NotFound` when unknown.
    async fn get(&self, id: NodeId) -> CoreResult<NetworkNode>;

    /// Looks a node up by its label within a network.
    async fn by_label(&self, network: NetworkId, label: &str) -> CoreResult<Option<NetworkNode>>;

    /// All nodes of a network, in insertion order.
    async fn for_network(&self, network: NetworkId) -> CoreResult<Vec<NetworkNode>>;
}

/// Sensors.
#[async_trait]
pub trait SensorStore: Send + Sync {
    /// Persists a sensor; `Conflict` when `(network_id, label)` already
    /// exists.
    async fn insert(&self, sensor: Sensor) -> CoreResult<()>;

    /// Fetches a sensor; `NotFound` when unknown.
    async fn get(&self, id: SensorId) -> CoreResult<Sensor>;

    /// Looks a sensor up by its label within a network.
    async fn by_label(&self, network: NetworkId, label: &str) -> CoreResult<Option<Sensor>>;

    /// All sensors of a network, in insertion order.
    async fn for_network(&self, network: NetworkId) -> CoreResult<Vec<Sensor>>;
}

/// Sensor readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persists a batch of readings; returns how many were stored.
    async fn insert_many(&self, readings: Vec<Reading>) -> CoreResult<usize>;

    /// Readings of one sensor with `from <= timestamp <= to`.
    async fn in_window(
        &self,
        sensor: SensorId,
        from: Timestamp,
        to: Timestamp,
    ) -> CoreResult<Vec<Reading>>;
}

/// Sensitivity matrix entries.
#[async_trait]
pub trait SensitivityStore: Send + Sync {
    /// Inserts or replaces entries keyed on
    /// `(network_id, leak_node_id, sensor_id)`.
    async fn upsert_batch(&self, entries: Vec<SensitivityEntry>) -> CoreResult<()>;

    /// All entries of a network.
    async fn for_network(&self, network: NetworkId) -> CoreResult<Vec<SensitivityEntry>>;

    /// Number of entries stored for a network.
    async fn count(&self, network: NetworkId) -> CoreResult<usize>;

    /// Drops every entry of a network (used by forced rebuilds).
    async fn clear(&self, network: NetworkId) -> CoreResult<()>;
}

/// Leak detections.
#[async_trait]
pub trait DetectionStore: Send + Sync {
    /// Persists a detection.
    async fn insert(&self, detection: LeakDetection) -> CoreResult<()>;

    /// Fetches a detection; `NotFound` when unknown.
    async fn get(&self, id: DetectionId) -> CoreResult<LeakDetection>;

    /// Replaces a stored detection; `NotFound` when unknown.
    async fn update(&self, detection: LeakDetection) -> CoreResult<()>;

    /// All detections of a network, in insertion order.
    async fn for_network(&self, network: NetworkId) -> CoreResult<Vec<LeakDetection>>;
}

/// DMA partitions.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Persists a partition; `Conflict` when the mainline already roots one.
    async fn insert(&self, partition: Partition) -> CoreResult<()>;

    /// Fetches a partition; `NotFound` when unknown.
    async fn get(&self, id: PartitionId) -> CoreResult<Partition>;

    /// The partition rooted at the given mainline node, if any.
    async fn by_mainline(&self, mainline: NodeId) -> CoreResult<Option<Partition>>;

    /// All partitions of a network, in insertion order.
    async fn for_network(&self, network: NetworkId) -> CoreResult<Vec<Partition>>;
}

/// Bundle of repository handles passed to the services.
#[derive(Clone)]
pub struct Stores {
    /// Networks
    pub networks: Arc<dyn NetworkStore>,
    /// Network nodes
    pub nodes: Arc<dyn NodeStore>,
    /// Sensors
    pub sensors: Arc<dyn SensorStore>,
    /// Readings
    pub readings: Arc<dyn ReadingStore>,
    /// Sensitivity entries
    pub sensitivity: Arc<dyn SensitivityStore>,
    /// Leak detections
    pub detections: Arc<dyn DetectionStore>,
    /// DMA partitions
    pub partitions: Arc<dyn PartitionStore>,
}

impl Stores {
    /// A fully in-memory bundle backed by one [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            networks: store.clone(),
            nodes: store.clone(),
            sensors: store.clone(),
            readings: store.clone(),
            sensitivity: store.clone(),
            detections: store.clone(),
            partitions: store,
        }
    }
}
