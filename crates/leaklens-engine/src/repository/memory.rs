//! In-memory repository backend.
//!
//! One `RwLock`-guarded table per aggregate. Uniqueness invariants
//! (`(network, label)` for nodes and sensors, one partition per mainline,
//! `(network, leak node, sensor)` for matrix entries) are enforced here so
//! every backend behaves the same way at the service layer.

use std::collections::HashMap;

use async_trait::async_trait;
use leaklens_core::{
    CoreError, CoreResult, DetectionId, NetworkId, NodeId, PartitionId, ReadingId, SensorId,
    Timestamp,
};
use parking_lot::RwLock;

use crate::domain::{
    LeakDetection, Network, NetworkNode, Partition, Reading, SensitivityEntry, Sensor,
};
use super::{
    DetectionStore, NetworkStore, NodeStore, PartitionStore, ReadingStore, SensitivityStore,
    SensorStore,
};

/// In-memory implementation of every repository trait.
#[derive(Default)]
pub struct MemoryStore {
    networks: RwLock<HashMap<NetworkId, Network>>,
    nodes: RwLock<Vec<NetworkNode>>,
    sensors: RwLock<Vec<Sensor>>,
    readings: RwLock<HashMap<ReadingId, Reading>>,
    sensitivity: RwLock<HashMap<(NetworkId, NodeId, SensorId), SensitivityEntry>>,
    detections: RwLock<Vec<LeakDetection>>,
    partitions: RwLock<Vec<Partition>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NetworkStore for MemoryStore {
    async fn insert(&self, network: Network) -> CoreResult<()> {
        self.networks.write().insert(network.id, network);
        Ok(())
    }

    async fn get(&self, id: NetworkId) -> CoreResult<Network> {
        self.networks
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Network", id.to_string()))
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn insert(&self, node: NetworkNode) -> CoreResult<()> {
        let mut nodes = self.nodes.write();
        if nodes
            .iter()
            .any(|n| n.network_id == node.network_id && n.label == node.label)
        {
            return Err(CoreError::conflict(format!(
                "node label '{}' already exists in network {}",
                node.label, node.network_id
            )));
        }
        nodes.push(node);
        Ok(())
    }

    async fn get(&self, id: NodeId) -> CoreResult<NetworkNode> {
        self.nodes
            .read()
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Node", id.to_string()))
    }

    async fn by_label(&self, network: NetworkId, label: &str) -> CoreResult<Option<NetworkNode>> {
        Ok(self
            .nodes
            .read()
            .iter()
            .find(|n| n.network_id == network && n.label == label)
            .cloned())
    }

    async fn for_network(&self, network: NetworkId) -> CoreResult<Vec<NetworkNode>> {
        Ok(self
            .nodes
            .read()
            .iter()
            .filter(|n| n.network_id == network)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SensorStore for MemoryStore {
    async fn insert(&self, sensor: Sensor) -> CoreResult<()> {
        let mut sensors = self.sensors.write();
        if sensors
            .iter()
            .any(|s| s.network_id == sensor.network_id && s.label == sensor.label)
        {
            return Err(CoreError::conflict(format!(
                "sensor label '{}' already exists in network {}",
                sensor.label, sensor.network_id
            )));
        }
        sensors.push(sensor);
        Ok(())
    }

    async fn get(&self, id: SensorId) -> CoreResult<Sensor> {
        self.sensors
            .read()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Sensor", id.to_string()))
    }

    async fn by_label(&self, network: NetworkId, label: &str) -> CoreResult<Option<Sensor>> {
        Ok(self
            .sensors
            .read()
            .iter()
            .find(|s| s.network_id == network && s.label == label)
            .cloned())
    }

    async fn for_network(&self, network: NetworkId) -> CoreResult<Vec<Sensor>> {
        Ok(self
            .sensors
            .read()
            .iter()
            .filter(|s| s.network_id == network)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert_many(&self, readings: Vec<Reading>) -> CoreResult<usize> {
        let mut table = self.readings.write();
        let count = readings.len();
        for reading in readings {
            table.insert(reading.id, reading);
        }
        Ok(count)
    }

    async fn in_window(
        &self,
        sensor: SensorId,
        from: Timestamp,
        to: Timestamp,
    ) -> CoreResult<Vec<Reading>> {
        let mut matching: Vec<Reading> = self
            .readings
            .read()
            .values()
            .filter(|r| r.sensor_id == sensor && r.timestamp >= from && r.timestamp <= to)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.timestamp);
        Ok(matching)
    }
}

#[async_trait]
impl SensitivityStore for MemoryStore {
    async fn upsert_batch(&self, entries: Vec<SensitivityEntry>) -> CoreResult<()> {
        let mut table = self.sensitivity.write();
        for entry in entries {
            table.insert((entry.network_id, entry.leak_node_id, entry.sensor_id), entry);
        }
        Ok(())
    }

    async fn for_network(&self, network: NetworkId) -> CoreResult<Vec<SensitivityEntry>> {
        Ok(self
            .sensitivity
            .read()
            .values()
            .filter(|e| e.network_id == network)
            .cloned()
            .collect())
    }

    async fn count(&self, network: NetworkId) -> CoreResult<usize> {
        Ok(self
            .sensitivity
            .read()
            .values()
            .filter(|e| e.network_id == network)
            .count())
    }

    async fn clear(&self, network: NetworkId) -> CoreResult<()> {
        self.sensitivity
            .write()
            .retain(|(net, _, _), _| *net != network);
        Ok(())
    }
}

#[async_trait]
impl DetectionStore for MemoryStore {
    async fn insert(&self, detection: LeakDetection) -> CoreResult<()> {
        self.detections.write().push(detection);
        Ok(())
    }

    async fn get(&self, id: DetectionId) -> CoreResult<LeakDetection> {
        self.detections
            .read()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("LeakDetection", id.to_string()))
    }

    async fn update(&self, detection: LeakDetection) -> CoreResult<()> {
        let mut detections = self.detections.write();
        match detections.iter_mut().find(|d| d.id == detection.id) {
            Some(slot) => {
                *slot = detection;
                Ok(())
            }
            None => Err(CoreError::not_found(
                "LeakDetection",
                detection.id.to_string(),
            )),
        }
    }

    async fn for_network(&self, network: NetworkId) -> CoreResult<Vec<LeakDetection>> {
        Ok(self
            .detections
            .read()
            .iter()
            .filter(|d| d.network_id == network)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PartitionStore for MemoryStore {
    async fn insert(&self, partition: Partition) -> CoreResult<()> {
        let mut partitions = self.partitions.write();
        if partitions.iter().any(|p| p.mainline_id == partition.mainline_id) {
            return Err(CoreError::conflict(format!(
                "mainline {} already roots a partition",
                partition.mainline_id
            )));
        }
        partitions.push(partition);
        Ok(())
    }

    async fn get(&self, id: PartitionId) -> CoreResult<Partition> {
        self.partitions
            .read()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Partition", id.to_string()))
    }

    async fn by_mainline(&self, mainline: NodeId) -> CoreResult<Option<Partition>> {
        Ok(self
            .partitions
            .read()
            .iter()
            .find(|p| p.mainline_id == mainline)
            .cloned())
    }

    async fn for_network(&self, network: NetworkId) -> CoreResult<Vec<Partition>> {
        Ok(self
            .partitions
            .read()
            .iter()
            .filter(|p| p.network_id == network)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Network, NetworkNode, Sensor};
    use chrono::Utc;
    use leaklens_core::{NodeKind, ReadingSource, SensorKind};

    #[tokio::test]
    async fn test_duplicate_node_label_conflicts() {
        let store = MemoryStore::new();
        let network = NetworkId::new();
        NodeStore::insert(&store, NetworkNode::new(network, "J1", NodeKind::Junction))
            .await
            .unwrap();
        let err = NodeStore::insert(&store, NetworkNode::new(network, "J1", NodeKind::Branch))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));

        // Same label in another network is fine
        NodeStore::insert(
            &store,
            NetworkNode::new(NetworkId::new(), "J1", NodeKind::Junction),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_sensor_label_conflicts() {
        let store = MemoryStore::new();
        let network = NetworkId::new();
        let node = NodeId::new();
        SensorStore::insert(
            &store,
            Sensor::new(network, "MAIN_01", SensorKind::MainlineFlow, node),
        )
        .await
        .unwrap();
        let err = SensorStore::insert(
            &store,
            Sensor::new(network, "MAIN_01", SensorKind::MainlineFlow, node),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_reading_window_bounds_are_inclusive() {
        let store = MemoryStore::new();
        let network = NetworkId::new();
        let sensor = SensorId::new();
        let t0 = Utc::now();
        let readings: Vec<Reading> = [0i64, 100, 300, 400]
            .iter()
            .map(|&offset| {
                Reading::new(
                    network,
                    sensor,
                    10.0,
                    t0 + chrono::Duration::seconds(offset),
                    ReadingSource::Sensor,
                )
            })
            .collect();
        store.insert_many(readings).await.unwrap();

        let hits = store
            .in_window(sensor, t0, t0 + chrono::Duration::seconds(300))
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_sensitivity_upsert_replaces() {
        let store = MemoryStore::new();
        let (network, node, sensor) = (NetworkId::new(), NodeId::new(), SensorId::new());
        let entry = |value| SensitivityEntry {
            network_id: network,
            leak_node_id: node,
            sensor_id: sensor,
            value,
        };
        store.upsert_batch(vec![entry(0.5)]).await.unwrap();
        store.upsert_batch(vec![entry(0.8)]).await.unwrap();

        assert_eq!(store.count(network).await.unwrap(), 1);
        let all = SensitivityStore::for_network(&store, network).await.unwrap();
        assert!((all[0].value - 0.8).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_one_partition_per_mainline() {
        let store = MemoryStore::new();
        let network = NetworkId::new();
        let mainline = NodeId::new();
        PartitionStore::insert(&store, Partition::new(network, "DMA_M", mainline))
            .await
            .unwrap();
        let err = PartitionStore::insert(&store, Partition::new(network, "DMA_M2", mainline))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_network_roundtrip() {
        let store = MemoryStore::new();
        let network = Network::new(Some("demo".into()));
        let id = network.id;
        NetworkStore::insert(&store, network).await.unwrap();
        let fetched = NetworkStore::get(&store, id).await.unwrap();
        assert_eq!(fetched.name.as_deref(), Some("demo"));
    }
}
