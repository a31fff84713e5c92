//! Sensitivity matrix entries.

use leaklens_core::{NetworkId, NodeId, SensorId, Timestamp};
use serde::{Deserialize, Serialize};

/// One cell of the sparse sensitivity matrix.
///
/// The value is the dimensionless derivative ΔSensorFlow / ΔLeakSize at a
/// unit leak, for one (candidate node, sensor) pair. Entries are unique on
/// `(network_id, leak_node_id, sensor_id)` and upserted in batches so a
/// partially rebuilt matrix is never inconsistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityEntry {
    /// Owning network
    pub network_id: NetworkId,
    /// Candidate node the synthetic leak was applied to
    pub leak_node_id: NodeId,
    /// Sensor whose response was measured
    pub sensor_id: SensorId,
    /// Dimensionless sensitivity value
    pub value: f64,
}

/// Aggregate statistics of a completed matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixStats {
    /// Total persisted entries; `candidates * sensors` after a clean build
    pub total_entries: usize,
    /// Number of candidate leak nodes covered
    pub candidate_count: usize,
    /// Number of sensors covered
    pub sensor_count: usize,
    /// When the build finished
    pub generated_at: Timestamp,
}
