//! Time-stamped sensor readings.

use leaklens_core::{NetworkId, ReadingId, ReadingSource, SensorId, Timestamp};
use serde::{Deserialize, Serialize};

/// A single flow sample from a sensor, in L/s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    /// Unique id
    pub id: ReadingId,
    /// Owning network
    pub network_id: NetworkId,
    /// Sensor the sample came from
    pub sensor_id: SensorId,
    /// Flow value in L/s
    pub flow_lps: f64,
    /// Sample instant
    pub timestamp: Timestamp,
    /// Origin of the sample
    pub source: ReadingSource,
}

impl Reading {
    /// Creates a reading.
    #[must_use]
    pub fn new(
        network_id: NetworkId,
        sensor_id: SensorId,
        flow_lps: f64,
        timestamp: Timestamp,
        source: ReadingSource,
    ) -> Self {
        Self {
            id: ReadingId::new(),
            network_id,
            sensor_id,
            flow_lps,
            timestamp,
            source,
        }
    }
}
