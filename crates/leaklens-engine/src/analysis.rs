//! One-shot analysis: ingest a reading batch, detect, localize, report.
//!
//! The orchestrator is the end-to-end path behind `POST /api/leaks/analyze`.
//! Detection runs with the default threshold and window; each resulting
//! detection is localized with the default baseline window, and a
//! localization failure only strips the `localization` block from that
//! detection's entry rather than failing the analysis.

use std::collections::BTreeMap;

use leaklens_core::{
    CoreError, CoreResult, NetworkId, ReadingSource, Severity, Timestamp,
    DEFAULT_BASELINE_WINDOW_SECS,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::detection::{DetectionRequest, MassBalanceDetector};
use crate::domain::{LeakDetection, Reading};
use crate::localization::{LocalizationOutcome, LocalizationService};
use crate::repository::Stores;

/// One reading in an analysis batch, addressed by sensor label.
#[derive(Debug, Clone)]
pub struct IncomingReading {
    /// Sensor label within the network
    pub sensor_label: String,
    /// Flow value in L/s
    pub flow_lps: f64,
}

/// A detection with its localization, when one succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedDetection {
    /// The persisted detection
    pub detection: LeakDetection,
    /// Localization result; absent when localization failed
    pub localization: Option<LocalizationOutcome>,
}

/// Aggregate counts of one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    /// Total detections
    pub total: usize,
    /// Detections that were localized
    pub localized: usize,
    /// Detections per severity bucket
    pub severity_breakdown: BTreeMap<Severity, usize>,
}

/// Full report of one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// The analysis instant
    pub timestamp: Timestamp,
    /// Number of readings stored
    pub readings_stored: usize,
    /// Detections with optional localizations
    pub detections: Vec<AnalyzedDetection>,
    /// Aggregate counts
    pub summary: AnalysisSummary,
}

/// End-to-end detect-and-localize orchestrator.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    stores: Stores,
    detector: MassBalanceDetector,
    localizer: LocalizationService,
}

impl AnalysisOrchestrator {
    /// Creates the orchestrator over a repository bundle.
    #[must_use]
    pub fn new(stores: Stores) -> Self {
        Self {
            detector: MassBalanceDetector::new(stores.clone()),
            localizer: LocalizationService::new(stores.clone()),
            stores,
        }
    }

    /// Runs the full pipeline for one simultaneous reading batch.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty batch; `NotFound` listing every unknown
    /// sensor label (nothing is stored in that case).
    #[instrument(skip(self, readings), fields(network = %network, count = readings.len()))]
    pub async fn analyze(
        &self,
        network: NetworkId,
        timestamp: Timestamp,
        readings: Vec<IncomingReading>,
    ) -> CoreResult<AnalysisReport> {
        if readings.is_empty() {
            return Err(CoreError::invalid_input("readings batch is empty"));
        }

        // Resolve every label before storing anything, so a bad batch
        // aborts atomically
        let mut resolved = Vec::with_capacity(readings.len());
        let mut missing = Vec::new();
        for reading in &readings {
            match self
                .stores
                .sensors
                .by_label(network, &reading.sensor_label)
                .await?
            {
                Some(sensor) => resolved.push((sensor, reading.flow_lps)),
                None => missing.push(reading.sensor_label.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(CoreError::not_found("Sensor", missing.join(", ")));
        }

        let batch: Vec<Reading> = resolved
            .into_iter()
            .map(|(sensor, flow)| {
                Reading::new(network, sensor.id, flow, timestamp, ReadingSource::Sensor)
            })
            .collect();
        let readings_stored = self.stores.readings.insert_many(batch).await?;

        let detections = self
            .detector
            .detect(&DetectionRequest::new(network, timestamp))
            .await?;

        let mut analyzed = Vec::with_capacity(detections.len());
        let mut severity_breakdown: BTreeMap<Severity, usize> = BTreeMap::new();
        let mut localized = 0usize;

        for detection in detections {
            *severity_breakdown.entry(detection.severity()).or_insert(0) += 1;

            let localization = match self
                .localizer
                .localize(detection.id, DEFAULT_BASELINE_WINDOW_SECS)
                .await
            {
                Ok(outcome) => {
                    localized += 1;
                    Some(outcome)
                }
                Err(err) => {
                    warn!(detection = %detection.id, error = %err, "localization failed; reporting detection without it");
                    None
                }
            };

            // Report the stored state, which carries the localization
            // write-back when it happened
            let detection = self.stores.detections.get(detection.id).await?;
            analyzed.push(AnalyzedDetection {
                detection,
                localization,
            });
        }

        info!(
            detections = analyzed.len(),
            localized, readings_stored, "analysis finished"
        );

        Ok(AnalysisReport {
            timestamp,
            readings_stored,
            summary: AnalysisSummary {
                total: analyzed.len(),
                localized,
                severity_breakdown,
            },
            detections: analyzed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NetworkNode, SensitivityEntry, Sensor};
    use chrono::{Duration, Utc};
    use leaklens_core::{NodeKind, SensorKind};

    /// Chain with meters, an hour of balanced history, and a seeded matrix.
    async fn seed(stores: &Stores) -> NetworkId {
        let network = NetworkId::new();
        let m = NetworkNode::new(network, "M", NodeKind::Mainline).with_epanet_id("M");
        let b = NetworkNode::new(network, "B", NodeKind::Branch)
            .with_parent(m.id)
            .with_epanet_id("B");
        let h1 = NetworkNode::new(network, "H1", NodeKind::Household)
            .with_parent(b.id)
            .with_epanet_id("H1");
        let h2 = NetworkNode::new(network, "H2", NodeKind::Household)
            .with_parent(b.id)
            .with_epanet_id("H2");

        let s_m = Sensor::new(network, "MAIN_01", SensorKind::MainlineFlow, m.id);
        let s_h1 = Sensor::new(network, "HH_01", SensorKind::HouseholdFlow, h1.id);
        let s_h2 = Sensor::new(network, "HH_02", SensorKind::HouseholdFlow, h2.id);

        // Row(c)[s]: the mainline meter sees every candidate, household
        // meters see their own node
        let mut entries = Vec::new();
        for (node, own_sensor) in [(&m, None), (&b, None), (&h1, Some(&s_h1)), (&h2, Some(&s_h2))] {
            entries.push(SensitivityEntry {
                network_id: network,
                leak_node_id: node.id,
                sensor_id: s_m.id,
                value: 1.0,
            });
            for sensor in [&s_h1, &s_h2] {
                entries.push(SensitivityEntry {
                    network_id: network,
                    leak_node_id: node.id,
                    sensor_id: sensor.id,
                    value: if own_sensor.map(|s| s.id) == Some(sensor.id) {
                        1.0
                    } else {
                        0.0
                    },
                });
            }
        }

        // Balanced baseline readings an hour back
        let t0 = Utc::now() - Duration::seconds(1000);
        let history = vec![
            Reading::new(network, s_m.id, 12.0, t0, ReadingSource::Sensor),
            Reading::new(network, s_h1.id, 7.0, t0, ReadingSource::Sensor),
            Reading::new(network, s_h2.id, 5.0, t0, ReadingSource::Sensor),
        ];

        for node in [m, b, h1, h2] {
            stores.nodes.insert(node).await.unwrap();
        }
        for sensor in [s_m, s_h1, s_h2] {
            stores.sensors.insert(sensor).await.unwrap();
        }
        stores.sensitivity.upsert_batch(entries).await.unwrap();
        stores.readings.insert_many(history).await.unwrap();
        network
    }

    fn batch(values: [(&str, f64); 3]) -> Vec<IncomingReading> {
        values
            .into_iter()
            .map(|(label, flow)| IncomingReading {
                sensor_label: label.to_string(),
                flow_lps: flow,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_analyze_detects_and_localizes() {
        let stores = Stores::in_memory();
        let network = seed(&stores).await;
        let orchestrator = AnalysisOrchestrator::new(stores);

        let report = orchestrator
            .analyze(
                network,
                Utc::now(),
                batch([("MAIN_01", 20.0), ("HH_01", 7.0), ("HH_02", 5.0)]),
            )
            .await
            .unwrap();

        assert_eq!(report.readings_stored, 3);
        assert_eq!(report.summary.total, 1);
        assert_eq!(report.summary.severity_breakdown[&Severity::Low], 1);
        assert_eq!(report.summary.localized, 1);

        let analyzed = &report.detections[0];
        assert!((analyzed.detection.flow_imbalance - 8.0).abs() < 1e-9);
        let localization = analyzed.localization.as_ref().unwrap();
        assert!(!localization.top_candidates.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_without_matrix_still_reports_detection() {
        let stores = Stores::in_memory();
        let network = seed(&stores).await;
        // Drop the matrix so localization fails per-detection
        stores.sensitivity.clear(network).await.unwrap();
        let orchestrator = AnalysisOrchestrator::new(stores);

        let report = orchestrator
            .analyze(
                network,
                Utc::now(),
                batch([("MAIN_01", 20.0), ("HH_01", 7.0), ("HH_02", 5.0)]),
            )
            .await
            .unwrap();

        assert_eq!(report.summary.total, 1);
        assert_eq!(report.summary.localized, 0);
        assert!(report.detections[0].localization.is_none());
    }

    #[tokio::test]
    async fn test_no_leak_means_empty_report() {
        let stores = Stores::in_memory();
        let network = seed(&stores).await;
        let orchestrator = AnalysisOrchestrator::new(stores);

        let report = orchestrator
            .analyze(
                network,
                Utc::now(),
                batch([("MAIN_01", 12.0), ("HH_01", 7.0), ("HH_02", 5.0)]),
            )
            .await
            .unwrap();

        assert_eq!(report.readings_stored, 3);
        assert!(report.detections.is_empty());
        assert_eq!(report.summary.total, 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_invalid() {
        let stores = Stores::in_memory();
        let network = seed(&stores).await;
        let orchestrator = AnalysisOrchestrator::new(stores);

        let err = orchestrator
            .analyze(network, Utc::now(), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_unknown_sensor_aborts_with_all_missing_labels() {
        let stores = Stores::in_memory();
        let network = seed(&stores).await;
        let orchestrator = AnalysisOrchestrator::new(stores.clone());

        let err = orchestrator
            .analyze(
                network,
                Utc::now(),
                batch([("MAIN_01", 20.0), ("GHOST_A", 1.0), ("GHOST_B", 2.0)]),
            )
            .await
            .unwrap_err();

        match err {
            CoreError::NotFound { id, .. } => {
                assert!(id.contains("GHOST_A"));
                assert!(id.contains("GHOST_B"));
            }
            other => panic!("expected NotFound, got {other}"),
        }
    }
}
