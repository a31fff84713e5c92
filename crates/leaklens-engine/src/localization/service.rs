//! Localization of a persisted detection.
//!
//! Builds the observed sensor-change vector from the readings around the
//! detection instant, predicts each candidate's change from its matrix row
//! scaled by the estimated leak size, ranks candidates by score, and writes
//! the winner back onto the detection.

use std::collections::{BTreeSet, HashMap};

use chrono::{Duration, Utc};
use leaklens_core::{
    CoreError, CoreResult, DetectionId, NetworkId, NodeId, SensorId, Timestamp, utils,
    DEFAULT_WINDOW_SECS,
};
use ndarray::Array1;
use serde::Serialize;
use tracing::{info, instrument};

use crate::repository::Stores;
use crate::topology::TopologyService;
use super::scoring::candidate_score;

/// Number of ranked candidates returned alongside the winner.
pub const TOP_CANDIDATES: usize = 10;

/// One ranked candidate.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    /// Candidate node
    pub node_id: NodeId,
    /// Candidate node label
    pub label: String,
    /// Combined RSS/correlation score
    pub score: f64,
}

/// Result of a successful localization.
#[derive(Debug, Clone, Serialize)]
pub struct LocalizationOutcome {
    /// The detection that was localized
    pub detection_id: DetectionId,
    /// Owning network
    pub network_id: NetworkId,
    /// Most likely leak node
    pub node_id: NodeId,
    /// Label of the most likely leak node
    pub label: String,
    /// Score of the winner
    pub score: f64,
    /// The ranked top candidates, winner first
    pub top_candidates: Vec<CandidateScore>,
    /// When localization ran
    pub localized_at: Timestamp,
}

/// Scores matrix candidates against observed sensor changes.
#[derive(Clone)]
pub struct LocalizationService {
    stores: Stores,
    topology: TopologyService,
}

impl LocalizationService {
    /// Creates the service over a repository bundle.
    #[must_use]
    pub fn new(stores: Stores) -> Self {
        Self {
            topology: TopologyService::new(stores.clone()),
            stores,
        }
    }

    /// Localizes a detection and transitions it to `Localized`.
    ///
    /// # Errors
    ///
    /// - `Conflict` when the detection is not in the `Detected` state.
    /// - `LocalizationUndetermined` when no sensor has readings in both
    ///   windows, no candidate survives the DMA restriction, or the best
    ///   score is not positive. The detection keeps its `Detected` status
    ///   in that case.
    #[instrument(skip(self), fields(detection = %detection_id))]
    pub async fn localize(
        &self,
        detection_id: DetectionId,
        baseline_window_secs: i64,
    ) -> CoreResult<LocalizationOutcome> {
        if baseline_window_secs <= 0 {
            return Err(CoreError::invalid_input(format!(
                "baseline window must be positive, got {baseline_window_secs} s"
            )));
        }

        let mut detection = self.stores.detections.get(detection_id).await?;
        if !detection.status().can_localize() {
            return Err(CoreError::conflict(format!(
                "detection {} has status {}, localization requires DETECTED",
                detection.id,
                detection.status()
            )));
        }

        let network = detection.network_id;
        let entries = self.stores.sensitivity.for_network(network).await?;
        if entries.is_empty() {
            return Err(CoreError::undetermined(
                "no sensitivity matrix for this network",
            ));
        }

        // Deterministic sensor ordering for the change vectors
        let sensor_columns: Vec<SensorId> = entries
            .iter()
            .map(|e| e.sensor_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let window_secs = detection.time_window_secs.unwrap_or(DEFAULT_WINDOW_SECS);
        let observed = self
            .observed_changes(&sensor_columns, detection.timestamp, window_secs, baseline_window_secs)
            .await?;
        if observed.is_empty() {
            return Err(CoreError::undetermined(
                "no sensor has readings in both the detection and baseline windows",
            ));
        }

        let kept: Vec<SensorId> = observed.iter().map(|(id, _)| *id).collect();
        let o = Array1::from_iter(observed.iter().map(|(_, change)| *change));

        // Candidate rows, optionally restricted to the detection's DMA
        let mut rows: HashMap<NodeId, HashMap<SensorId, f64>> = HashMap::new();
        for entry in entries {
            rows.entry(entry.leak_node_id)
                .or_default()
                .insert(entry.sensor_id, entry.value);
        }
        if let Some(partition) = detection.partition_id {
            let members = self.topology.nodes_in_dma(partition).await?;
            rows.retain(|node, _| members.contains(node));
        }
        if rows.is_empty() {
            return Err(CoreError::undetermined(
                "no candidate has sensitivity entries in scope",
            ));
        }

        let leak_size = detection.flow_imbalance;
        let mut ranked: Vec<(NodeId, f64)> = rows
            .into_iter()
            .map(|(node, row)| {
                let p = Array1::from_iter(
                    kept.iter()
                        .map(|sensor| row.get(sensor).copied().unwrap_or(0.0) * leak_size),
                );
                let (score, _) = candidate_score(&o, &p);
                (node, score)
            })
            .collect();

        // Descending score; equal scores break ties by node id so the
        // ranking is reproducible
        ranked.sort_by(|a, b| {
            if utils::scores_tied(a.1, b.1) {
                a.0.cmp(&b.0)
            } else {
                b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
            }
        });

        let &(winner, best_score) = ranked
            .first()
            .ok_or_else(|| CoreError::undetermined("no candidates were scored"))?;
        if best_score <= 0.0 {
            return Err(CoreError::undetermined(
                "no candidate matched the observed sensor changes",
            ));
        }

        let labels: HashMap<NodeId, String> = self
            .stores
            .nodes
            .for_network(network)
            .await?
            .into_iter()
            .map(|n| (n.id, n.label))
            .collect();
        let label_of =
            |id: NodeId| -> String { labels.get(&id).cloned().unwrap_or_else(|| id.to_string()) };

        detection.localize(winner, best_score)?;
        self.stores.detections.update(detection).await?;

        info!(winner = %label_of(winner), score = best_score, "detection localized");

        Ok(LocalizationOutcome {
            detection_id,
            network_id: network,
            node_id: winner,
            label: label_of(winner),
            score: best_score,
            top_candidates: ranked
                .into_iter()
                .take(TOP_CANDIDATES)
                .map(|(node, score)| CandidateScore {
                    node_id: node,
                    label: label_of(node),
                    score,
                })
                .collect(),
            localized_at: Utc::now(),
        })
    }

    /// Observed change per sensor: mean over the detection window minus
    /// mean over the baseline window. Sensors missing either window are
    /// dropped.
    async fn observed_changes(
        &self,
        sensors: &[SensorId],
        timestamp: Timestamp,
        window_secs: i64,
        baseline_window_secs: i64,
    ) -> CoreResult<Vec<(SensorId, f64)>> {
        let detect_from = timestamp - Duration::seconds(window_secs);
        let baseline_from = detect_from - Duration::seconds(baseline_window_secs);

        let mut changes = Vec::new();
        for &sensor in sensors {
            // Baseline window is half-open: [T - Wd - Wb, T - Wd)
            let baseline: Vec<f64> = self
                .stores
                .readings
                .in_window(sensor, baseline_from, detect_from)
                .await?
                .into_iter()
                .filter(|r| r.timestamp < detect_from)
                .map(|r| r.flow_lps)
                .collect();
            let Some(baseline_mean) = utils::mean(&baseline) else {
                continue;
            };

            let recent: Vec<f64> = self
                .stores
                .readings
                .in_window(sensor, detect_from, timestamp)
                .await?
                .into_iter()
                .map(|r| r.flow_lps)
                .collect();
            let Some(recent_mean) = utils::mean(&recent) else {
                continue;
            };

            changes.push((sensor, recent_mean - baseline_mean));
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LeakDetection, NetworkNode, Reading, SensitivityEntry, Sensor};
    use leaklens_core::{DetectionStatus, NodeKind, ReadingSource, SensorKind};

    struct Fixture {
        stores: Stores,
        service: LocalizationService,
        network: NetworkId,
        nodes: HashMap<String, NodeId>,
        sensors: HashMap<String, SensorId>,
    }

    /// Chain M -> B -> {H1, H2} with meters on M, H1, H2, and a seeded
    /// matrix that mirrors the tree: a leak is seen by the mainline meter
    /// and by the meter on the leak node itself.
    async fn fixture() -> Fixture {
        let stores = Stores::in_memory();
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

        let mut nodes = HashMap::new();
        for node in [&m, &b, &h1, &h2] {
            nodes.insert(node.label.clone(), node.id);
        }
        let mut sensors = HashMap::new();
        for sensor in [&s_m, &s_h1, &s_h2] {
            sensors.insert(sensor.label.clone(), sensor.id);
        }

        for node in [m, b, h1, h2] {
            stores.nodes.insert(node).await.unwrap();
        }
        for sensor in [s_m, s_h1, s_h2] {
            stores.sensors.insert(sensor).await.unwrap();
        }

        // Row(c)[s] = 1 when the meter at s sees a leak at c
        let mut entries = Vec::new();
        let row = |c: &str, s: &str, v: f64, nodes: &HashMap<String, NodeId>, sensors: &HashMap<String, SensorId>| SensitivityEntry {
            network_id: network,
            leak_node_id: nodes[c],
            sensor_id: sensors[s],
            value: v,
        };
        for candidate in ["M", "B", "H1", "H2"] {
            entries.push(row(candidate, "MAIN_01", 1.0, &nodes, &sensors));
            entries.push(row(
                candidate,
                "HH_01",
                if candidate == "H1" { 1.0 } else { 0.0 },
                &nodes,
                &sensors,
            ));
            entries.push(row(
                candidate,
                "HH_02",
                if candidate == "H2" { 1.0 } else { 0.0 },
                &nodes,
                &sensors,
            ));
        }
        stores.sensitivity.upsert_batch(entries).await.unwrap();

        Fixture {
            service: LocalizationService::new(stores.clone()),
            stores,
            network,
            nodes,
            sensors,
        }
    }

    /// Stores a baseline sample an hour back and a recent sample for each
    /// meter, so the observed change is `recent - baseline`.
    async fn seed_windows(fx: &Fixture, t: Timestamp, baseline: [f64; 3], recent: [f64; 3]) {
        let labels = ["MAIN_01", "HH_01", "HH_02"];
        let mut readings = Vec::new();
        for (label, (base, now)) in labels.iter().zip(baseline.iter().zip(recent.iter())) {
            readings.push(Reading::new(
                fx.network,
                fx.sensors[*label],
                *base,
                t - Duration::seconds(1000),
                ReadingSource::Sensor,
            ));
            readings.push(Reading::new(
                fx.network,
                fx.sensors[*label],
                *now,
                t,
                ReadingSource::Sensor,
            ));
        }
        fx.stores.readings.insert_many(readings).await.unwrap();
    }

    async fn seed_detection(fx: &Fixture, t: Timestamp, imbalance: f64) -> DetectionId {
        let detection = LeakDetection::new(fx.network, fx.nodes["B"], imbalance, t)
            .with_parameters(300, 5.0);
        let id = detection.id;
        fx.stores.detections.insert(detection).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_exact_row_match_wins() {
        let fx = fixture().await;
        let t = Utc::now();
        // Leak of 2 L/s at H1: mainline and HH_01 each rise by 2
        seed_windows(&fx, t, [12.0, 7.0, 5.0], [14.0, 9.0, 5.0]).await;
        let detection_id = seed_detection(&fx, t, 2.0).await;

        let outcome = fx.service.localize(detection_id, 3600).await.unwrap();
        assert_eq!(outcome.node_id, fx.nodes["H1"]);
        assert_eq!(outcome.label, "H1");
        assert!(outcome.score > 0.9);
        assert!(outcome.top_candidates.len() <= TOP_CANDIDATES);
        assert_eq!(outcome.top_candidates[0].node_id, outcome.node_id);

        // Status was written back
        let stored = fx.stores.detections.get(detection_id).await.unwrap();
        assert_eq!(stored.status(), DetectionStatus::Localized);
        assert_eq!(stored.localized_node_id, Some(fx.nodes["H1"]));
        assert!(stored.localization_score.unwrap() > 0.9);
    }

    #[tokio::test]
    async fn test_ranking_is_scale_invariant() {
        let t = Utc::now();

        let fx1 = fixture().await;
        seed_windows(&fx1, t, [12.0, 7.0, 5.0], [14.0, 9.0, 5.0]).await;
        let d1 = seed_detection(&fx1, t, 2.0).await;
        let first = fx1.service.localize(d1, 3600).await.unwrap();

        // Scale observed changes and leak size by k = 3
        let fx2 = fixture().await;
        seed_windows(&fx2, t, [12.0, 7.0, 5.0], [18.0, 13.0, 5.0]).await;
        let d2 = seed_detection(&fx2, t, 6.0).await;
        let second = fx2.service.localize(d2, 3600).await.unwrap();

        // The winner is invariant under joint scaling, and both runs rank
        // the same candidate set
        assert_eq!(first.label, second.label);
        assert_eq!(first.node_id, second.node_id);
        let set1: std::collections::BTreeSet<&str> = first
            .top_candidates
            .iter()
            .map(|c| c.label.as_str())
            .collect();
        let set2: std::collections::BTreeSet<&str> = second
            .top_candidates
            .iter()
            .map(|c| c.label.as_str())
            .collect();
        assert_eq!(set1, set2);
    }

    #[tokio::test]
    async fn test_dma_restriction_contains_winner() {
        let fx = fixture().await;
        let topology = TopologyService::new(fx.stores.clone());
        let dma = topology
            .create_dmas_for_mainlines(fx.network)
            .await
            .unwrap()
            .remove(0);

        let t = Utc::now();
        seed_windows(&fx, t, [12.0, 7.0, 5.0], [14.0, 9.0, 5.0]).await;
        let detection = LeakDetection::new(fx.network, fx.nodes["B"], 2.0, t)
            .with_partition(dma.id)
            .with_parameters(300, 5.0);
        let id = detection.id;
        fx.stores.detections.insert(detection).await.unwrap();

        let outcome = fx.service.localize(id, 3600).await.unwrap();
        let members = topology.nodes_in_dma(dma.id).await.unwrap();
        assert!(members.contains(&outcome.node_id));
    }

    #[tokio::test]
    async fn test_no_readings_is_undetermined() {
        let fx = fixture().await;
        let t = Utc::now();
        let detection_id = seed_detection(&fx, t, 2.0).await;

        let err = fx.service.localize(detection_id, 3600).await.unwrap_err();
        assert!(matches!(err, CoreError::LocalizationUndetermined { .. }));

        // The detection keeps its initial status
        let stored = fx.stores.detections.get(detection_id).await.unwrap();
        assert_eq!(stored.status(), DetectionStatus::Detected);
    }

    #[tokio::test]
    async fn test_localize_twice_conflicts() {
        let fx = fixture().await;
        let t = Utc::now();
        seed_windows(&fx, t, [12.0, 7.0, 5.0], [14.0, 9.0, 5.0]).await;
        let detection_id = seed_detection(&fx, t, 2.0).await;

        fx.service.localize(detection_id, 3600).await.unwrap();
        let err = fx.service.localize(detection_id, 3600).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_invalid_baseline_window() {
        let fx = fixture().await;
        let detection_id = seed_detection(&fx, Utc::now(), 2.0).await;
        let err = fx.service.localize(detection_id, 0).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_tied_scores_break_by_node_id() {
        let fx = fixture().await;
        let t = Utc::now();
        // Only the mainline meter changes: candidates B, H1, H2 all
        // predict the same mainline response, so their scores tie
        seed_windows(&fx, t, [12.0, 7.0, 5.0], [14.0, 7.0, 5.0]).await;
        let detection_id = seed_detection(&fx, t, 2.0).await;

        let outcome = fx.service.localize(detection_id, 3600).await.unwrap();
        let tied: Vec<&CandidateScore> = outcome
            .top_candidates
            .iter()
            .filter(|c| utils::scores_tied(c.score, outcome.score))
            .collect();
        assert!(tied.len() > 1);
        for pair in tied.windows(2) {
            assert!(pair[0].node_id <= pair[1].node_id);
        }
    }
}
