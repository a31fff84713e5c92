//! End-to-end pipeline tests: import an EPANET model, build the
//! sensitivity matrix against the stored file, feed readings, and run the
//! full detect-and-localize analysis.
//!
//! All signals are deterministic; no mocks beyond the in-memory stores.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leaklens_core::{NetworkId, NodeId, ReadingSource, SensorId, SensorKind, Severity};
use leaklens_engine::analysis::{AnalysisOrchestrator, IncomingReading};
use leaklens_engine::detection::{DetectionRequest, MassBalanceDetector};
use leaklens_engine::domain::{Reading, Sensor};
use leaklens_engine::repository::Stores;
use leaklens_engine::sensitivity::{BuildCoordinator, BuildState, BuildStatus, MatrixBuilder};
use leaklens_engine::topology::TopologyService;
use leaklens_engine::ImportService;
use leaklens_epanet::SteadyStateFactory;

/// MAIN `M` feeding junction `B` which feeds eight households; ten nodes
/// total so the matrix shape is easy to assert.
const WIDE_CHAIN: &str = "\
[TITLE]
End-to-end test network
[RESERVOIRS]
M 250
[JUNCTIONS]
B 100 0.0
H1 95 7.0
H2 95 5.0
H3 95 1.0
H4 95 1.0
H5 95 1.0
H6 95 1.0
H7 95 1.0
H8 95 1.0
[PIPES]
P0 M B 1000 300 100
P1 B H1 100 100 100
P2 B H2 100 100 100
P3 B H3 100 100 100
P4 B H4 100 100 100
P5 B H5 100 100 100
P6 B H6 100 100 100
P7 B H7 100 100 100
P8 B H8 100 100 100
";

struct Pipeline {
    stores: Stores,
    network: NetworkId,
    nodes: HashMap<String, NodeId>,
    sensors: HashMap<String, SensorId>,
    builder: MatrixBuilder,
    orchestrator: AnalysisOrchestrator,
    _dir: tempfile::TempDir,
}

/// Imports the model and mounts meters on M, H1, and H2.
async fn pipeline() -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let stores = Stores::in_memory();

    let import = ImportService::new(stores.clone(), dir.path());
    let report = import
        .import_inp(Some("e2e".into()), WIDE_CHAIN.as_bytes())
        .await
        .unwrap();
    assert_eq!(report.nodes_imported, 10);
    assert_eq!(report.dmas_created, 1);
    let network = report.network_id;

    let nodes: HashMap<String, NodeId> = stores
        .nodes
        .for_network(network)
        .await
        .unwrap()
        .into_iter()
        .map(|n| (n.label.clone(), n.id))
        .collect();

    let mut sensors = HashMap::new();
    for (label, node, kind) in [
        ("MAIN_01", "M", SensorKind::MainlineFlow),
        ("HH_01", "H1", SensorKind::HouseholdFlow),
        ("HH_02", "H2", SensorKind::HouseholdFlow),
    ] {
        let sensor = Sensor::new(network, label, kind, nodes[node]);
        sensors.insert(label.to_string(), sensor.id);
        stores.sensors.insert(sensor).await.unwrap();
    }

    let builder = MatrixBuilder::new(
        stores.clone(),
        Arc::new(SteadyStateFactory),
        Arc::new(BuildCoordinator::new()),
        dir.path(),
    );

    Pipeline {
        orchestrator: AnalysisOrchestrator::new(stores.clone()),
        stores,
        network,
        nodes,
        sensors,
        builder,
        _dir: dir,
    }
}

async fn build_matrix(p: &Pipeline) -> BuildStatus {
    p.builder.generate(p.network, false).await.unwrap();
    for _ in 0..300 {
        let status = p.builder.status(p.network).await.unwrap();
        match status.state {
            BuildState::Completed | BuildState::Error => return status,
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    panic!("matrix build did not finish");
}

/// One balanced sample per meter, `offset` seconds before `t`.
async fn seed_readings(p: &Pipeline, t: chrono::DateTime<Utc>, offset: i64, values: [f64; 3]) {
    let readings: Vec<Reading> = ["MAIN_01", "HH_01", "HH_02"]
        .iter()
        .zip(values)
        .map(|(label, flow)| {
            Reading::new(
                p.network,
                p.sensors[*label],
                flow,
                t - chrono::Duration::seconds(offset),
                ReadingSource::Sensor,
            )
        })
        .collect();
    p.stores.readings.insert_many(readings).await.unwrap();
}

#[tokio::test]
async fn test_matrix_shape_is_candidates_times_sensors() {
    let p = pipeline().await;
    let status = build_matrix(&p).await;

    assert_eq!(status.state, BuildState::Completed);
    let stats = status.stats.unwrap();
    // 10 EPANET-tagged candidates x 3 sensors
    assert_eq!(stats.total_entries, 30);
    assert_eq!(stats.candidate_count, 10);
    assert_eq!(stats.sensor_count, 3);

    // Idempotence: a second non-forced generate reports identical counts
    let again = p.builder.generate(p.network, false).await.unwrap();
    assert_eq!(again.state, BuildState::Completed);
    assert_eq!(again.stats.unwrap().total_entries, 30);

    // Every entry is finite and within the unit-leak bound
    let entries = p.stores.sensitivity.for_network(p.network).await.unwrap();
    for entry in entries {
        assert!(entry.value.is_finite());
        assert!(entry.value.abs() <= 1.0 + 1e-9);
    }
}

#[tokio::test]
async fn test_analyze_detects_and_localizes_leak() {
    let p = pipeline().await;
    build_matrix(&p).await;

    let t = Utc::now();
    // Hour-old baseline where the metered flows balance
    seed_readings(&p, t, 1000, [12.0, 7.0, 5.0]).await;

    // Leak of 8 L/s below B: the mainline meter rises, households do not
    let report = p
        .orchestrator
        .analyze(
            p.network,
            t,
            vec![
                IncomingReading {
                    sensor_label: "MAIN_01".into(),
                    flow_lps: 20.0,
                },
                IncomingReading {
                    sensor_label: "HH_01".into(),
                    flow_lps: 7.0,
                },
                IncomingReading {
                    sensor_label: "HH_02".into(),
                    flow_lps: 5.0,
                },
            ],
        )
        .await
        .unwrap();

    assert_eq!(report.readings_stored, 3);
    assert_eq!(report.summary.total, 1);
    assert_eq!(report.summary.severity_breakdown[&Severity::Low], 1);

    let analyzed = &report.detections[0];
    assert_eq!(analyzed.detection.node_id, p.nodes["B"]);
    assert!((analyzed.detection.flow_imbalance - 8.0).abs() < 1e-9);

    // Localization ran against the built matrix
    assert_eq!(report.summary.localized, 1);
    let localization = analyzed.localization.as_ref().unwrap();
    assert!(!localization.top_candidates.is_empty());
    assert!(localization.score > 0.0);
}

#[tokio::test]
async fn test_dma_detection_and_containment() {
    let p = pipeline().await;
    build_matrix(&p).await;

    let topology = TopologyService::new(p.stores.clone());
    let dma = p
        .stores
        .partitions
        .for_network(p.network)
        .await
        .unwrap()
        .remove(0);

    let t = Utc::now();
    seed_readings(&p, t, 1000, [18.0, 7.0, 5.0]).await;
    seed_readings(&p, t, 0, [26.0, 7.0, 5.0]).await;

    let detector = MassBalanceDetector::new(p.stores.clone());
    let detections = detector
        .detect(&DetectionRequest::new(p.network, t).with_partition(dma.id))
        .await
        .unwrap();

    assert_eq!(detections.len(), 1);
    let detection = &detections[0];
    // DMA inflow 26 minus household outflow 12
    assert!((detection.flow_imbalance - 14.0).abs() < 1e-9);
    assert_eq!(detection.severity(), Severity::Medium);
    assert_eq!(detection.partition_id, Some(dma.id));

    // The localized node stays inside the DMA
    let localizer = leaklens_engine::LocalizationService::new(p.stores.clone());
    let outcome = localizer.localize(detection.id, 3600).await.unwrap();
    let members = topology.nodes_in_dma(dma.id).await.unwrap();
    assert!(members.contains(&outcome.node_id));
}

#[tokio::test]
async fn test_balanced_network_yields_no_detections() {
    let p = pipeline().await;

    let t = Utc::now();
    seed_readings(&p, t, 1000, [18.0, 7.0, 5.0]).await;

    let report = p
        .orchestrator
        .analyze(
            p.network,
            t,
            vec![
                IncomingReading {
                    sensor_label: "MAIN_01".into(),
                    flow_lps: 12.0,
                },
                IncomingReading {
                    sensor_label: "HH_01".into(),
                    flow_lps: 7.0,
                },
                IncomingReading {
                    sensor_label: "HH_02".into(),
                    flow_lps: 5.0,
                },
            ],
        )
        .await
        .unwrap();

    assert!(report.detections.is_empty());
    assert_eq!(report.summary.total, 0);
    assert_eq!(report.summary.localized, 0);
}
