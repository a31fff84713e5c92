//! Asynchronous sensitivity-matrix builds.
//!
//! One baseline solve, then one leak-perturbed solve per candidate, at most
//! five in flight at a time. Each worker owns its simulator session for the
//! duration of its solve; sessions are closed on every exit path. Entries
//! are upserted in batches of 1000 keyed on
//! `(network, leak node, sensor)`, so candidate completion order does not
//! matter and an interrupted build leaves a consistent partial matrix.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use leaklens_core::{CoreError, CoreResult, NetworkId, UNIT_LEAK_LPS};
use leaklens_epanet::EngineFactory;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::domain::{MatrixStats, NetworkNode, SensitivityEntry, Sensor};
use crate::repository::Stores;
use super::coordinator::BuildCoordinator;
use super::status::{BuildState, BuildStatus};

/// Maximum simultaneous leak-perturbed solves.
pub const MAX_PARALLEL_SOLVES: usize = 5;

/// Entries per persistence upsert.
pub const PERSIST_BATCH: usize = 1000;

/// Builds and maintains the sensitivity matrix of a network.
#[derive(Clone)]
pub struct MatrixBuilder {
    stores: Stores,
    factory: Arc<dyn EngineFactory>,
    coordinator: Arc<BuildCoordinator>,
    storage_dir: PathBuf,
}

impl MatrixBuilder {
    /// Creates a builder over the given engine backend and storage
    /// directory (where imported `.inp` files live).
    #[must_use]
    pub fn new(
        stores: Stores,
        factory: Arc<dyn EngineFactory>,
        coordinator: Arc<BuildCoordinator>,
        storage_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stores,
            factory,
            coordinator,
            storage_dir: storage_dir.into(),
        }
    }

    /// Current build status of a network.
    ///
    /// When no build ran in this process but a persisted matrix exists,
    /// the status reports `Completed` with stats derived from the store.
    pub async fn status(&self, network: NetworkId) -> CoreResult<BuildStatus> {
        let snapshot = self.coordinator.snapshot(network);
        if snapshot.state != BuildState::NotStarted {
            return Ok(snapshot);
        }
        let stats = self.stored_stats(network).await?;
        match stats {
            Some(stats) => Ok(BuildStatus::completed(stats)),
            None => Ok(snapshot),
        }
    }

    /// Starts an asynchronous build, or reports the existing one.
    ///
    /// - Build already running: returns its live progress.
    /// - Matrix present and `force == false`: returns `Completed`
    ///   immediately.
    /// - Otherwise validates the candidate and sensor sets, claims the
    ///   build slot, and spawns the build task.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the network has no candidate nodes with EPANET
    /// ids or no active sensors on EPANET-tagged nodes.
    #[instrument(skip(self), fields(network = %network))]
    pub async fn generate(&self, network: NetworkId, force: bool) -> CoreResult<BuildStatus> {
        let snapshot = self.coordinator.snapshot(network);
        if snapshot.state == BuildState::InProgress {
            return Ok(snapshot);
        }

        if !force {
            if let Some(stats) = self.stored_stats(network).await? {
                return Ok(BuildStatus::completed(stats));
            }
        }

        let candidates = self.candidates(network).await?;
        let sensors = self.simulated_sensors(network).await?;
        if candidates.is_empty() {
            return Err(CoreError::invalid_input(
                "network has no candidate nodes with EPANET ids",
            ));
        }
        if sensors.is_empty() {
            return Err(CoreError::invalid_input(
                "network has no active sensors on EPANET-tagged nodes",
            ));
        }

        if !self.coordinator.try_begin(network, candidates.len()) {
            // Lost the race against a concurrent generate call
            return Ok(self.coordinator.snapshot(network));
        }

        info!(
            candidates = candidates.len(),
            sensors = sensors.len(),
            force,
            "starting sensitivity matrix build"
        );

        let builder = self.clone();
        tokio::spawn(async move {
            match builder.run_build(network, candidates, sensors, force).await {
                Ok(stats) => builder.coordinator.complete(network, stats),
                Err(err) => {
                    warn!(network = %network, error = %err, "matrix build failed");
                    builder.coordinator.fail(network, err.to_string());
                }
            }
        });

        Ok(self.coordinator.snapshot(network))
    }

    /// Candidate leak nodes: every node carrying an EPANET id.
    async fn candidates(&self, network: NetworkId) -> CoreResult<Vec<NetworkNode>> {
        Ok(self
            .stores
            .nodes
            .for_network(network)
            .await?
            .into_iter()
            .filter(NetworkNode::is_leak_candidate)
            .collect())
    }

    /// Active sensors whose host node carries an EPANET id, paired with
    /// that id.
    async fn simulated_sensors(&self, network: NetworkId) -> CoreResult<Vec<(Sensor, String)>> {
        let nodes = self.stores.nodes.for_network(network).await?;
        let sensors = self.stores.sensors.for_network(network).await?;
        Ok(sensors
            .into_iter()
            .filter(|s| s.is_active)
            .filter_map(|sensor| {
                nodes
                    .iter()
                    .find(|n| n.id == sensor.node_id)
                    .and_then(|n| n.epanet_id.clone())
                    .map(|epanet_id| (sensor, epanet_id))
            })
            .collect())
    }

    async fn stored_stats(&self, network: NetworkId) -> CoreResult<Option<MatrixStats>> {
        let entries = self.stores.sensitivity.for_network(network).await?;
        if entries.is_empty() {
            return Ok(None);
        }
        let candidates: std::collections::HashSet<_> =
            entries.iter().map(|e| e.leak_node_id).collect();
        let sensors: std::collections::HashSet<_> = entries.iter().map(|e| e.sensor_id).collect();
        Ok(Some(MatrixStats {
            total_entries: entries.len(),
            candidate_count: candidates.len(),
            sensor_count: sensors.len(),
            generated_at: Utc::now(),
        }))
    }

    /// The build loop: baseline once, then candidates in batches of
    /// [`MAX_PARALLEL_SOLVES`].
    async fn run_build(
        &self,
        network: NetworkId,
        candidates: Vec<NetworkNode>,
        sensors: Vec<(Sensor, String)>,
        force: bool,
    ) -> CoreResult<MatrixStats> {
        let inp_path = self.storage_dir.join(format!("{network}.inp"));
        let sensor_epanet_ids: Vec<String> =
            sensors.iter().map(|(_, epanet)| epanet.clone()).collect();

        // Baseline failures are fatal to the build
        let mut base_session = self.factory.open(&inp_path).await?;
        let baseline = base_session.baseline(&sensor_epanet_ids).await;
        base_session.close();
        let baseline = baseline?;

        if force {
            self.stores.sensitivity.clear(network).await?;
        }

        let semaphore = Arc::new(Semaphore::new(MAX_PARALLEL_SOLVES));
        let total = candidates.len();
        let mut processed = 0usize;
        let mut skipped = 0usize;
        let mut pending: Vec<SensitivityEntry> = Vec::new();

        for batch in candidates.chunks(MAX_PARALLEL_SOLVES) {
            let mut handles = Vec::with_capacity(batch.len());
            for candidate in batch {
                let Some(leak_epanet_id) = candidate.epanet_id.clone() else {
                    continue;
                };
                let semaphore = semaphore.clone();
                let factory = self.factory.clone();
                let inp_path = inp_path.clone();
                let sensor_ids = sensor_epanet_ids.clone();
                let label = candidate.label.clone();
                let node_id = candidate.id;

                handles.push((label, node_id, tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| CoreError::internal("build semaphore closed"))?;
                    // Each worker owns its session for the solve's lifetime
                    let mut session = factory.open(&inp_path).await?;
                    let result = session
                        .with_leak(&leak_epanet_id, UNIT_LEAK_LPS, &sensor_ids)
                        .await;
                    session.close();
                    result
                })));
            }

            for (label, node_id, handle) in handles {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(join_err) => Err(CoreError::internal(format!(
                        "candidate task panicked: {join_err}"
                    ))),
                };
                match outcome {
                    Ok(readings) => {
                        for (sensor, epanet_id) in &sensors {
                            let perturbed =
                                readings.get(epanet_id).copied().unwrap_or(f64::NAN);
                            let base = baseline.get(epanet_id).copied().unwrap_or(f64::NAN);
                            pending.push(SensitivityEntry {
                                network_id: network,
                                leak_node_id: node_id,
                                sensor_id: sensor.id,
                                value: sensitivity_value(perturbed, base, UNIT_LEAK_LPS),
                            });
                        }
                    }
                    Err(err) => {
                        skipped += 1;
                        warn!(candidate = %label, error = %err, "candidate simulation failed; skipping");
                    }
                }
            }

            processed += batch.len();
            self.coordinator.update_progress(network, processed, total);

            while pending.len() >= PERSIST_BATCH {
                let chunk: Vec<SensitivityEntry> = pending.drain(..PERSIST_BATCH).collect();
                self.stores.sensitivity.upsert_batch(chunk).await?;
            }
        }

        if !pending.is_empty() {
            self.stores.sensitivity.upsert_batch(pending).await?;
        }

        let total_entries = self.stores.sensitivity.count(network).await?;
        info!(
            network = %network,
            total_entries,
            candidates = total,
            skipped,
            "sensitivity matrix build finished"
        );

        Ok(MatrixStats {
            total_entries,
            candidate_count: total - skipped,
            sensor_count: sensors.len(),
            generated_at: Utc::now(),
        })
    }
}

/// `(perturbed - base) / leak`, zero for non-positive leak sizes, and zero
/// for non-finite inputs so every persisted entry is finite.
fn sensitivity_value(perturbed: f64, base: f64, leak_lps: f64) -> f64 {
    if leak_lps <= 0.0 {
        return 0.0;
    }
    let value = (perturbed - base) / leak_lps;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
