//! Hydraulic engine port and the bundled steady-state backend.
//!
//! [`EngineFactory`] opens [`SimulatorSession`]s over a stored `.inp` file.
//! Sessions are single-threaded; callers that want parallelism open one
//! session per worker. Every session guarantees:
//!
//! - load retries (3 attempts, 1 s backoff) surfacing
//!   `SimulatorUnavailable` on exhaustion;
//! - a 30 s bound on each solve, surfacing `SimulationFailed`;
//! - restoration of the original base demand after a leak perturbation on
//!   every exit path;
//! - idempotent close.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use leaklens_core::{utils, CoreError, CoreResult};
use tracing::debug;

use crate::parser::parse_inp_file;
use crate::solver::{SolveError, SteadyStateSolver};

/// Wall-clock bound for a single steady-state solve.
pub const SOLVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of load attempts before giving up.
pub const LOAD_ATTEMPTS: u32 = 3;

/// Backoff between load attempts.
pub const LOAD_BACKOFF: Duration = Duration::from_secs(1);

/// A single-threaded simulation session over one loaded network.
#[async_trait]
pub trait SimulatorSession: Send + std::fmt::Debug {
    /// Runs the unperturbed steady-state solve and reads the given sensor
    /// nodes.
    ///
    /// # Errors
    ///
    /// `SimulationFailed` when the solve fails or exceeds its bound,
    /// `NoValidReadings` when every sensor value is NaN or infinite.
    async fn baseline(&mut self, sensor_ids: &[String]) -> CoreResult<HashMap<String, f64>>;

    /// Adds `leak_lps` to the base demand at `leak_id`, re-solves, reads the
    /// sensors, and restores the original demand before returning.
    async fn with_leak(
        &mut self,
        leak_id: &str,
        leak_lps: f64,
        sensor_ids: &[String],
    ) -> CoreResult<HashMap<String, f64>>;

    /// Releases engine resources. Safe to call more than once.
    fn close(&mut self);

    /// Whether the session has been closed.
    fn is_closed(&self) -> bool;
}

/// Opens simulation sessions; one per worker.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Opens a session over the `.inp` file at `path`.
    ///
    /// # Errors
    ///
    /// `SimulatorUnavailable` after [`LOAD_ATTEMPTS`] failed loads.
    async fn open(&self, path: &Path) -> CoreResult<Box<dyn SimulatorSession>>;
}

/// Factory for the bundled demand-driven steady-state backend.
#[derive(Debug, Clone, Default)]
pub struct SteadyStateFactory;

#[async_trait]
impl EngineFactory for SteadyStateFactory {
    async fn open(&self, path: &Path) -> CoreResult<Box<dyn SimulatorSession>> {
        let mut last_error = String::new();
        for attempt in 1..=LOAD_ATTEMPTS {
            match parse_inp_file(path) {
                Ok(network) => {
                    debug!(path = %path.display(), attempt, "simulator session opened");
                    return Ok(Box::new(SteadyStateSession::new(
                        SteadyStateSolver::from_network(&network),
                    )));
                }
                Err(err) => {
                    last_error = err.to_string();
                    if attempt < LOAD_ATTEMPTS {
                        tokio::time::sleep(LOAD_BACKOFF).await;
                    }
                }
            }
        }
        Err(CoreError::SimulatorUnavailable {
            attempts: LOAD_ATTEMPTS,
            message: last_error,
        })
    }
}

/// Session over the bundled steady-state solver.
#[derive(Debug)]
pub struct SteadyStateSession {
    solver: Option<SteadyStateSolver>,
}

impl SteadyStateSession {
    /// Wraps a solver in a fresh session.
    #[must_use]
    pub fn new(solver: SteadyStateSolver) -> Self {
        Self {
            solver: Some(solver),
        }
    }

    fn solver_mut(&mut self) -> CoreResult<&mut SteadyStateSolver> {
        self.solver
            .as_mut()
            .ok_or_else(|| CoreError::internal("simulator session already closed"))
    }

    /// Solves within [`SOLVE_TIMEOUT`] and reads the sensor nodes.
    ///
    /// Unknown sensor ids read as NaN so a fully mismatched sensor set
    /// surfaces as `NoValidReadings` rather than a partial result.
    async fn run_solve(&mut self, sensor_ids: &[String]) -> CoreResult<HashMap<String, f64>> {
        let solver = self.solver_mut()?.clone();
        let solve = tokio::task::spawn_blocking(move || solver.solve());

        let flows = match tokio::time::timeout(SOLVE_TIMEOUT, solve).await {
            Err(_) => {
                return Err(CoreError::simulation_failed(format!(
                    "solve exceeded {} s",
                    SOLVE_TIMEOUT.as_secs()
                )))
            }
            Ok(Err(join_err)) => {
                return Err(CoreError::simulation_failed(format!(
                    "solver task failed: {join_err}"
                )))
            }
            Ok(Ok(Err(SolveError::Cycle { unreached }))) => {
                return Err(CoreError::simulation_failed(format!(
                    "network is not a forest: {unreached} unreachable node(s)"
                )))
            }
            Ok(Ok(Err(err))) => return Err(CoreError::simulation_failed(err.to_string())),
            Ok(Ok(Ok(flows))) => flows,
        };

        let readings: HashMap<String, f64> = sensor_ids
            .iter()
            .map(|id| (id.clone(), flows.get(id).copied().unwrap_or(f64::NAN)))
            .collect();

        let values: Vec<f64> = readings.values().copied().collect();
        if utils::all_non_finite(&values) {
            return Err(CoreError::NoValidReadings {
                sensor_count: sensor_ids.len(),
            });
        }

        Ok(readings)
    }
}

#[async_trait]
impl SimulatorSession for SteadyStateSession {
    async fn baseline(&mut self, sensor_ids: &[String]) -> CoreResult<HashMap<String, f64>> {
        self.run_solve(sensor_ids).await
    }

    async fn with_leak(
        &mut self,
        leak_id: &str,
        leak_lps: f64,
        sensor_ids: &[String],
    ) -> CoreResult<HashMap<String, f64>> {
        let original = self
            .solver_mut()?
            .demand(leak_id)
            .ok_or_else(|| CoreError::not_found("Node", leak_id))?;

        self.solver_mut()?
            .set_demand(leak_id, original + leak_lps)
            .map_err(|e| CoreError::simulation_failed(e.to_string()))?;

        let result = self.run_solve(sensor_ids).await;

        // Restore the base demand before the result is inspected, so the
        // session is clean even when the solve failed
        if let Some(solver) = self.solver.as_mut() {
            let _ = solver.set_demand(leak_id, original);
        }

        result
    }

    fn close(&mut self) {
        if self.solver.take().is_some() {
            debug!("simulator session closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.solver.is_none()
    }
}

impl Drop for SteadyStateSession {
    fn drop(&mut self) {
        self.close();
    }
}
