//! # Leaklens Engine
//!
//! Leak detection and localization for water distribution networks.
//!
//! The engine turns a sparse set of flow-sensor readings into located leaks
//! through three coupled subsystems:
//!
//! - **Sensitivity matrix** ([`sensitivity`]): repeated hydraulic
//!   simulations with a synthetic unit leak at each candidate node produce a
//!   sensor-versus-candidate matrix, built with bounded parallelism and
//!   persisted as a sparse upsertable table.
//!
//! - **Mass-balance detection** ([`detection`]): conservation-law imbalance
//!   over time-windowed sensor aggregates, at a single node, a DMA, or every
//!   junction and branch of the network.
//!
//! - **Localization** ([`localization`]): each candidate is scored by
//!   comparing its predicted sensor-change vector (matrix row times leak
//!   size) against the observed change vector.
//!
//! Around the numerical core sit the [`domain`] entities, the
//! [`topology`] graph, the [`repository`] abstraction with its bundled
//! in-memory backend, EPANET [`import`], sensor [`placement`], the one-shot
//! [`analysis`] orchestrator, and a REST [`api`].
//!
//! ## Architecture
//!
//! ```text
//! .inp upload ──► import ──► topology + DMAs
//!                                │
//!            simulator sessions ─┴─► sensitivity matrix
//!                                          │
//! readings ──► detection ──► (imbalance) ──► localization ──► report
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use leaklens_engine::analysis::AnalysisOrchestrator;
//! use leaklens_engine::repository::Stores;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), leaklens_core::CoreError> {
//!     let stores = Stores::in_memory();
//!     let orchestrator = AnalysisOrchestrator::new(stores);
//!     // ... import a network, store readings, then:
//!     // let report = orchestrator.analyze(network_id, timestamp, readings).await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod analysis;
pub mod api;
pub mod detection;
pub mod domain;
pub mod import;
pub mod localization;
pub mod placement;
pub mod repository;
pub mod sensitivity;
pub mod topology;

pub use analysis::{AnalysisOrchestrator, AnalysisReport, IncomingReading};
pub use detection::{DetectionRequest, MassBalanceDetector};
pub use domain::{
    LeakDetection, Network, NetworkNode, Partition, Reading, SensitivityEntry, Sensor,
};
pub use import::{ImportReport, ImportService};
pub use localization::{CandidateScore, LocalizationOutcome, LocalizationService};
pub use placement::PlacementService;
pub use repository::{MemoryStore, Stores};
pub use sensitivity::{BuildCoordinator, BuildState, BuildStatus, MatrixBuilder};
pub use topology::{TopologyGraph, TopologyService};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
