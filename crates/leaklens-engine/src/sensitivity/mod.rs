//! Sensitivity-matrix generation.
//!
//! The matrix is built by running one leak-perturbed steady-state
//! simulation per candidate node and comparing each against a single
//! baseline solve. Builds run asynchronously with bounded parallelism;
//! progress is observable through the process-wide [`BuildCoordinator`].

mod builder;
mod coordinator;
mod status;

pub use builder::{MatrixBuilder, MAX_PARALLEL_SOLVES, PERSIST_BATCH};
pub use coordinator::BuildCoordinator;
pub use status::{BuildProgress, BuildState, BuildStatus};
