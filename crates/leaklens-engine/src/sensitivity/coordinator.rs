//! Process-wide build coordination.

use std::collections::HashMap;

use leaklens_core::NetworkId;
use parking_lot::RwLock;

use crate::domain::MatrixStats;
use super::status::{BuildProgress, BuildState, BuildStatus};

/// Process-wide registry of matrix build status, one slot per network.
///
/// The build loop is the only mutator; every reader receives an immutable
/// snapshot copy. `try_begin` is the atomic gate that prevents two builds
/// for the same network from running concurrently.
#[derive(Default)]
pub struct BuildCoordinator {
    statuses: RwLock<HashMap<NetworkId, BuildStatus>>,
}

impl BuildCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a network's build status.
    #[must_use]
    pub fn snapshot(&self, network: NetworkId) -> BuildStatus {
        self.statuses
            .read()
            .get(&network)
            .cloned()
            .unwrap_or_else(BuildStatus::not_started)
    }

    /// Atomically claims the build slot for a network.
    ///
    /// Returns `false` when a build is already in progress; the caller
    /// should then report the live status instead of starting a second
    /// build.
    #[must_use]
    pub fn try_begin(&self, network: NetworkId, total: usize) -> bool {
        let mut statuses = self.statuses.write();
        if let Some(status) = statuses.get(&network) {
            if status.state == BuildState::InProgress {
                return false;
            }
        }
        statuses.insert(
            network,
            BuildStatus::in_progress(BuildProgress::of(0, total)),
        );
        true
    }

    /// Publishes progress after a batch of candidates completed.
    pub fn update_progress(&self, network: NetworkId, processed: usize, total: usize) {
        self.statuses.write().insert(
            network,
            BuildStatus::in_progress(BuildProgress::of(processed, total)),
        );
    }

    /// Marks the build completed.
    pub fn complete(&self, network: NetworkId, stats: MatrixStats) {
        self.statuses
            .write()
            .insert(network, BuildStatus::completed(stats));
    }

    /// Marks the build failed.
    pub fn fail(&self, network: NetworkId, error: impl Into<String>) {
        self.statuses
            .write()
            .insert(network, BuildStatus::failed(error));
    }
}
