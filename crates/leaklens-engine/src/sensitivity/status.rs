//! Build status snapshots.

use leaklens_core::utils;
use serde::{Deserialize, Serialize};

use crate::domain::MatrixStats;

/// Lifecycle state of a matrix build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    /// No build has run and no matrix is stored
    NotStarted,
    /// A build is currently running
    InProgress,
    /// A matrix is available
    Completed,
    /// The last build failed before producing a matrix
    Error,
}

/// Progress of an in-flight build.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BuildProgress {
    /// Candidates processed so far
    pub processed: usize,
    /// Total candidates in this build
    pub total: usize,
    /// Whole-number percentage, `round(100 * processed / total)`
    pub percentage: u8,
}

impl BuildProgress {
    /// Progress for `processed` of `total` candidates.
    #[must_use]
    pub fn of(processed: usize, total: usize) -> Self {
        Self {
            processed,
            total,
            percentage: utils::percentage(processed, total),
        }
    }
}

/// Immutable snapshot of a build's observable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStatus {
    /// Lifecycle state
    pub state: BuildState,
    /// Progress, present while `InProgress`
    pub progress: Option<BuildProgress>,
    /// Matrix statistics, present once `Completed`
    pub stats: Option<MatrixStats>,
    /// Failure description, present when `Error`
    pub error: Option<String>,
}

impl BuildStatus {
    /// The idle status.
    #[must_use]
    pub fn not_started() -> Self {
        Self {
            state: BuildState::NotStarted,
            progress: None,
            stats: None,
            error: None,
        }
    }

    /// An in-progress status.
    #[must_use]
    pub fn in_progress(progress: BuildProgress) -> Self {
        Self {
            state: BuildState::InProgress,
            progress: Some(progress),
            stats: None,
            error: None,
        }
    }

    /// A completed status with stats.
    #[must_use]
    pub fn completed(stats: MatrixStats) -> Self {
        Self {
            state: BuildState::Completed,
            progress: None,
            stats: Some(stats),
            error: None,
        }
    }

    /// A failed status.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: BuildState::Error,
            progress: None,
            stats: None,
            error: Some(error.into()),
        }
    }
}
