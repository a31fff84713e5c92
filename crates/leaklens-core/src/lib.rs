//! # Leaklens Core
//!
//! Core types, identifiers, and errors for the leaklens water-network leak
//! detection system.
//!
//! This crate provides the foundational building blocks shared by the other
//! leaklens crates:
//!
//! - **Identifiers**: [`NetworkId`], [`NodeId`], [`SensorId`], [`PartitionId`],
//!   [`DetectionId`], and [`ReadingId`] newtypes over UUIDs.
//!
//! - **Domain enums**: [`NodeKind`], [`SensorKind`], [`Severity`],
//!   [`DetectionStatus`], and [`ReadingSource`] with total `match` dispatch.
//!
//! - **Errors**: the unified [`CoreError`] type via the [`error`] module,
//!   covering every failure kind the system surfaces.
//!
//! - **Utilities**: small numeric helpers used across the codebase.
//!
//! ## Example
//!
//! ```rust
//! use leaklens_core::{NodeKind, Severity};
//!
//! // Severity follows the mass-balance imbalance thresholds
//! assert_eq!(Severity::from_imbalance(8.0), Severity::Low);
//! assert_eq!(Severity::from_imbalance(60.0), Severity::Critical);
//! assert!(NodeKind::Mainline.is_dma_root());
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types at the crate root
pub use error::{CoreError, CoreResult};
pub use types::{
    // Identifiers
    DetectionId, NetworkId, NodeId, PartitionId, ReadingId, SensorId,
    // Domain enums
    DetectionStatus, NodeKind, ReadingSource, SensorKind, Severity,
    // Common aliases
    Timestamp,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default mass-balance detection threshold in L/s
pub const DEFAULT_THRESHOLD_LPS: f64 = 5.0;

/// Default detection window in seconds
pub const DEFAULT_WINDOW_SECS: i64 = 300;

/// Default localization baseline window in seconds
pub const DEFAULT_BASELINE_WINDOW_SECS: i64 = 3600;

/// Synthetic leak size used during sensitivity-matrix generation, in L/s
pub const UNIT_LEAK_LPS: f64 = 1.0;

/// Prelude module for convenient imports.
///
/// ```rust
/// use leaklens_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::types::{
        DetectionId, DetectionStatus, NetworkId, NodeId, NodeKind, PartitionId, ReadingId,
        ReadingSource, SensorId, SensorKind, Severity, Timestamp,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_valid() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_defaults() {
        assert!(DEFAULT_THRESHOLD_LPS > 0.0);
        assert_eq!(DEFAULT_WINDOW_SECS, 300);
        assert_eq!(DEFAULT_BASELINE_WINDOW_SECS, 3600);
        assert!((UNIT_LEAK_LPS - 1.0).abs() < f64::EPSILON);
    }
}
