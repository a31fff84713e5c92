//! Error types for the leaklens system.
//!
//! This module provides unified error handling using [`thiserror`] for
//! automatic `Display` and `Error` trait implementations.
//!
//! # Error Kinds
//!
//! - [`CoreError::InvalidInput`]: malformed or out-of-range caller input;
//!   never retried.
//! - [`CoreError::NotFound`] / [`CoreError::Conflict`]: repository lookups
//!   and uniqueness violations.
//! - [`CoreError::InvariantViolation`]: structural faults such as a cycle in
//!   the parent graph; always surfaced loudly.
//! - [`CoreError::SimulatorUnavailable`] / [`CoreError::SimulationFailed`] /
//!   [`CoreError::NoValidReadings`]: hydraulic engine failures.
//! - [`CoreError::LocalizationUndetermined`]: the inverse problem produced no
//!   usable ranking.
//!
//! # Example
//!
//! ```rust
//! use leaklens_core::error::CoreError;
//!
//! fn lookup() -> Result<(), CoreError> {
//!     Err(CoreError::not_found("Sensor", "S-17"))
//! }
//! ```

use thiserror::Error;

/// A specialized `Result` type for leaklens operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Unified error type for the leaklens system.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// Malformed or out-of-range input from the caller
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of what was wrong with the input
        message: String,
    },

    /// A referenced entity does not exist
    #[error("Resource not found: {resource_type} with id '{id}'")]
    NotFound {
        /// Type of resource that was not found
        resource_type: &'static str,
        /// Identifier of the missing resource
        id: String,
    },

    /// A uniqueness constraint or state-machine rule was violated
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflicting operation
        message: String,
    },

    /// A structural invariant of the network does not hold
    #[error("Invariant violation: {message}")]
    InvariantViolation {
        /// Description of the broken invariant
        message: String,
    },

    /// The hydraulic engine could not be opened after retrying
    #[error("Simulator unavailable after {attempts} attempts: {message}")]
    SimulatorUnavailable {
        /// Number of load attempts made
        attempts: u32,
        /// Last underlying failure
        message: String,
    },

    /// A steady-state solve failed or timed out
    #[error("Simulation failed: {message}")]
    SimulationFailed {
        /// Description of the solve failure
        message: String,
    },

    /// Every sensor read of a solve returned NaN or infinity
    #[error("No valid readings: all {sensor_count} sensor values were NaN or infinite")]
    NoValidReadings {
        /// Number of sensors that were read
        sensor_count: usize,
    },

    /// Localization produced no usable candidate ranking
    #[error("Localization undetermined: {message}")]
    LocalizationUndetermined {
        /// Why no candidate could be selected
        message: String,
    },

    /// Operation exceeded its time limit
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout {
        /// The operation that timed out
        operation: String,
        /// Duration in milliseconds before timeout
        duration_ms: u64,
    },

    /// I/O error from the filesystem or network
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

impl CoreError {
    /// Creates a new invalid-input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a new not-found error.
    #[must_use]
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// Creates a new conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new invariant-violation error.
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Creates a new simulation-failed error.
    #[must_use]
    pub fn simulation_failed(message: impl Into<String>) -> Self {
        Self::SimulationFailed {
            message: message.into(),
        }
    }

    /// Creates a new localization-undetermined error.
    #[must_use]
    pub fn undetermined(message: impl Into<String>) -> Self {
        Self::LocalizationUndetermined {
            message: message.into(),
        }
    }

    /// Creates a new timeout error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the operation could succeed.
    ///
    /// Input, lookup, and invariant errors are never retried; engine and
    /// timeout errors may resolve on a later attempt.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::SimulatorUnavailable { .. }
            | Self::SimulationFailed { .. }
            | Self::Timeout { .. }
            | Self::Io(_) => true,
            Self::InvalidInput { .. }
            | Self::NotFound { .. }
            | Self::Conflict { .. }
            | Self::InvariantViolation { .. }
            | Self::NoValidReadings { .. }
            | Self::LocalizationUndetermined { .. }
            | Self::Internal { .. } => false,
        }
    }
}
