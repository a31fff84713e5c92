//! Core identifier and enum types shared across the leaklens crates.
//!
//! Every persisted entity is keyed by an opaque UUID wrapped in a dedicated
//! newtype so that ids of different aggregates cannot be mixed up. Domain
//! enums serialize in SCREAMING_SNAKE_CASE to match the wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timestamp used throughout the system (UTC).
pub type Timestamp = DateTime<Utc>;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new unique id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an id from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id! {
    /// Identifier of a logical network (tenant for every other entity).
    NetworkId
}

uuid_id! {
    /// Identifier of a node in the network hierarchy.
    NodeId
}

uuid_id! {
    /// Identifier of a flow sensor.
    SensorId
}

uuid_id! {
    /// Identifier of a DMA partition.
    PartitionId
}

uuid_id! {
    /// Identifier of a stored sensor reading.
    ReadingId
}

uuid_id! {
    /// Identifier of a leak detection record.
    DetectionId
}

/// Role of a node in the network hierarchy.
///
/// Mainline nodes are the roots of the parent forest; every DMA is the
/// subtree below exactly one mainline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    /// Source main; root of a DMA subtree
    Mainline,
    /// Pass-through node with a single downstream branch
    Branch,
    /// Distribution node with two or more downstream branches
    Junction,
    /// Terminal consumer node with its own demand
    Household,
}

impl NodeKind {
    /// Returns `true` for nodes that root a DMA.
    #[must_use]
    pub fn is_dma_root(&self) -> bool {
        matches!(self, Self::Mainline)
    }

    /// Returns `true` for nodes covered by multi-scope mass-balance
    /// detection (junctions and branches).
    #[must_use]
    pub fn is_balance_scope(&self) -> bool {
        matches!(self, Self::Junction | Self::Branch)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Mainline => "MAINLINE",
            Self::Branch => "BRANCH",
            Self::Junction => "JUNCTION",
            Self::Household => "HOUSEHOLD",
        };
        f.write_str(s)
    }
}

/// Kind of flow meter mounted on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorKind {
    /// Meter on a mainline; counts as DMA inflow
    MainlineFlow,
    /// Meter on a branch or junction
    BranchJunctionFlow,
    /// Meter on a household connection; counts as DMA outflow
    HouseholdFlow,
}

impl SensorKind {
    /// The sensor kind conventionally placed on a node of the given role.
    #[must_use]
    pub fn for_node(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Mainline => Self::MainlineFlow,
            NodeKind::Branch | NodeKind::Junction => Self::BranchJunctionFlow,
            NodeKind::Household => Self::HouseholdFlow,
        }
    }
}

/// Severity of a detected leak, derived from the mass-balance imbalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Imbalance at most 10 L/s
    Low,
    /// Imbalance above 10 and at most 20 L/s
    Medium,
    /// Imbalance above 20 and at most 50 L/s
    High,
    /// Imbalance above 50 L/s
    Critical,
}

impl Severity {
    /// Classifies a flow imbalance (L/s) into a severity bucket.
    ///
    /// The caller has already established that the imbalance exceeds the
    /// detection threshold.
    #[must_use]
    pub fn from_imbalance(imbalance_lps: f64) -> Self {
        if imbalance_lps > 50.0 {
            Self::Critical
        } else if imbalance_lps > 20.0 {
            Self::High
        } else if imbalance_lps > 10.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of a leak detection record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionStatus {
    /// Initial state after the mass-balance detector fires
    Detected,
    /// Manually confirmed by an operator
    Confirmed,
    /// Localization assigned a most-likely node
    Localized,
    /// Leak repaired or otherwise resolved
    Resolved,
    /// Detection dismissed as spurious
    FalsePositive,
}

impl DetectionStatus {
    /// Localization is allowed only from the initial state.
    #[must_use]
    pub fn can_localize(&self) -> bool {
        matches!(self, Self::Detected)
    }

    /// Confirmation is allowed only from the initial state.
    #[must_use]
    pub fn can_confirm(&self) -> bool {
        matches!(self, Self::Detected)
    }
}

impl std::fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Detected => "DETECTED",
            Self::Confirmed => "CONFIRMED",
            Self::Localized => "LOCALIZED",
            Self::Resolved => "RESOLVED",
            Self::FalsePositive => "FALSE_POSITIVE",
        };
        f.write_str(s)
    }
}

/// Origin of a stored reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadingSource {
    /// Live flow-meter sample
    Sensor,
    /// Operator-entered value
    Manual,
    /// Produced by a simulation run
    Simulated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(NodeId::new(), NodeId::new());
        assert_ne!(SensorId::new(), SensorId::new());
    }

    #[test]
    fn test_id_roundtrip() {
        let id = NetworkId::new();
        let parsed: NetworkId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(Severity::from_imbalance(6.0), Severity::Low);
        assert_eq!(Severity::from_imbalance(10.0), Severity::Low);
        assert_eq!(Severity::from_imbalance(10.5), Severity::Medium);
        assert_eq!(Severity::from_imbalance(20.0), Severity::Medium);
        assert_eq!(Severity::from_imbalance(20.1), Severity::High);
        assert_eq!(Severity::from_imbalance(50.0), Severity::High);
        assert_eq!(Severity::from_imbalance(50.001), Severity::Critical);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_status_transitions() {
        assert!(DetectionStatus::Detected.can_localize());
        assert!(!DetectionStatus::Localized.can_localize());
        assert!(!DetectionStatus::Resolved.can_confirm());
    }

    #[test]
    fn test_sensor_kind_for_node() {
        assert_eq!(SensorKind::for_node(NodeKind::Mainline), SensorKind::MainlineFlow);
        assert_eq!(
            SensorKind::for_node(NodeKind::Junction),
            SensorKind::BranchJunctionFlow
        );
        assert_eq!(SensorKind::for_node(NodeKind::Household), SensorKind::HouseholdFlow);
    }

    #[test]
    fn test_enum_wire_format() {
        let json = serde_json::to_string(&NodeKind::Mainline).unwrap();
        assert_eq!(json, "\"MAINLINE\"");
        let json = serde_json::to_string(&SensorKind::BranchJunctionFlow).unwrap();
        assert_eq!(json, "\"BRANCH_JUNCTION_FLOW\"");
        let json = serde_json::to_string(&DetectionStatus::FalsePositive).unwrap();
        assert_eq!(json, "\"FALSE_POSITIVE\"");
    }
}
