//! Leak detection records and their lifecycle.

use chrono::Utc;
use leaklens_core::{
    CoreError, CoreResult, DetectionId, DetectionStatus, NetworkId, NodeId, PartitionId, Severity,
    Timestamp,
};
use serde::{Deserialize, Serialize};

/// A detected mass-balance violation.
///
/// Severity is fixed at creation from the imbalance magnitude. The status
/// field is the only mutable part and moves through the state machine:
///
/// ```text
/// Detected ── localize() ──► Localized
/// Detected ── confirm()  ──► Confirmed
/// *        ── resolve()  ──► Resolved
/// *        ── reject()   ──► FalsePositive
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakDetection {
    /// Unique id
    pub id: DetectionId,
    /// Owning network
    pub network_id: NetworkId,
    /// Node the imbalance was computed at
    pub node_id: NodeId,
    /// DMA scope of the detection, when it was DMA-scoped
    pub partition_id: Option<PartitionId>,
    /// Inflow minus outflow over the detection window, in L/s
    pub flow_imbalance: f64,
    /// Severity bucket; immutable after creation
    severity: Severity,
    /// Lifecycle state; mutate through the transition methods
    status: DetectionStatus,
    /// When the detector persisted the record
    pub detected_at: Timestamp,
    /// The analysis instant the detection was computed for
    pub timestamp: Timestamp,
    /// Detection window in seconds, when recorded
    pub time_window_secs: Option<i64>,
    /// Detection threshold in L/s, when recorded
    pub threshold_lps: Option<f64>,
    /// Most likely leak node assigned by localization
    pub localized_node_id: Option<NodeId>,
    /// Score of the winning candidate
    pub localization_score: Option<f64>,
    /// When localization ran
    pub localized_at: Option<Timestamp>,
}

impl LeakDetection {
    /// Creates a detection in the initial `Detected` state.
    ///
    /// Severity is derived from the imbalance and never changes afterwards.
    #[must_use]
    pub fn new(
        network_id: NetworkId,
        node_id: NodeId,
        flow_imbalance: f64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: DetectionId::new(),
            network_id,
            node_id,
            partition_id: None,
            flow_imbalance,
            severity: Severity::from_imbalance(flow_imbalance),
            status: DetectionStatus::Detected,
            detected_at: Utc::now(),
            timestamp,
            time_window_secs: None,
            threshold_lps: None,
            localized_node_id: None,
            localization_score: None,
            localized_at: None,
        }
    }

    /// Scopes the detection to a DMA.
    #[must_use]
    pub fn with_partition(mut self, partition: PartitionId) -> Self {
        self.partition_id = Some(partition);
        self
    }

    /// Records the detector parameters.
    #[must_use]
    pub fn with_parameters(mut self, window_secs: i64, threshold_lps: f64) -> Self {
        self.time_window_secs = Some(window_secs);
        self.threshold_lps = Some(threshold_lps);
        self
    }

    /// Severity assigned at creation.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> DetectionStatus {
        self.status
    }

    /// Records a localization result and moves to `Localized`.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` unless the detection is still `Detected`.
    pub fn localize(&mut self, node_id: NodeId, score: f64) -> CoreResult<()> {
        if !self.status.can_localize() {
            return Err(CoreError::conflict(format!(
                "detection {} cannot be localized from status {}",
                self.id, self.status
            )));
        }
        self.localized_node_id = Some(node_id);
        self.localization_score = Some(score);
        self.localized_at = Some(Utc::now());
        self.status = DetectionStatus::Localized;
        Ok(())
    }

    /// Confirms the detection.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` unless the detection is still `Detected`.
    pub fn confirm(&mut self) -> CoreResult<()> {
        if !self.status.can_confirm() {
            return Err(CoreError::conflict(format!(
                "detection {} cannot be confirmed from status {}",
                self.id, self.status
            )));
        }
        self.status = DetectionStatus::Confirmed;
        Ok(())
    }

    /// Marks the leak resolved. Allowed from any state.
    pub fn resolve(&mut self) {
        self.status = DetectionStatus::Resolved;
    }

    /// Dismisses the detection as spurious. Allowed from any state.
    pub fn reject(&mut self) {
        self.status = DetectionStatus::FalsePositive;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(imbalance: f64) -> LeakDetection {
        LeakDetection::new(NetworkId::new(), NodeId::new(), imbalance, Utc::now())
    }

    #[test]
    fn test_severity_from_imbalance() {
        assert_eq!(detection(8.0).severity(), Severity::Low);
        assert_eq!(detection(15.0).severity(), Severity::Medium);
        assert_eq!(detection(30.0).severity(), Severity::High);
        assert_eq!(detection(75.0).severity(), Severity::Critical);
    }

    #[test]
    fn test_localize_only_from_detected() {
        let mut d = detection(8.0);
        let node = NodeId::new();
        d.localize(node, 0.92).unwrap();
        assert_eq!(d.status(), DetectionStatus::Localized);
        assert_eq!(d.localized_node_id, Some(node));
        assert!(d.localized_at.is_some());

        // A second localization is rejected
        assert!(d.localize(NodeId::new(), 0.5).is_err());
    }

    #[test]
    fn test_confirm_then_resolve() {
        let mut d = detection(8.0);
        d.confirm().unwrap();
        assert_eq!(d.status(), DetectionStatus::Confirmed);

        // Localization is no longer allowed, resolution is
        assert!(d.localize(NodeId::new(), 0.5).is_err());
        d.resolve();
        assert_eq!(d.status(), DetectionStatus::Resolved);
    }

    #[test]
    fn test_reject_from_any_state() {
        let mut d = detection(8.0);
        d.localize(NodeId::new(), 0.9).unwrap();
        d.reject();
        assert_eq!(d.status(), DetectionStatus::FalsePositive);
    }
}
