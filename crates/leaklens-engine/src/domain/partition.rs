//! DMA partitions.

use leaklens_core::{NetworkId, NodeId, PartitionId};
use serde::{Deserialize, Serialize};

/// A District Metered Area: the subtree below exactly one mainline node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    /// Unique id
    pub id: PartitionId,
    /// Owning network
    pub network_id: NetworkId,
    /// Human-readable label, e.g. `DMA_M1`
    pub label: String,
    /// The mainline node rooting this DMA; unique across partitions
    pub mainline_id: NodeId,
}

impl Partition {
    /// Creates a partition rooted at the given mainline.
    #[must_use]
    pub fn new(network_id: NetworkId, label: impl Into<String>, mainline_id: NodeId) -> Self {
        Self {
            id: PartitionId::new(),
            network_id,
            label: label.into(),
            mainline_id,
        }
    }

    /// The conventional label for a DMA rooted at a mainline with the given
    /// node label.
    #[must_use]
    pub fn label_for_mainline(mainline_label: &str) -> String {
        format!("DMA_{mainline_label}")
    }
}
