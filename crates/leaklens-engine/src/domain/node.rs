//! Nodes of the network hierarchy.

use geo::Point;
use leaklens_core::{NetworkId, NodeId, NodeKind};
use serde::{Deserialize, Serialize};

/// A vertex in the network hierarchy.
///
/// The parent relation forms a forest whose roots are MAINLINE nodes; a DMA
/// is the subtree below one mainline. Nodes imported from EPANET carry the
/// source label in `epanet_id` so simulations can address them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkNode {
    /// Unique id
    pub id: NodeId,
    /// Owning network
    pub network_id: NetworkId,
    /// Human-readable label, unique within the network
    pub label: String,
    /// Hierarchy role
    pub kind: NodeKind,
    /// Parent node in the same network, absent for mainline roots
    pub parent_id: Option<NodeId>,
    /// Node id inside the EPANET model, when the node was imported
    pub epanet_id: Option<String>,
    /// Geographic position, when known
    pub location: Option<Point<f64>>,
    /// Elevation in meters, when known
    pub elevation: Option<f64>,
    /// Declared base demand in L/s, when known
    pub base_demand: Option<f64>,
}

impl NetworkNode {
    /// Creates a node with the given role; optional fields start empty.
    #[must_use]
    pub fn new(network_id: NetworkId, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            network_id,
            label: label.into(),
            kind,
            parent_id: None,
            epanet_id: None,
            location: None,
            elevation: None,
            base_demand: None,
        }
    }

    /// Sets the parent node.
    #[must_use]
    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Tags the node with its EPANET model id.
    #[must_use]
    pub fn with_epanet_id(mut self, epanet_id: impl Into<String>) -> Self {
        self.epanet_id = Some(epanet_id.into());
        self
    }

    /// Whether the node can host a synthetic leak in matrix generation.
    #[must_use]
    pub fn is_leak_candidate(&self) -> bool {
        self.epanet_id.is_some()
    }
}
