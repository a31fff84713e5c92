//! In-memory topology of a network.
//!
//! [`TopologyGraph`] holds the parent/child structure of one network as an
//! adjacency list keyed by node id plus a `parent_of` map. The parent
//! relation must be a forest rooted at MAINLINE nodes; both the upward walk
//! and the downward BFS guard against cycles and fail with
//! `InvariantViolation` rather than looping.
//!
//! [`TopologyService`] layers the repository on top: DMA membership,
//! idempotent DMA creation, and sensor-to-DMA derivation.

use std::collections::{HashMap, HashSet, VecDeque};

use leaklens_core::{CoreError, CoreResult, NetworkId, NodeId, PartitionId};
use tracing::info;

use crate::domain::{NetworkNode, Partition};
use crate::repository::Stores;

/// Parent/child graph of one network's nodes.
#[derive(Debug, Clone)]
pub struct TopologyGraph {
    nodes: HashMap<NodeId, NetworkNode>,
    children: HashMap<NodeId, Vec<NodeId>>,
    parent_of: HashMap<NodeId, NodeId>,
}

impl TopologyGraph {
    /// Builds the graph from a network's node set.
    #[must_use]
    pub fn from_nodes(nodes: Vec<NetworkNode>) -> Self {
        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut parent_of = HashMap::new();
        for node in &nodes {
            if let Some(parent) = node.parent_id {
                children.entry(parent).or_default().push(node.id);
                parent_of.insert(node.id, parent);
            }
        }
        Self {
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
            children,
            parent_of,
        }
    }

    /// Looks up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NetworkNode> {
        self.nodes.get(&id)
    }

    /// The parent of a node, if it has one.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent_of.get(&id).copied()
    }

    /// The children of a node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All nodes of the graph.
    pub fn iter(&self) -> impl Iterator<Item = &NetworkNode> {
        self.nodes.values()
    }

    /// Walks up the parent chain to the nearest MAINLINE ancestor.
    ///
    /// Returns `None` when the chain ends without reaching a mainline.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` when the walk revisits a node (cycle).
    pub fn find_mainline_for(&self, start: NodeId) -> CoreResult<Option<NodeId>> {
        let mut visited = HashSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if !visited.insert(id) {
                return Err(CoreError::invariant(format!(
                    "cycle in parent chain at node {id}"
                )));
            }
            match self.nodes.get(&id) {
                Some(node) if node.kind.is_dma_root() => return Ok(Some(id)),
                Some(_) => current = self.parent_of.get(&id).copied(),
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    /// BFS through the child relation from `root`, returning every reached
    /// node including the root.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` when the traversal reaches a node twice
    /// (cycle in the parent graph).
    pub fn subtree(&self, root: NodeId) -> CoreResult<HashSet<NodeId>> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                return Err(CoreError::invariant(format!(
                    "cycle in child graph at node {id}"
                )));
            }
            for child in self.children(id) {
                queue.push_back(*child);
            }
        }
        Ok(visited)
    }
}

/// Topology operations that need the repository.
#[derive(Clone)]
pub struct TopologyService {
    stores: Stores,
}

impl TopologyService {
    /// Creates the service over a repository bundle.
    #[must_use]
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Loads the topology graph of a network.
    pub async fn graph(&self, network: NetworkId) -> CoreResult<TopologyGraph> {
        let nodes = self.stores.nodes.for_network(network).await?;
        Ok(TopologyGraph::from_nodes(nodes))
    }

    /// The set of node ids a DMA logically owns: the BFS subtree below its
    /// mainline.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown partitions, `InvariantViolation` on cycles.
    pub async fn nodes_in_dma(&self, partition: PartitionId) -> CoreResult<HashSet<NodeId>> {
        let partition = self.stores.partitions.get(partition).await?;
        let graph = self.graph(partition.network_id).await?;
        graph.subtree(partition.mainline_id)
    }

    /// Idempotently creates one partition per MAINLINE node that does not
    /// root one yet. Returns the partitions created by this call.
    pub async fn create_dmas_for_mainlines(
        &self,
        network: NetworkId,
    ) -> CoreResult<Vec<Partition>> {
        let nodes = self.stores.nodes.for_network(network).await?;
        let mut created = Vec::new();
        for node in nodes.iter().filter(|n| n.kind.is_dma_root()) {
            if self.stores.partitions.by_mainline(node.id).await?.is_some() {
                continue;
            }
            let partition = Partition::new(
                network,
                Partition::label_for_mainline(&node.label),
                node.id,
            );
            self.stores.partitions.insert(partition.clone()).await?;
            created.push(partition);
        }
        if !created.is_empty() {
            info!(network = %network, count = created.len(), "created DMA partitions");
        }
        Ok(created)
    }

    /// The DMA a node belongs to, derived by walking up to its mainline.
    pub async fn partition_for_node(&self, network: NetworkId, node: NodeId) -> CoreResult<Option<Partition>> {
        let graph = self.graph(network).await?;
        match graph.find_mainline_for(node)? {
            Some(mainline) => self.stores.partitions.by_mainline(mainline).await,
            None => Ok(None),
        }
    }
}
