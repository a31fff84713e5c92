//! EPANET network import.
//!
//! Takes uploaded `.inp` bytes through parse → role inference → topology
//! persistence → DMA creation, then writes the source text through to the
//! storage directory (one `<network_id>.inp` per network) so matrix builds
//! can re-open the model later.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use leaklens_core::{CoreError, CoreResult, NetworkId};
use leaklens_epanet::{assign_roles, parse_inp_bytes};
use serde::Serialize;
use tracing::{info, instrument};

use crate::domain::{Network, NetworkNode};
use crate::repository::Stores;
use crate::topology::TopologyService;

/// Default storage directory for imported `.inp` files.
pub const DEFAULT_STORAGE_DIR: &str = "./storage/epanet";

/// Outcome of one import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// The created network
    pub network_id: NetworkId,
    /// Number of nodes persisted
    pub nodes_imported: usize,
    /// Number of links in the source file
    pub links_imported: usize,
    /// Number of DMA partitions created
    pub dmas_created: usize,
}

/// Imports EPANET networks into the repository.
#[derive(Clone)]
pub struct ImportService {
    stores: Stores,
    topology: TopologyService,
    storage_dir: PathBuf,
}

impl ImportService {
    /// Creates the service with the given storage directory.
    #[must_use]
    pub fn new(stores: Stores, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            topology: TopologyService::new(stores.clone()),
            stores,
            storage_dir: storage_dir.into(),
        }
    }

    /// Where the stored model of a network lives.
    #[must_use]
    pub fn inp_path(&self, network: NetworkId) -> PathBuf {
        self.storage_dir.join(format!("{network}.inp"))
    }

    /// The storage directory for imported models.
    #[must_use]
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Imports one `.inp` upload: creates the network, its topology, and
    /// its DMAs, and stores the source text.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for unparseable files, `Conflict` for duplicate node
    /// labels, `Io` when the write-through fails.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn import_inp(
        &self,
        name: Option<String>,
        bytes: &[u8],
    ) -> CoreResult<ImportReport> {
        let parsed = parse_inp_bytes(bytes).map_err(CoreError::from)?;
        let roles = assign_roles(&parsed);

        let network = Network::new(name);
        let network_id = network.id;
        self.stores.networks.insert(network).await?;

        // First pass creates the nodes, second pass wires parents, so a
        // child can be declared before its parent in the file
        let mut nodes: Vec<NetworkNode> = roles
            .iter()
            .map(|p| {
                let mut node = NetworkNode::new(network_id, p.label.clone(), p.kind)
                    .with_epanet_id(p.label.clone());
                node.elevation = p.elevation;
                node.base_demand = p.base_demand;
                node
            })
            .collect();

        let by_label: HashMap<&str, usize> = roles
            .iter()
            .enumerate()
            .map(|(i, p)| (p.label.as_str(), i))
            .collect();
        let parent_ids: Vec<_> = roles
            .iter()
            .map(|p| {
                p.parent
                    .as_deref()
                    .and_then(|label| by_label.get(label))
                    .map(|&i| nodes[i].id)
            })
            .collect();
        for (node, parent) in nodes.iter_mut().zip(parent_ids) {
            node.parent_id = parent;
        }

        let nodes_imported = nodes.len();
        for node in nodes {
            self.stores.nodes.insert(node).await?;
        }

        let dmas = self.topology.create_dmas_for_mainlines(network_id).await?;

        tokio::fs::create_dir_all(&self.storage_dir).await?;
        tokio::fs::write(self.inp_path(network_id), bytes).await?;

        info!(
            network = %network_id,
            nodes = nodes_imported,
            links = parsed.link_count(),
            dmas = dmas.len(),
            "network imported"
        );

        Ok(ImportReport {
            network_id,
            nodes_imported,
            links_imported: parsed.link_count(),
            dmas_created: dmas.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leaklens_core::NodeKind;

    const CHAIN: &str = "\
[RESERVOIRS]
M 250
[JUNCTIONS]
B 100 0.0
H1 95 7.0
H2 95 5.0
[PIPES]
P1 M B 1 1 1
P2 B H1 1 1 1
P3 B H2 1 1 1
";

    fn service(dir: &Path) -> (Stores, ImportService) {
        let stores = Stores::in_memory();
        (stores.clone(), ImportService::new(stores, dir))
    }

    #[tokio::test]
    async fn test_import_creates_topology_and_dmas() {
        let dir = tempfile::tempdir().unwrap();
        let (stores, service) = service(dir.path());

        let report = service
            .import_inp(Some("chain".into()), CHAIN.as_bytes())
            .await
            .unwrap();
        assert_eq!(report.nodes_imported, 4);
        assert_eq!(report.links_imported, 3);
        assert_eq!(report.dmas_created, 1);

        let nodes = stores.nodes.for_network(report.network_id).await.unwrap();
        let mainline = nodes.iter().find(|n| n.kind == NodeKind::Mainline).unwrap();
        assert_eq!(mainline.label, "M");
        assert!(mainline.parent_id.is_none());

        let b = nodes.iter().find(|n| n.label == "B").unwrap();
        assert_eq!(b.parent_id, Some(mainline.id));
        assert_eq!(b.epanet_id.as_deref(), Some("B"));

        // Model text is written through for later simulation
        let stored = std::fs::read_to_string(service.inp_path(report.network_id)).unwrap();
        assert_eq!(stored, CHAIN);
    }

    #[tokio::test]
    async fn test_import_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let (_, service) = service(dir.path());
        let err = service.import_inp(None, b"[TITLE]\nNo content\n").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_node_label_in_import_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let (_, service) = service(dir.path());
        let err = service
            .import_inp(None, b"[JUNCTIONS]\nJ1 10\nJ1 20\n")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_reimport_creates_separate_network() {
        let dir = tempfile::tempdir().unwrap();
        let (stores, service) = service(dir.path());
        let a = service.import_inp(None, CHAIN.as_bytes()).await.unwrap();
        let b = service.import_inp(None, CHAIN.as_bytes()).await.unwrap();
        assert_ne!(a.network_id, b.network_id);
        assert_eq!(stores.nodes.for_network(b.network_id).await.unwrap().len(), 4);
    }
}
