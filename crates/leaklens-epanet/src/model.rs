//! In-memory model of a parsed EPANET `.inp` file.
//!
//! The parser produces an [`InpNetwork`]: ordered nodes and directed links,
//! exactly as declared. Role inference ([`crate::roles`]) layers the
//! MAINLINE / JUNCTION / BRANCH / HOUSEHOLD classification on top and emits
//! [`ParsedNode`] records ready for import.

use leaklens_core::NodeKind;

/// Declared kind of a node in the `.inp` source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InpNodeKind {
    /// Declared in `[JUNCTIONS]`
    Junction,
    /// Declared in `[RESERVOIRS]`
    Reservoir,
    /// Declared in `[TANKS]`
    Tank,
}

/// A node as declared in the `.inp` source.
#[derive(Debug, Clone)]
pub struct InpNode {
    /// Node id (label) from the file
    pub id: String,
    /// Which section declared the node
    pub kind: InpNodeKind,
    /// Elevation (junctions/tanks) or head (reservoirs), if given
    pub elevation: Option<f64>,
    /// Declared base demand in L/s, if given
    pub base_demand: Option<f64>,
}

/// Declared kind of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InpLinkKind {
    /// Declared in `[PIPES]`
    Pipe,
    /// Declared in `[PUMPS]`
    Pump,
    /// Declared in `[VALVES]`
    Valve,
}

/// A directed link as declared in the `.inp` source.
#[derive(Debug, Clone)]
pub struct InpLink {
    /// Link id from the file
    pub id: String,
    /// Which section declared the link
    pub kind: InpLinkKind,
    /// Upstream node id
    pub from: String,
    /// Downstream node id
    pub to: String,
}

/// A complete parsed `.inp` network.
#[derive(Debug, Clone, Default)]
pub struct InpNetwork {
    /// First line of `[TITLE]`, if present
    pub title: Option<String>,
    /// Nodes in declaration order
    pub nodes: Vec<InpNode>,
    /// Links in declaration order
    pub links: Vec<InpLink>,
}

impl InpNetwork {
    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&InpNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Number of declared nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of declared links.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

/// A node after role inference and parent assignment, ready for import.
#[derive(Debug, Clone)]
pub struct ParsedNode {
    /// Node id (label) from the file
    pub label: String,
    /// Inferred hierarchy role
    pub kind: NodeKind,
    /// Label of the parent node, when the node has an incoming link
    pub parent: Option<String>,
    /// Elevation carried over from the declaration
    pub elevation: Option<f64>,
    /// Base demand in L/s carried over from the declaration
    pub base_demand: Option<f64>,
}
