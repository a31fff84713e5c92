//! Demand-driven steady-state solver.
//!
//! Single-period hydraulics for a hierarchical distribution network: the
//! throughflow at a node equals its own demand plus the throughflow of its
//! children, evaluated bottom-up over the parent forest. This is the
//! conservation-law solution for a branched network and is what the flow
//! meters observe.

use std::collections::HashMap;

use thiserror::Error;

use crate::model::InpNetwork;
use crate::roles::assign_roles;

/// Errors from a steady-state solve.
#[derive(Error, Debug)]
pub enum SolveError {
    /// The parent relation is not a forest; some nodes sit on a cycle
    #[error("Network is not a forest: {unreached} node(s) unreachable from any mainline")]
    Cycle {
        /// Number of nodes not reached by the bottom-up traversal
        unreached: usize,
    },

    /// A demand perturbation referenced an unknown node
    #[error("Unknown node '{id}'")]
    UnknownNode {
        /// The missing node id
        id: String,
    },
}

/// Steady-state solver over a parsed network.
///
/// The solver owns a mutable demand table so leak perturbations can be
/// applied and rolled back between solves.
#[derive(Debug, Clone)]
pub struct SteadyStateSolver {
    demands: HashMap<String, f64>,
    children: HashMap<String, Vec<String>>,
    roots: Vec<String>,
    node_count: usize,
}

impl SteadyStateSolver {
    /// Builds a solver from a parsed network.
    ///
    /// Parent edges follow the same deterministic rule as role inference,
    /// so the solver and the imported topology always agree.
    #[must_use]
    pub fn from_network(network: &InpNetwork) -> Self {
        let parsed = assign_roles(network);

        let mut demands = HashMap::with_capacity(parsed.len());
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut roots = Vec::new();

        for node in &parsed {
            demands.insert(node.label.clone(), node.base_demand.unwrap_or(0.0));
            match &node.parent {
                Some(parent) => children
                    .entry(parent.clone())
                    .or_default()
                    .push(node.label.clone()),
                None => roots.push(node.label.clone()),
            }
        }

        Self {
            node_count: parsed.len(),
            demands,
            children,
            roots,
        }
    }

    /// Current demand at a node, if the node exists.
    #[must_use]
    pub fn demand(&self, id: &str) -> Option<f64> {
        self.demands.get(id).copied()
    }

    /// Sets the demand at a node.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::UnknownNode`] when the node does not exist.
    pub fn set_demand(&mut self, id: &str, value: f64) -> Result<(), SolveError> {
        match self.demands.get_mut(id) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(SolveError::UnknownNode { id: id.to_string() }),
        }
    }

    /// Runs a steady-state solve, returning the throughflow at every node.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::Cycle`] when part of the network is not
    /// reachable from any mainline root.
    pub fn solve(&self) -> Result<HashMap<String, f64>, SolveError> {
        let mut flows: HashMap<String, f64> = HashMap::with_capacity(self.node_count);

        // Iterative post-order: children first, then the node itself
        for root in &self.roots {
            let mut stack: Vec<(&str, bool)> = vec![(root.as_str(), false)];
            while let Some((id, expanded)) = stack.pop() {
                if expanded {
                    let child_flow: f64 = self
                        .children
                        .get(id)
                        .map(|kids| kids.iter().map(|k| flows[k.as_str()]).sum())
                        .unwrap_or(0.0);
                    let own = self.demands.get(id).copied().unwrap_or(0.0);
                    flows.insert(id.to_string(), own + child_flow);
                } else {
                    stack.push((id, true));
                    if let Some(kids) = self.children.get(id) {
                        for kid in kids {
                            stack.push((kid.as_str(), false));
                        }
                    }
                }
            }
        }

        if flows.len() < self.node_count {
            return Err(SolveError::Cycle {
                unreached: self.node_count - flows.len(),
            });
        }

        Ok(flows)
    }
}
