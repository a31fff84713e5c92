//! Role inference and parent assignment for parsed networks.
//!
//! The hierarchy role of every node follows deterministically from the link
//! graph and the declarations:
//!
//! 1. No incoming link, or declared as a reservoir → **MAINLINE**
//! 2. Otherwise, positive declared demand → **HOUSEHOLD**
//! 3. Otherwise, fan-out of two or more → **JUNCTION**
//! 4. Otherwise → **BRANCH**
//!
//! The parent of a node is the source of its first incoming link, links
//! considered in lexicographic order of link id, so repeated imports of the
//! same file always produce the same forest.

use std::collections::HashMap;

use leaklens_core::NodeKind;

use crate::model::{InpNetwork, InpNodeKind, ParsedNode};

/// Classifies every node of a parsed network and assigns parents.
///
/// Output preserves the declaration order of the input nodes.
#[must_use]
pub fn assign_roles(network: &InpNetwork) -> Vec<ParsedNode> {
    // Lexicographic link order keeps parent assignment reproducible
    let mut links: Vec<_> = network.links.iter().collect();
    links.sort_by(|a, b| a.id.cmp(&b.id));

    let mut first_incoming: HashMap<&str, &str> = HashMap::new();
    let mut fan_out: HashMap<&str, usize> = HashMap::new();
    for link in &links {
        first_incoming.entry(link.to.as_str()).or_insert(link.from.as_str());
        *fan_out.entry(link.from.as_str()).or_insert(0) += 1;
    }

    network
        .nodes
        .iter()
        .map(|node| {
            let parent = first_incoming.get(node.id.as_str()).map(|p| (*p).to_string());
            let out_degree = fan_out.get(node.id.as_str()).copied().unwrap_or(0);

            let kind = if parent.is_none() || node.kind == InpNodeKind::Reservoir {
                NodeKind::Mainline
            } else if node.base_demand.unwrap_or(0.0) > 0.0 {
                NodeKind::Household
            } else if out_degree >= 2 {
                NodeKind::Junction
            } else {
                NodeKind::Branch
            };

            // Mainline nodes are forest roots; they carry no parent even
            // when a link points at them (e.g. a reservoir fed by a pump)
            let parent = if kind == NodeKind::Mainline { None } else { parent };

            ParsedNode {
                label: node.id.clone(),
                kind,
                parent,
                elevation: node.elevation,
                base_demand: node.base_demand,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_inp_str;

    fn roles_of(text: &str) -> HashMap<String, (NodeKind, Option<String>)> {
        let net = parse_inp_str(text).unwrap();
        assign_roles(&net)
            .into_iter()
            .map(|n| (n.label, (n.kind, n.parent)))
            .collect()
    }

    #[test]
    fn test_chain_roles() {
        // M -> B -> {H1, H2}
        let text = "\
[RESERVOIRS]
M 250
[JUNCTIONS]
B 100 0.0
H1 95 1.0
H2 95 1.0
[PIPES]
P1 M B 1 1 1
P2 B H1 1 1 1
P3 B H2 1 1 1
";
        let roles = roles_of(text);
        assert_eq!(roles["M"], (NodeKind::Mainline, None));
        assert_eq!(roles["B"].0, NodeKind::Junction); // fan-out 2
        assert_eq!(roles["B"].1.as_deref(), Some("M"));
        assert_eq!(roles["H1"], (NodeKind::Household, Some("B".into())));
        assert_eq!(roles["H2"], (NodeKind::Household, Some("B".into())));
    }

    #[test]
    fn test_single_outlet_is_branch() {
        let text = "\
[JUNCTIONS]
A 10
B 10 0.0
C 10 2.0
[PIPES]
P1 A B 1 1 1
P2 B C 1 1 1
";
        let roles = roles_of(text);
        // A has no incoming link
        assert_eq!(roles["A"].0, NodeKind::Mainline);
        // B passes flow through to a single child
        assert_eq!(roles["B"].0, NodeKind::Branch);
        assert_eq!(roles["C"].0, NodeKind::Household);
    }

    #[test]
    fn test_reservoir_with_incoming_link_stays_mainline() {
        let text = "\
[RESERVOIRS]
R 100
[JUNCTIONS]
J 10 1.0
[PIPES]
P1 J R 1 1 1
P2 R J 1 1 1
";
        let roles = roles_of(text);
        assert_eq!(roles["R"], (NodeKind::Mainline, None));
    }

    #[test]
    fn test_parent_tie_break_is_lexicographic() {
        // Two incoming links into C; P-links sorted by id pick A first
        let text = "\
[JUNCTIONS]
A 10
B 10
C 10 1.0
[PIPES]
P2 B C 1 1 1
P1 A C 1 1 1
";
        let roles = roles_of(text);
        assert_eq!(roles["C"].1.as_deref(), Some("A"));
    }

    #[test]
    fn test_roles_are_deterministic() {
        let text = "\
[RESERVOIRS]
M 250
[JUNCTIONS]
B 100 0.0
H1 95 1.0
[PIPES]
P1 M B 1 1 1
P2 B H1 1 1 1
";
        let a = roles_of(text);
        let b = roles_of(text);
        assert_eq!(a, b);
    }
}
