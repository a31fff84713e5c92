//! EPANET `.inp` text parser.
//!
//! Parses the sections of interest (`[TITLE]`, `[JUNCTIONS]`,
//! `[RESERVOIRS]`, `[TANKS]`, `[PIPES]`, `[PUMPS]`, `[VALVES]`) into an
//! [`InpNetwork`]. Unknown sections are skipped wholesale. Lines beginning
//! with `;` are comments; trailing `;` comments are stripped. CR/LF line
//! endings are tolerated.

use std::collections::HashSet;
use std::path::Path;

use crate::error::ParseError;
use crate::model::{InpLink, InpLinkKind, InpNetwork, InpNode, InpNodeKind};

/// Maximum accepted `.inp` size: 50 MiB.
pub const MAX_INP_BYTES: usize = 50 * 1024 * 1024;

/// Parses an `.inp` file from disk.
///
/// # Errors
///
/// Returns [`ParseError::TooLarge`] before reading the contents when the
/// file size exceeds [`MAX_INP_BYTES`], and any error of
/// [`parse_inp_bytes`] afterwards.
pub fn parse_inp_file(path: impl AsRef<Path>) -> Result<InpNetwork, ParseError> {
    let path = path.as_ref();
    let size = std::fs::metadata(path)?.len() as usize;
    if size > MAX_INP_BYTES {
        return Err(ParseError::TooLarge {
            size,
            limit: MAX_INP_BYTES,
        });
    }
    let bytes = std::fs::read(path)?;
    parse_inp_bytes(&bytes)
}

/// Parses `.inp` content from a byte buffer.
///
/// # Errors
///
/// Returns [`ParseError::TooLarge`] or [`ParseError::InvalidUtf8`] for
/// oversized or non-UTF-8 input, and any error of [`parse_inp_str`].
pub fn parse_inp_bytes(bytes: &[u8]) -> Result<InpNetwork, ParseError> {
    if bytes.len() > MAX_INP_BYTES {
        return Err(ParseError::TooLarge {
            size: bytes.len(),
            limit: MAX_INP_BYTES,
        });
    }
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::InvalidUtf8)?;
    parse_inp_str(text)
}

/// Parses `.inp` content from a string.
///
/// # Errors
///
/// Returns [`ParseError::MissingSections`] when neither `[JUNCTIONS]` nor
/// `[PIPES]` appears, [`ParseError::DuplicateNode`] /
/// [`ParseError::DuplicateLink`] for repeated ids,
/// [`ParseError::UnknownNode`] for links to undeclared nodes, and
/// [`ParseError::MalformedLine`] for lines with missing fields or
/// unparseable numbers.
pub fn parse_inp_str(text: &str) -> Result<InpNetwork, ParseError> {
    if text.len() > MAX_INP_BYTES {
        return Err(ParseError::TooLarge {
            size: text.len(),
            limit: MAX_INP_BYTES,
        });
    }

    let mut network = InpNetwork::default();
    let mut section = Section::Unknown;
    let mut seen_junctions = false;
    let mut seen_pipes = false;
    let mut node_ids: HashSet<String> = HashSet::new();
    let mut link_ids: HashSet<String> = HashSet::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw.trim_end_matches('\r')).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let name = header.trim_end_matches(']').trim().to_ascii_uppercase();
            section = Section::from_name(&name);
            match section {
                Section::Junctions => seen_junctions = true,
                Section::Pipes => seen_pipes = true,
                _ => {}
            }
            continue;
        }

        match section {
            Section::Title => {
                if network.title.is_none() {
                    network.title = Some(line.to_string());
                }
            }
            Section::Junctions => {
                let node = parse_node_line(line, line_no, "JUNCTIONS", InpNodeKind::Junction)?;
                push_node(&mut network, &mut node_ids, node)?;
            }
            Section::Reservoirs => {
                let node = parse_node_line(line, line_no, "RESERVOIRS", InpNodeKind::Reservoir)?;
                push_node(&mut network, &mut node_ids, node)?;
            }
            Section::Tanks => {
                let node = parse_node_line(line, line_no, "TANKS", InpNodeKind::Tank)?;
                push_node(&mut network, &mut node_ids, node)?;
            }
            Section::Pipes => {
                let link = parse_link_line(line, line_no, "PIPES", InpLinkKind::Pipe)?;
                push_link(&mut network, &mut link_ids, link)?;
            }
            Section::Pumps => {
                let link = parse_link_line(line, line_no, "PUMPS", InpLinkKind::Pump)?;
                push_link(&mut network, &mut link_ids, link)?;
            }
            Section::Valves => {
                let link = parse_link_line(line, line_no, "VALVES", InpLinkKind::Valve)?;
                push_link(&mut network, &mut link_ids, link)?;
            }
            Section::Unknown => {}
        }
    }

    if !seen_junctions && !seen_pipes {
        return Err(ParseError::MissingSections);
    }

    // Links must reference declared nodes
    for link in &network.links {
        for node in [&link.from, &link.to] {
            if !node_ids.contains(node.as_str()) {
                return Err(ParseError::UnknownNode {
                    link: link.id.clone(),
                    node: node.clone(),
                });
            }
        }
    }

    Ok(network)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Title,
    Junctions,
    Reservoirs,
    Tanks,
    Pipes,
    Pumps,
    Valves,
    Unknown,
}

impl Section {
    fn from_name(name: &str) -> Self {
        match name {
            "TITLE" => Self::Title,
            "JUNCTIONS" => Self::Junctions,
            "RESERVOIRS" => Self::Reservoirs,
            "TANKS" => Self::Tanks,
            "PIPES" => Self::Pipes,
            "PUMPS" => Self::Pumps,
            "VALVES" => Self::Valves,
            _ => Self::Unknown,
        }
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_node_line(
    line: &str,
    line_no: usize,
    section: &str,
    kind: InpNodeKind,
) -> Result<InpNode, ParseError> {
    let mut fields = line.split_whitespace();
    let id = fields
        .next()
        .ok_or_else(|| malformed(section, line_no, line))?
        .to_string();

    let elevation = fields
        .next()
        .map(|f| parse_number(f, section, line_no, line))
        .transpose()?;
    // Only junction lines carry a demand column we care about
    let base_demand = if kind == InpNodeKind::Junction {
        fields
            .next()
            .map(|f| parse_number(f, section, line_no, line))
            .transpose()?
    } else {
        None
    };

    Ok(InpNode {
        id,
        kind,
        elevation,
        base_demand,
    })
}

fn parse_link_line(
    line: &str,
    line_no: usize,
    section: &str,
    kind: InpLinkKind,
) -> Result<InpLink, ParseError> {
    let mut fields = line.split_whitespace();
    let id = fields.next();
    let from = fields.next();
    let to = fields.next();
    match (id, from, to) {
        (Some(id), Some(from), Some(to)) => Ok(InpLink {
            id: id.to_string(),
            kind,
            from: from.to_string(),
            to: to.to_string(),
        }),
        _ => Err(malformed(section, line_no, line)),
    }
}

fn parse_number(field: &str, section: &str, line_no: usize, line: &str) -> Result<f64, ParseError> {
    field
        .parse::<f64>()
        .map_err(|_| malformed(section, line_no, line))
}

fn malformed(section: &str, line_no: usize, line: &str) -> ParseError {
    ParseError::MalformedLine {
        section: section.to_string(),
        line: line_no,
        content: line.to_string(),
    }
}

fn push_node(
    network: &mut InpNetwork,
    seen: &mut HashSet<String>,
    node: InpNode,
) -> Result<(), ParseError> {
    if !seen.insert(node.id.clone()) {
        return Err(ParseError::DuplicateNode { id: node.id });
    }
    network.nodes.push(node);
    Ok(())
}

fn push_link(
    network: &mut InpNetwork,
    seen: &mut HashSet<String>,
    link: InpLink,
) -> Result<(), ParseError> {
    if !seen.insert(link.id.clone()) {
        return Err(ParseError::DuplicateLink { id: link.id });
    }
    network.links.push(link);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[TITLE]
Small demo network
[RESERVOIRS]
R1 250 ; source head
[JUNCTIONS]
; id  elev  demand
J1 100 0.0
J2 95 1.5
J3 95 2.0
[PIPES]
P1 R1 J1 1000 300 100
P2 J1 J2 500 200 100
P3 J1 J3 500 200 100
[OPTIONS]
Units LPS
";

    #[test]
    fn test_parse_sample() {
        let net = parse_inp_str(SAMPLE).unwrap();
        assert_eq!(net.title.as_deref(), Some("Small demo network"));
        assert_eq!(net.node_count(), 4);
        assert_eq!(net.link_count(), 3);
        assert_eq!(net.node("R1").unwrap().kind, InpNodeKind::Reservoir);
        assert_eq!(net.node("J2").unwrap().base_demand, Some(1.5));
        assert_eq!(net.links[0].from, "R1");
        assert_eq!(net.links[0].to, "J1");
    }

    #[test]
    fn test_crlf_and_trailing_comments() {
        let text = "[JUNCTIONS]\r\nJ1 10 2.0 ; meter\r\n[PIPES]\r\n";
        let net = parse_inp_str(text).unwrap();
        assert_eq!(net.node_count(), 1);
        assert_eq!(net.node("J1").unwrap().base_demand, Some(2.0));
    }

    #[test]
    fn test_unknown_sections_ignored() {
        let text = "[JUNCTIONS]\nJ1 10\n[CURVES]\nC1 0 100\n[COORDINATES]\nJ1 3 4\n";
        let net = parse_inp_str(text).unwrap();
        assert_eq!(net.node_count(), 1);
        assert_eq!(net.link_count(), 0);
    }

    #[test]
    fn test_missing_sections() {
        let err = parse_inp_str("[TITLE]\nNothing here\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingSections));
    }

    #[test]
    fn test_duplicate_node() {
        let err = parse_inp_str("[JUNCTIONS]\nJ1 10\nJ1 20\n").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateNode { id } if id == "J1"));
    }

    #[test]
    fn test_link_to_undeclared_node() {
        let err = parse_inp_str("[JUNCTIONS]\nJ1 10\n[PIPES]\nP1 J1 GHOST 1 1 1\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownNode { node, .. } if node == "GHOST"));
    }

    #[test]
    fn test_malformed_number() {
        let err = parse_inp_str("[JUNCTIONS]\nJ1 not-a-number\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn test_pipe_with_missing_endpoint() {
        let err = parse_inp_str("[JUNCTIONS]\nJ1 10\n[PIPES]\nP1 J1\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedLine { .. }));
    }

    #[test]
    fn test_size_limit() {
        let big = "x".repeat(MAX_INP_BYTES + 1);
        let err = parse_inp_str(&big).unwrap_err();
        assert!(matches!(err, ParseError::TooLarge { .. }));
    }

    #[test]
    fn test_pumps_and_valves_are_links() {
        let text = "\
[JUNCTIONS]
J1 10
J2 9
J3 8
[PIPES]
P1 J1 J2 1 1 1
[PUMPS]
PU1 J2 J3 HEAD C1
[VALVES]
V1 J3 J1 200 PRV 30 0
";
        let net = parse_inp_str(text).unwrap();
        assert_eq!(net.link_count(), 3);
        assert_eq!(net.links[1].kind, InpLinkKind::Pump);
        assert_eq!(net.links[2].kind, InpLinkKind::Valve);
    }
}
