//! # Leaklens EPANET
//!
//! EPANET `.inp` handling and the hydraulic engine for the leaklens system.
//!
//! This crate covers the physics-facing half of the pipeline:
//!
//! - **Parsing**: [`parser`] turns `.inp` text into an [`InpNetwork`] of
//!   ordered nodes and directed links. Unknown sections are ignored, comments
//!   and CR/LF line endings are tolerated, and files over 50 MiB are
//!   rejected.
//!
//! - **Role inference**: [`roles`] classifies every parsed node as MAINLINE,
//!   JUNCTION, BRANCH, or HOUSEHOLD and assigns a deterministic parent from
//!   the link graph.
//!
//! - **Simulation**: [`engine`] exposes the [`EngineFactory`] /
//!   [`SimulatorSession`] port pair. The bundled backend is a demand-driven
//!   steady-state solver ([`solver`]) that computes per-node throughflow by
//!   aggregating subtree demand; sessions retry loading, bound each solve to
//!   30 s, and guarantee demand restoration after leak perturbations.
//!
//! ## Example
//!
//! ```rust
//! use leaklens_epanet::parser::parse_inp_str;
//! use leaklens_epanet::roles::assign_roles;
//!
//! let inp = "[JUNCTIONS]\nJ1 100 0.0\nJ2 95 1.5\n[PIPES]\nP1 J1 J2 100 200 100\n";
//! let network = parse_inp_str(inp).unwrap();
//! let nodes = assign_roles(&network);
//! assert_eq!(nodes.len(), 2);
//! ```

#![forbid(unsafe_code)]

pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod roles;
pub mod solver;

pub use engine::{EngineFactory, SimulatorSession, SteadyStateFactory, SteadyStateSession};
pub use error::ParseError;
pub use model::{InpLink, InpLinkKind, InpNetwork, InpNode, InpNodeKind, ParsedNode};
pub use parser::{parse_inp_bytes, parse_inp_file, parse_inp_str, MAX_INP_BYTES};
pub use roles::assign_roles;
pub use solver::SteadyStateSolver;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
