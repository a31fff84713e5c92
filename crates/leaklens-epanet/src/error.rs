//! Parse errors for EPANET `.inp` input.

use leaklens_core::CoreError;
use thiserror::Error;

/// Errors produced while parsing an `.inp` file.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// File exceeds the 50 MiB input limit
    #[error("Input file too large: {size} bytes (limit {limit})")]
    TooLarge {
        /// Actual size in bytes
        size: usize,
        /// Maximum accepted size in bytes
        limit: usize,
    },

    /// Neither a `[JUNCTIONS]` nor a `[PIPES]` section was found
    #[error("Missing required sections: need [JUNCTIONS] or [PIPES]")]
    MissingSections,

    /// The same node id was declared twice
    #[error("Duplicate node id '{id}'")]
    DuplicateNode {
        /// The repeated node id
        id: String,
    },

    /// The same link id was declared twice
    #[error("Duplicate link id '{id}'")]
    DuplicateLink {
        /// The repeated link id
        id: String,
    },

    /// A link references a node that was never declared
    #[error("Link '{link}' references undeclared node '{node}'")]
    UnknownNode {
        /// The offending link id
        link: String,
        /// The missing node id
        node: String,
    },

    /// A data line had too few fields or an unparseable number
    #[error("Malformed line {line} in [{section}]: {content}")]
    MalformedLine {
        /// Section the line belongs to
        section: String,
        /// 1-based line number in the file
        line: usize,
        /// The offending line content
        content: String,
    },

    /// Input is not valid UTF-8
    #[error("Input is not valid UTF-8")]
    InvalidUtf8,

    /// I/O failure while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ParseError> for CoreError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Io(e) => CoreError::Io(e),
            // Duplicate ids within one import are conflicts, not bad syntax
            ParseError::DuplicateNode { id } => {
                CoreError::conflict(format!("duplicate node id '{id}' in import"))
            }
            ParseError::DuplicateLink { id } => {
                CoreError::conflict(format!("duplicate link id '{id}' in import"))
            }
            other => CoreError::invalid_input(other.to_string()),
        }
    }
}
