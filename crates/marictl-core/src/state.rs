//! Persisted node-state tags.
//!
//! A single small file on local disk records how this node last booted.
//! Its content is exactly one of the tags below; the next boot reads it
//! to decide between bootstrapping a new Primary Component and joining
//! the existing one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CtrlError;

/// How this node last booted (or is required to boot next).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    /// The node ran as a standalone instance, a cluster of one.
    SingleNode,
    /// The node participated in a multi-node Primary Component.
    Clustered,
    /// The node is the designated bootstrapper for the next boot.
    /// Never a terminal state: one successful boot consumes it.
    NeedsBootstrap,
}

impl NodeState {
    /// The on-disk representation of this tag.
    pub fn as_tag(&self) -> &'static str {
        match self {
            NodeState::SingleNode => "SINGLE_NODE",
            NodeState::Clustered => "CLUSTERED",
            NodeState::NeedsBootstrap => "NEEDS_BOOTSTRAP",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl FromStr for NodeState {
    type Err = CtrlError;

    /// Parse an on-disk tag. Surrounding whitespace (a trailing newline in
    /// particular) is tolerated; anything else, including an empty file,
    /// is rejected rather than defaulted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "SINGLE_NODE" => Ok(NodeState::SingleNode),
            "CLUSTERED" => Ok(NodeState::Clustered),
            "NEEDS_BOOTSTRAP" => Ok(NodeState::NeedsBootstrap),
            other => Err(CtrlError::UnknownState(other.to_string())),
        }
    }
}
