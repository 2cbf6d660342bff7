use std::fmt;

use crate::tree::ids::{ActionNodeId, NodeId};

/// Error type for node store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeError {
    /// Attempted to access a node id that does not exist in the arena.
    MissingNode { node_id: NodeId },
    /// Attempted to access an action node id that does not exist in the arena.
    MissingActionNode { action_node_id: ActionNodeId },
    /// A return or reward on the backpropagation path was NaN or infinite.
    NumericAnomaly { node_id: NodeId, value: f64 },
    /// A structural invariant of the tree does not hold.
    InvariantViolation { node_id: NodeId, detail: String },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::MissingNode { node_id } => {
                write!(f, "missing node with id {}", node_id.index())
            }
            TreeError::MissingActionNode { action_node_id } => {
                write!(f, "missing action node with id {}", action_node_id.index())
            }
            TreeError::NumericAnomaly { node_id, value } => write!(
                f,
                "non-finite return {value} while backpropagating through node {}",
                node_id.index()
            ),
            TreeError::InvariantViolation { node_id, detail } => {
                write!(f, "invariant violated at node {}: {detail}", node_id.index())
            }
        }
    }
}

impl std::error::Error for TreeError {}
