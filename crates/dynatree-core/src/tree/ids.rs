use std::fmt;

use serde::{Deserialize, Serialize};

/// A wrapper for an integer index used to address decision nodes
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Get the value of the actual node without having to access and risk overriding the internal value
    pub fn index(&self) -> usize {
        self.0
    }
}

impl From<usize> for NodeId {
    /// Allow for explicit conversion from usize to NodeId
    fn from(value: usize) -> Self {
        NodeId(value)
    }
}

/// A wrapper for an integer index used to address action nodes
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionNodeId(usize);

impl ActionNodeId {
    /// Get the value of the actual action node
    pub fn index(&self) -> usize {
        self.0
    }
}

impl From<usize> for ActionNodeId {
    /// Allow for explicit conversion from usize to ActionNodeId
    fn from(value: usize) -> Self {
        ActionNodeId(value)
    }
}

/// Simulated time step of a state.
/// Dynamics may depend on it, so two equal states at different times are different nodes.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimeIndex(u64);

impl TimeIndex {
    pub const ZERO: TimeIndex = TimeIndex(0);

    /// Return the raw step number.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Return the time index `steps` later.
    pub fn advanced_by(&self, steps: u64) -> TimeIndex {
        TimeIndex(self.0.saturating_add(steps))
    }

    /// Steps elapsed since `earlier`, or `None` if `earlier` is in the future.
    pub fn elapsed_since(&self, earlier: TimeIndex) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }
}

impl From<u64> for TimeIndex {
    fn from(value: u64) -> Self {
        TimeIndex(value)
    }
}

impl fmt::Display for TimeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}
