use thiserror::Error;

use crate::search::config::ConfigError;
use crate::tree::{error::TreeError, ids::TimeIndex};

/// Error type for a planning call, generic over the environment model's error.
#[derive(Debug, Error)]
pub enum PlanError<E> {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot plan from a terminal state ({time})")]
    TerminalState { time: TimeIndex },

    #[error("environment model failed: {0}")]
    Adapter(#[source] E),

    #[error("no legal actions in a non-terminal state at depth {depth} ({time})")]
    NoLegalActions { time: TimeIndex, depth: u64 },

    #[error("environment model moved time backwards from {from} to {to}")]
    TimeRegression { from: TimeIndex, to: TimeIndex },

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("no root action was evaluated within the budget")]
    NoRecommendation,
}
