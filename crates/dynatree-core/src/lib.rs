mod model;
mod search;
mod tree;

pub use model::{EnvironmentModel, Transition};
pub use search::config::{
    Budget, ConfigError, DynamicsMode, ExpansionOrder, HorizonMode, PlannerConfig, Variant,
};
pub use search::error::PlanError;
pub use search::inference::{
    EXACT_MATCH_DISTANCE, Inference, InferenceConfig, Neighbor, Weighting, infer_value,
};
pub use search::metrics::{
    DiscardReason, IterationMetrics, IterationOutcome, RunMetrics, StopReason,
};
pub use search::planner::{PlanReport, Planner, RootActionStats};
pub use search::rollout::{
    BiasedRollout, RolloutEnd, RolloutParams, RolloutPolicy, RolloutResult, UniformRollout,
    rollout,
};
pub use search::selection::{TieBreak, argmax};
pub use search::strategy::{
    ActionStrategy, IqUctStrategy, OlUctStrategy, Proposal, SelectionContext, StrategySet,
    UctStrategy,
};
pub use search::widening::Widening;
pub use tree::edges::{ActionNode, ucb};
pub use tree::error::TreeError;
pub use tree::ids::{ActionNodeId, NodeId, TimeIndex};
pub use tree::node::DecisionNode;
pub use tree::outcomes::OutcomeSet;
pub use tree::search_tree::{Checkpoint, PathStep, RootPolicy, Tree};
pub use tree::snapshot::{
    ActionNodeSnapshot, NodeSnapshot, OutcomeSnapshot, SNAPSHOT_SCHEMA_VERSION, TreeSnapshot,
};
pub use tree::stats::NodeStats;
