use std::time::Duration;

use crate::tree::ids::NodeId;

/// Per-iteration metrics of a completed simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationMetrics {
    pub leaf: NodeId,
    pub leaf_is_new: bool,
    pub path_len: usize,
    /// Discounted reward collected inside the tree.
    pub reward_prefix: f64,
    pub rollout_return: f64,
    pub rollout_steps: usize,
    /// Return credited to the root.
    pub total_return: f64,
}

/// Why a simulation was thrown away without touching the statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiscardReason {
    /// The time budget expired mid-simulation.
    Interrupted,
    /// A NaN or infinite value showed up on the backpropagation path.
    NumericAnomaly { node_id: NodeId, value: f64 },
}

/// Result of one pass of selection, expansion, rollout and backpropagation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IterationOutcome {
    Completed(IterationMetrics),
    Discarded(DiscardReason),
}

/// Which budget limit ended the search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    #[default]
    Iterations,
    TimeLimit,
    TreeDepth,
}

/// Aggregate metrics for a complete search run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetrics {
    pub iterations_requested: Option<usize>,
    pub iterations_completed: usize,
    pub iterations_discarded: usize,
    pub total_return_sum: f64,
    pub average_total_return: f64,
    pub node_count: usize,
    pub action_node_count: usize,
    pub max_depth: u64,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
}

impl RunMetrics {
    pub(crate) fn new(iterations_requested: Option<usize>) -> Self {
        RunMetrics {
            iterations_requested,
            ..RunMetrics::default()
        }
    }

    pub(crate) fn record(&mut self, outcome: &IterationOutcome) {
        match outcome {
            IterationOutcome::Completed(metrics) => {
                self.iterations_completed += 1;
                self.total_return_sum += metrics.total_return;
                self.average_total_return =
                    self.total_return_sum / self.iterations_completed as f64;
            }
            IterationOutcome::Discarded(_) => self.iterations_discarded += 1,
        }
    }

    /// Combine the metrics of another worker into these.
    pub(crate) fn absorb(&mut self, other: &RunMetrics) {
        self.iterations_requested = match (self.iterations_requested, other.iterations_requested) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        self.iterations_completed += other.iterations_completed;
        self.iterations_discarded += other.iterations_discarded;
        self.total_return_sum += other.total_return_sum;
        self.average_total_return = if self.iterations_completed > 0 {
            self.total_return_sum / self.iterations_completed as f64
        } else {
            0.0
        };
        self.node_count += other.node_count;
        self.action_node_count += other.action_node_count;
        self.max_depth = self.max_depth.max(other.max_depth);
        self.elapsed = self.elapsed.max(other.elapsed);
    }
}
