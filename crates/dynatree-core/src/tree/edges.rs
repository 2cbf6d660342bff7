use crate::tree::{
    ids::NodeId,
    outcomes::OutcomeSet,
    stats::NodeStats,
};

#[derive(Debug, Clone)]
/// represents "taking a particular action from this node."
/// Holds the statistics of the action and the outcomes sampled for it.
pub struct ActionNode<A> {
    action: A,
    parent: NodeId,
    stats: NodeStats,
    outcomes: OutcomeSet,
}

impl<A> ActionNode<A> {
    /// Create a new action node
    pub(crate) fn new(action: A, parent: NodeId) -> Self {
        ActionNode {
            action,
            parent,
            stats: NodeStats::new(),
            outcomes: OutcomeSet::new(),
        }
    }

    /// Getter for the action value
    pub fn action(&self) -> &A {
        &self.action
    }

    pub(crate) fn into_action(self) -> A {
        self.action
    }

    /// Decision node this action is taken from
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    /// Function to be used for backpropagation.
    pub(crate) fn record(&mut self, sampled_return: f64) {
        self.stats.record(sampled_return);
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    /// Return the amount of times this action has been visited
    pub fn visits(&self) -> u64 {
        self.stats.visits()
    }

    /// Return the mean value estimate for this action.
    pub fn q(&self) -> f64 {
        self.stats.q()
    }

    pub fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    pub(crate) fn outcomes_mut(&mut self) -> &mut OutcomeSet {
        &mut self.outcomes
    }

    /// Return the amount of distinct outcomes observed under this action.
    pub fn outcomes_len(&self) -> usize {
        self.outcomes.len()
    }

    /// UCB1 score of this action given the visits of its parent.
    pub fn ucb_score(&self, n_parent: u64, c: f64) -> f64 {
        ucb(self.q(), self.visits() as f64, n_parent, c)
    }
}

/// Upper confidence bound `value + c * sqrt(ln(n_parent) / count)`.
/// An empty count scores infinitely high so untried arms are always tried first.
pub fn ucb(value: f64, count: f64, n_parent: u64, c: f64) -> f64 {
    if count <= 0.0 {
        f64::INFINITY
    } else {
        let n_parent = n_parent.max(1) as f64;
        value + c * f64::sqrt(f64::ln(n_parent) / count)
    }
}
