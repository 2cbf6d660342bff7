/// Stores the numbers MCTS updates constantly
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeStats {
    visits: u64,
    value_sum: f64,
}

impl NodeStats {
    pub fn new() -> Self {
        NodeStats {
            visits: 0,
            value_sum: 0.0,
        }
    }

    /// Retrieve the amount of visits recorded on this node
    pub fn visits(&self) -> u64 {
        self.visits
    }

    /// Retrieve the sum of all returns recorded on this node.
    pub fn value_sum(&self) -> f64 {
        self.value_sum
    }

    /// Function to be used for backpropagation.
    /// Immediately records the return and increments the visits.
    pub fn record(&mut self, sampled_return: f64) {
        self.visits += 1;
        self.value_sum += sampled_return;
    }

    /// Fold another set of statistics into this one.
    pub fn merge(&mut self, other: &NodeStats) {
        self.visits += other.visits;
        self.value_sum += other.value_sum;
    }

    /// Helper function just to check if the node has been visited or not
    pub fn is_unvisited(&self) -> bool {
        self.visits == 0
    }

    /// Mean of the recorded returns, 0 when unvisited
    pub fn q(&self) -> f64 {
        if self.is_unvisited() {
            0.0
        } else {
            self.value_sum / self.visits as f64
        }
    }
}
