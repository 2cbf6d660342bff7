use crate::tree::{
    ids::{ActionNodeId, TimeIndex},
    stats::NodeStats,
};

#[derive(Debug, Clone)]
/// represents a decision state in the search tree.
/// Owns the state snapshot it was created with; the snapshot is never mutated.
pub struct DecisionNode<S, A> {
    state: S,
    time_index: TimeIndex,
    depth: u64,
    parent: Option<ActionNodeId>,
    reward: f64,
    children: Vec<ActionNodeId>,
    untried: Option<Vec<A>>,
    is_terminal: bool,
    stats: NodeStats,
    leaf_visits: u64,
}

impl<S, A> DecisionNode<S, A> {
    /// Create a new DecisionNode instance
    pub(crate) fn new(
        state: S,
        time_index: TimeIndex,
        depth: u64,
        parent: Option<ActionNodeId>,
        reward: f64,
        is_terminal: bool,
    ) -> Self {
        DecisionNode {
            state,
            time_index,
            depth,
            parent,
            reward,
            children: Vec::new(),
            untried: None,
            is_terminal,
            stats: NodeStats::new(),
            leaf_visits: 0,
        }
    }

    /// Return the state snapshot of this node
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Return the simulated time step of this node
    pub fn time_index(&self) -> TimeIndex {
        self.time_index
    }

    /// Return the depth of a specific node
    pub fn depth(&self) -> u64 {
        self.depth
    }

    /// Return the action node this node was reached through
    pub fn parent(&self) -> Option<ActionNodeId> {
        self.parent
    }

    /// Reward observed on the transition that created this node.
    pub fn reward(&self) -> f64 {
        self.reward
    }

    /// Check function to see if a node is terminal
    pub fn is_terminal(&self) -> bool {
        self.is_terminal
    }

    /// Action nodes tried from this node, in creation order.
    pub fn children(&self) -> &[ActionNodeId] {
        &self.children
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub fn visits(&self) -> u64 {
        self.stats.visits()
    }

    /// Mean discounted return of the simulations that passed through this node.
    pub fn q(&self) -> f64 {
        self.stats.q()
    }

    /// Simulations that ended at this node instead of descending further.
    pub fn leaf_visits(&self) -> u64 {
        self.leaf_visits
    }

    /// Whether the legal action set has been queried for this node.
    pub fn has_action_pool(&self) -> bool {
        self.untried.is_some()
    }

    /// Actions from the enumerable set not tried yet.
    pub fn untried(&self) -> &[A] {
        self.untried.as_deref().unwrap_or(&[])
    }

    pub(crate) fn set_action_pool(&mut self, actions: Vec<A>) {
        self.untried = Some(actions);
    }

    pub(crate) fn take_untried(&mut self, position: usize) -> Option<A> {
        let pool = self.untried.as_mut()?;
        if position < pool.len() {
            Some(pool.remove(position))
        } else {
            None
        }
    }

    pub(crate) fn restore_untried(&mut self, position: usize, action: A) {
        if let Some(pool) = self.untried.as_mut() {
            let position = position.min(pool.len());
            pool.insert(position, action);
        }
    }

    pub(crate) fn push_child(&mut self, child: ActionNodeId) {
        self.children.push(child);
    }

    pub(crate) fn retain_children_before(&mut self, first_removed: ActionNodeId) {
        self.children.retain(|child| *child < first_removed);
    }

    pub(crate) fn record(&mut self, sampled_return: f64) {
        self.stats.record(sampled_return);
    }

    pub(crate) fn record_leaf(&mut self, sampled_return: f64) {
        self.stats.record(sampled_return);
        self.leaf_visits += 1;
    }
}
