use serde::{Deserialize, Serialize};

use crate::search::widening::Widening;
use crate::tree::{
    arena::Arena,
    edges::ActionNode,
    error::TreeError,
    ids::{ActionNodeId, NodeId, TimeIndex},
    node::DecisionNode,
    stats::NodeStats,
};

/// How the final action is read from the root once the budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootPolicy {
    /// Most visited root action (robust child).
    MaxVisits,
    /// Highest mean return among visited root actions (greedy child).
    MaxValue,
}

/// One edge taken from root to leaf during a single simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStep {
    pub decision: NodeId,
    pub action: ActionNodeId,
    /// Reward received on the transition out of `decision` through `action`.
    pub reward: f64,
}

/// Arena lengths recorded before a simulation starts mutating the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    decisions: usize,
    actions: usize,
    max_depth: u64,
}

#[derive(Debug, Clone)]
enum Undo {
    OutcomeCount { action: ActionNodeId, child: NodeId },
    TakenUntried { action: ActionNodeId, node: NodeId, position: usize },
}

/// Owns both arenas; the root is always decision node 0.
/// Built for a single planning call and dropped as a whole afterwards.
#[derive(Debug, Clone)]
pub struct Tree<S, A> {
    decisions: Arena<NodeId, DecisionNode<S, A>>,
    actions: Arena<ActionNodeId, ActionNode<A>>,
    max_depth: u64,
    undo: Vec<Undo>,
}

impl<S, A> Tree<S, A> {
    /// Create a tree with a single root node.
    pub fn new(root_state: S, root_time: TimeIndex, root_is_terminal: bool) -> Self {
        let mut decisions = Arena::new();
        let root = DecisionNode::new(root_state, root_time, 0, None, 0.0, root_is_terminal);
        let _ = decisions.allocate(root);
        Tree {
            decisions,
            actions: Arena::new(),
            max_depth: 0,
            undo: Vec::new(),
        }
    }

    /// Return the root node id.
    pub fn root_id(&self) -> NodeId {
        NodeId::from(0)
    }

    /// Return how many decision nodes exist in the tree.
    pub fn node_count(&self) -> usize {
        self.decisions.len()
    }

    /// Return how many action nodes exist in the tree.
    pub fn action_node_count(&self) -> usize {
        self.actions.len()
    }

    /// Depth of the deepest decision node.
    pub fn max_depth(&self) -> u64 {
        self.max_depth
    }

    /// Return an immutable node handle.
    pub fn node(&self, node_id: NodeId) -> Result<&DecisionNode<S, A>, TreeError> {
        self.decisions
            .get(node_id)
            .ok_or(TreeError::MissingNode { node_id })
    }

    pub(crate) fn node_mut(&mut self, node_id: NodeId) -> Result<&mut DecisionNode<S, A>, TreeError> {
        self.decisions
            .get_mut(node_id)
            .ok_or(TreeError::MissingNode { node_id })
    }

    /// Return an immutable action node handle.
    pub fn action_node(&self, action_node_id: ActionNodeId) -> Result<&ActionNode<A>, TreeError> {
        self.actions
            .get(action_node_id)
            .ok_or(TreeError::MissingActionNode { action_node_id })
    }

    fn action_node_mut(
        &mut self,
        action_node_id: ActionNodeId,
    ) -> Result<&mut ActionNode<A>, TreeError> {
        self.actions
            .get_mut(action_node_id)
            .ok_or(TreeError::MissingActionNode { action_node_id })
    }

    /// All decision nodes with their ids, in allocation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DecisionNode<S, A>)> {
        self.decisions.iter_with_ids()
    }

    /// All action nodes with their ids, in allocation order.
    pub fn action_nodes(&self) -> impl Iterator<Item = (ActionNodeId, &ActionNode<A>)> {
        self.actions.iter_with_ids()
    }

    /// Action nodes hanging off `node_id` together with their data.
    pub fn children_of(
        &self,
        node_id: NodeId,
    ) -> Result<Vec<(ActionNodeId, &ActionNode<A>)>, TreeError> {
        let node = self.node(node_id)?;
        node.children()
            .iter()
            .map(|id| self.action_node(*id).map(|action| (*id, action)))
            .collect()
    }

    /// Start recording a simulation so it can be undone as a whole.
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.undo.clear();
        Checkpoint {
            decisions: self.decisions.len(),
            actions: self.actions.len(),
            max_depth: self.max_depth,
        }
    }

    /// Remove everything the in-flight simulation added since `checkpoint`.
    ///
    /// New nodes are unlinked from their parents and freed, outcome counts are
    /// decremented, and actions taken from an untried pool go back into it.
    pub fn rollback(&mut self, checkpoint: Checkpoint) -> Result<(), TreeError> {
        let first_new_node = NodeId::from(checkpoint.decisions);
        let first_new_action = ActionNodeId::from(checkpoint.actions);

        let mut touched_actions: Vec<ActionNodeId> = Vec::new();
        for (_, node) in self.decisions.iter_with_ids().skip(checkpoint.decisions) {
            if let Some(parent) = node.parent() {
                if parent < first_new_action && !touched_actions.contains(&parent) {
                    touched_actions.push(parent);
                }
            }
        }
        for action in touched_actions {
            self.action_node_mut(action)?
                .outcomes_mut()
                .retain_before(first_new_node);
        }

        let mut touched_nodes: Vec<NodeId> = Vec::new();
        for (_, action) in self.actions.iter_with_ids().skip(checkpoint.actions) {
            let parent = action.parent();
            if parent < first_new_node && !touched_nodes.contains(&parent) {
                touched_nodes.push(parent);
            }
        }
        for node in touched_nodes {
            self.node_mut(node)?.retain_children_before(first_new_action);
        }

        let mut freed_actions: Vec<Option<ActionNode<A>>> = self
            .actions
            .split_off(checkpoint.actions)
            .into_iter()
            .map(Some)
            .collect();

        for undo in std::mem::take(&mut self.undo).into_iter().rev() {
            match undo {
                Undo::OutcomeCount { action, child } => {
                    if action < first_new_action {
                        self.action_node_mut(action)?
                            .outcomes_mut()
                            .decrement_outcome(child);
                    }
                }
                Undo::TakenUntried {
                    action,
                    node,
                    position,
                } => {
                    if node >= first_new_node || action < first_new_action {
                        continue;
                    }
                    let freed = freed_actions
                        .get_mut(action.index() - checkpoint.actions)
                        .and_then(Option::take);
                    if let Some(freed) = freed {
                        self.node_mut(node)?
                            .restore_untried(position, freed.into_action());
                    }
                }
            }
        }

        self.decisions.truncate(checkpoint.decisions);
        self.max_depth = checkpoint.max_depth;
        Ok(())
    }

    /// Install the enumerable action set of a node. Later calls are ignored.
    pub(crate) fn set_action_pool(&mut self, node_id: NodeId, actions: Vec<A>) -> Result<(), TreeError> {
        let node = self.node_mut(node_id)?;
        if !node.has_action_pool() {
            node.set_action_pool(actions);
        }
        Ok(())
    }

    /// Move the untried action at `position` into a new action node.
    pub(crate) fn expand_untried(
        &mut self,
        node_id: NodeId,
        position: usize,
    ) -> Result<Option<ActionNodeId>, TreeError> {
        let Some(action) = self.node_mut(node_id)?.take_untried(position) else {
            return Ok(None);
        };
        let action_id = self.actions.allocate(ActionNode::new(action, node_id));
        self.node_mut(node_id)?.push_child(action_id);
        self.undo.push(Undo::TakenUntried {
            action: action_id,
            node: node_id,
            position,
        });
        Ok(Some(action_id))
    }

    /// Attach a freshly sampled action to `node_id`.
    pub(crate) fn add_action_node(&mut self, node_id: NodeId, action: A) -> Result<ActionNodeId, TreeError> {
        self.node(node_id)?;
        let action_id = self.actions.allocate(ActionNode::new(action, node_id));
        self.node_mut(node_id)?.push_child(action_id);
        Ok(action_id)
    }

    /// Find an outcome child of `action_id` accepted by `matches`.
    pub fn find_outcome<F>(&self, action_id: ActionNodeId, mut matches: F) -> Result<Option<NodeId>, TreeError>
    where
        F: FnMut(&DecisionNode<S, A>) -> bool,
    {
        let action = self.action_node(action_id)?;
        Ok(action.outcomes().find_child(|child| {
            self.decisions
                .get(child)
                .map(|node| matches(node))
                .unwrap_or(false)
        }))
    }

    /// Count one more draw of an already known outcome.
    pub(crate) fn revisit_outcome(&mut self, action_id: ActionNodeId, child: NodeId) -> Result<(), TreeError> {
        self.action_node_mut(action_id)?
            .outcomes_mut()
            .increment_outcome(child)
            .ok_or(TreeError::MissingNode { node_id: child })?;
        self.undo.push(Undo::OutcomeCount {
            action: action_id,
            child,
        });
        Ok(())
    }

    /// Allocate a new outcome child under `action_id` (count starts at 1).
    pub(crate) fn add_outcome(
        &mut self,
        action_id: ActionNodeId,
        state: S,
        time_index: TimeIndex,
        reward: f64,
        is_terminal: bool,
    ) -> Result<NodeId, TreeError> {
        let parent = self.action_node(action_id)?.parent();
        let depth = self.node(parent)?.depth() + 1;
        let child = DecisionNode::new(state, time_index, depth, Some(action_id), reward, is_terminal);
        let child_id = self.decisions.allocate(child);
        self.action_node_mut(action_id)?
            .outcomes_mut()
            .insert_outcome(child_id)
            .ok_or(TreeError::MissingNode { node_id: child_id })?;
        self.max_depth = self.max_depth.max(depth);
        Ok(child_id)
    }

    /// Backpropagate one simulation from `leaf` to the root.
    ///
    /// `leaf_return` is the return observed from `leaf` onwards. Walking up, each
    /// edge turns it into `reward + gamma * return`. Every value is computed and
    /// checked before anything is written, so a non-finite value leaves the tree
    /// untouched. Returns the return credited to the root.
    pub fn backpropagate(
        &mut self,
        path: &[PathStep],
        leaf: NodeId,
        leaf_return: f64,
        gamma: f64,
    ) -> Result<f64, TreeError> {
        if !leaf_return.is_finite() {
            return Err(TreeError::NumericAnomaly {
                node_id: leaf,
                value: leaf_return,
            });
        }
        self.node(leaf)?;

        let mut returns = Vec::with_capacity(path.len());
        let mut sampled = leaf_return;
        for step in path.iter().rev() {
            sampled = step.reward + gamma * sampled;
            if !sampled.is_finite() {
                return Err(TreeError::NumericAnomaly {
                    node_id: step.decision,
                    value: sampled,
                });
            }
            self.node(step.decision)?;
            self.action_node(step.action)?;
            returns.push(sampled);
        }

        self.node_mut(leaf)?.record_leaf(leaf_return);
        for (step, sampled) in path.iter().rev().zip(returns.iter()) {
            self.action_node_mut(step.action)?.record(*sampled);
            self.node_mut(step.decision)?.record(*sampled);
        }
        self.undo.clear();

        Ok(sampled)
    }

    /// Pick the root action according to `policy`.
    pub fn best_root_action(&self, policy: RootPolicy) -> Result<Option<ActionNodeId>, TreeError> {
        match policy {
            RootPolicy::MaxVisits => self.best_root_action_by_visits(),
            RootPolicy::MaxValue => self.best_root_action_by_value(),
        }
    }

    /// Pick the root action with the highest visit count.
    pub fn best_root_action_by_visits(&self) -> Result<Option<ActionNodeId>, TreeError> {
        let stats = self.root_stats()?;
        Ok(best_by_visits(stats.iter().map(|(id, s)| (*id, *s))))
    }

    /// Pick the visited root action with the highest mean value estimate.
    pub fn best_root_action_by_value(&self) -> Result<Option<ActionNodeId>, TreeError> {
        let stats = self.root_stats()?;
        Ok(best_by_value(stats.iter().map(|(id, s)| (*id, *s))))
    }

    fn root_stats(&self) -> Result<Vec<(ActionNodeId, NodeStats)>, TreeError> {
        Ok(self
            .children_of(self.root_id())?
            .into_iter()
            .map(|(id, action)| (id, *action.stats()))
            .collect())
    }

    /// Verify the bookkeeping every completed simulation must leave behind.
    ///
    /// - a decision node's visits equal its leaf visits plus its children's visits
    /// - an action node's visits equal the visits of its outcome children and
    ///   the sum of its outcome counts
    /// - time indices never decrease from parent to child
    pub fn check_invariants(&self) -> Result<(), TreeError> {
        for (node_id, node) in self.nodes() {
            let mut child_visits = 0u64;
            for action_id in node.children() {
                let action = self.action_node(*action_id)?;
                if action.parent() != node_id {
                    return Err(TreeError::InvariantViolation {
                        node_id,
                        detail: format!("action node {} has another parent", action_id.index()),
                    });
                }
                child_visits += action.visits();

                let mut outcome_visits = 0u64;
                let mut outcome_count = 0u64;
                for (child_id, count) in action.outcomes().counts() {
                    let child = self.node(child_id)?;
                    if child.time_index() < node.time_index() {
                        return Err(TreeError::InvariantViolation {
                            node_id: child_id,
                            detail: format!(
                                "time index {} precedes parent time {}",
                                child.time_index(),
                                node.time_index()
                            ),
                        });
                    }
                    outcome_visits += child.visits();
                    outcome_count += count;
                }
                if outcome_visits != action.visits() || outcome_count != action.visits() {
                    return Err(TreeError::InvariantViolation {
                        node_id,
                        detail: format!(
                            "action node {} has {} visits but outcomes account for {} visits / {} draws",
                            action_id.index(),
                            action.visits(),
                            outcome_visits,
                            outcome_count
                        ),
                    });
                }
            }

            if node.visits() != node.leaf_visits() + child_visits {
                return Err(TreeError::InvariantViolation {
                    node_id,
                    detail: format!(
                        "{} visits != {} leaf visits + {} child visits",
                        node.visits(),
                        node.leaf_visits(),
                        child_visits
                    ),
                });
            }
        }
        Ok(())
    }

    /// Verify that no decision node holds more action nodes than `widening`
    /// allows at its visit count. Only meaningful for trees grown by the
    /// sampling variants.
    pub fn check_widening(&self, widening: &Widening) -> Result<(), TreeError> {
        for (node_id, node) in self.nodes() {
            let bound = widening.max_children(node.visits());
            if node.children().len() > bound {
                return Err(TreeError::InvariantViolation {
                    node_id,
                    detail: format!(
                        "{} action nodes exceed the widening bound {bound} at {} visits",
                        node.children().len(),
                        node.visits()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Highest visit count among visited entries wins; ties go to the earliest entry.
pub(crate) fn best_by_visits<I, K>(entries: I) -> Option<K>
where
    I: IntoIterator<Item = (K, NodeStats)>,
{
    let mut best: Option<(K, u64)> = None;
    for (key, stats) in entries {
        if stats.is_unvisited() {
            continue;
        }
        best = match best {
            Some((best_key, best_visits)) if best_visits >= stats.visits() => {
                Some((best_key, best_visits))
            }
            _ => Some((key, stats.visits())),
        };
    }
    best.map(|(key, _)| key)
}

/// Highest mean value among visited entries wins; ties go to the earliest entry.
pub(crate) fn best_by_value<I, K>(entries: I) -> Option<K>
where
    I: IntoIterator<Item = (K, NodeStats)>,
{
    let mut best: Option<(K, f64)> = None;
    for (key, stats) in entries {
        if stats.is_unvisited() {
            continue;
        }
        best = match best {
            Some((best_key, best_q)) if best_q >= stats.q() => Some((best_key, best_q)),
            _ => Some((key, stats.q())),
        };
    }
    best.map(|(key, _)| key)
}
