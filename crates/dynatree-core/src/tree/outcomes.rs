use crate::tree::ids::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// represents one observed successor under a given action node.
/// Conceptually it holds `(child_node_id, count)`; the successor state lives on the child.
struct Outcome {
    child: NodeId,
    count: u64,
}

impl Outcome {
    /// Create a new outcome
    /// By default the count is set to 1 as we have just observed it
    fn new(child: NodeId) -> Self {
        Outcome { child, count: 1 }
    }

    /// Increment the count of an outcome by 1
    fn increment_count(&mut self) {
        self.count += 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Stores all outcomes observed for a single action node, in discovery order.
/// That's how the tree "discovers" stochastic branches naturally.
pub struct OutcomeSet {
    outcomes: Vec<Outcome>,
}

impl OutcomeSet {
    /// Create a new empty OutcomeSet
    pub fn new() -> Self {
        OutcomeSet {
            outcomes: Vec::new(),
        }
    }

    /// Find the first child accepted by `matches`.
    pub fn find_child<F>(&self, mut matches: F) -> Option<NodeId>
    where
        F: FnMut(NodeId) -> bool,
    {
        self.outcomes
            .iter()
            .map(|outcome| outcome.child)
            .find(|child| matches(*child))
    }

    /// Insert an outcome to the set
    /// Returns Some(child_id) in case the child had not been inserted yet
    pub(crate) fn insert_outcome(&mut self, child_id: NodeId) -> Option<NodeId> {
        if self.outcomes.iter().any(|outcome| outcome.child == child_id) {
            return None;
        }
        self.outcomes.push(Outcome::new(child_id));
        Some(child_id)
    }

    /// Increment the count on a single occurrence
    /// Returns Some(child_id) in case the incrementing worked
    pub(crate) fn increment_outcome(&mut self, child_id: NodeId) -> Option<NodeId> {
        let outcome = self
            .outcomes
            .iter_mut()
            .find(|outcome| outcome.child == child_id)?;
        outcome.increment_count();
        Some(outcome.child)
    }

    /// Undo one occurrence of `child_id`; outcomes falling to zero are removed.
    pub(crate) fn decrement_outcome(&mut self, child_id: NodeId) {
        if let Some(pos) = self.outcomes.iter().position(|o| o.child == child_id) {
            self.outcomes[pos].count -= 1;
            if self.outcomes[pos].count == 0 {
                self.outcomes.remove(pos);
            }
        }
    }

    /// Drop every outcome whose child id is `>= first_removed`.
    pub(crate) fn retain_before(&mut self, first_removed: NodeId) {
        self.outcomes.retain(|outcome| outcome.child < first_removed);
    }

    /// Return the amount of distinct outcomes observed.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Return the count for a given child.
    pub fn count_for(&self, child_id: NodeId) -> Option<u64> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.child == child_id)
            .map(|outcome| outcome.count)
    }

    /// Child ids in discovery order.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.outcomes.iter().map(|outcome| outcome.child)
    }

    /// `(child, count)` pairs in discovery order.
    pub fn counts(&self) -> impl Iterator<Item = (NodeId, u64)> + '_ {
        self.outcomes.iter().map(|o| (o.child, o.count))
    }
}
