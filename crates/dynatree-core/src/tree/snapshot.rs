use std::fmt::Debug;

use serde::Serialize;

use crate::tree::search_tree::Tree;

/// Bumped whenever a field is added, renamed or removed.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct TreeSnapshot {
    pub schema_version: u32,
    pub root_node_id: usize,
    pub node_count: usize,
    pub action_node_count: usize,
    pub max_depth: u64,
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub node_id: usize,
    pub time_index: u64,
    pub depth: u64,
    pub is_terminal: bool,
    pub reward: f64,
    pub visits: u64,
    pub leaf_visits: u64,
    pub value: f64,
    pub parent_action_node_id: Option<usize>,
    pub untried: usize,
    pub actions: Vec<ActionNodeSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionNodeSnapshot {
    pub action_node_id: usize,
    /// `Debug` rendering of the action value.
    pub action: String,
    pub visits: u64,
    pub value_sum: f64,
    pub q: f64,
    pub outcomes: Vec<OutcomeSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSnapshot {
    pub child_node_id: usize,
    pub count: u64,
}

impl TreeSnapshot {
    /// Render the snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl<S, A: Debug> Tree<S, A> {
    /// Capture the statistics of every node for inspection or export.
    /// State snapshots are opaque and left out.
    pub fn snapshot(&self) -> TreeSnapshot {
        let nodes = self
            .nodes()
            .map(|(node_id, node)| {
                let actions = node
                    .children()
                    .iter()
                    .filter_map(|action_id| {
                        self.action_node(*action_id)
                            .ok()
                            .map(|action| ActionNodeSnapshot {
                                action_node_id: action_id.index(),
                                action: format!("{:?}", action.action()),
                                visits: action.visits(),
                                value_sum: action.stats().value_sum(),
                                q: action.q(),
                                outcomes: action
                                    .outcomes()
                                    .counts()
                                    .map(|(child, count)| OutcomeSnapshot {
                                        child_node_id: child.index(),
                                        count,
                                    })
                                    .collect(),
                            })
                    })
                    .collect();

                NodeSnapshot {
                    node_id: node_id.index(),
                    time_index: node.time_index().value(),
                    depth: node.depth(),
                    is_terminal: node.is_terminal(),
                    reward: node.reward(),
                    visits: node.visits(),
                    leaf_visits: node.leaf_visits(),
                    value: node.q(),
                    parent_action_node_id: node.parent().map(|id| id.index()),
                    untried: node.untried().len(),
                    actions,
                }
            })
            .collect();

        TreeSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            root_node_id: self.root_id().index(),
            node_count: self.node_count(),
            action_node_count: self.action_node_count(),
            max_depth: self.max_depth(),
            nodes,
        }
    }
}
