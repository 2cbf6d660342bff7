use std::time::Instant;

use log::{debug, trace, warn};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::model::{EnvironmentModel, Transition};
use crate::search::{
    config::{DynamicsMode, HorizonMode, PlannerConfig},
    error::PlanError,
    metrics::{DiscardReason, IterationMetrics, IterationOutcome, RunMetrics, StopReason},
    rollout::{RolloutEnd, RolloutParams, RolloutPolicy, RolloutResult, rollout},
    strategy::{ActionStrategy, Proposal, SelectionContext, StrategySet},
};
use crate::tree::{
    error::TreeError,
    ids::{ActionNodeId, NodeId, TimeIndex},
    search_tree::{Checkpoint, PathStep, Tree},
};

/// Why an iteration stopped before backpropagation.
enum Abort<E> {
    /// The deadline passed; the partial simulation is rolled back.
    Interrupted,
    Failed(PlanError<E>),
}

impl<E> From<PlanError<E>> for Abort<E> {
    fn from(err: PlanError<E>) -> Self {
        Abort::Failed(err)
    }
}

impl<E> From<TreeError> for Abort<E> {
    fn from(err: TreeError) -> Self {
        Abort::Failed(PlanError::Tree(err))
    }
}

struct Descent {
    path: Vec<PathStep>,
    leaf: NodeId,
    leaf_is_new: bool,
}

enum Choice<A> {
    Expand(Proposal<A>),
    Descend(ActionNodeId),
}

/// Time the model is queried at for a node simulated at `node_time`.
fn model_time_for(dynamics: DynamicsMode, root_time: TimeIndex, node_time: TimeIndex) -> TimeIndex {
    match dynamics {
        DynamicsMode::Frozen => root_time,
        DynamicsMode::Advancing => node_time,
    }
}

/// Simulated time of a successor: the node's own time plus whatever the model
/// advanced past the time it was queried at.
fn successor_time<E>(
    node_time: TimeIndex,
    queried: TimeIndex,
    returned: TimeIndex,
) -> Result<TimeIndex, PlanError<E>> {
    returned
        .elapsed_since(queried)
        .map(|elapsed| node_time.advanced_by(elapsed))
        .ok_or(PlanError::TimeRegression {
            from: queried,
            to: returned,
        })
}

fn dedup_actions<A: PartialEq>(actions: Vec<A>) -> Vec<A> {
    let mut unique = Vec::with_capacity(actions.len());
    for action in actions {
        if !unique.contains(&action) {
            unique.push(action);
        }
    }
    unique
}

/// One search over one tree. Parallel planning runs several of these and merges their roots.
pub(crate) struct Search<'a, M: EnvironmentModel, R> {
    model: &'a M,
    config: &'a PlannerConfig,
    strategy: &'a StrategySet,
    rollout: &'a mut R,
    rng: ChaCha8Rng,
    tree: Tree<M::State, M::Action>,
    root_time: TimeIndex,
    started: Instant,
    deadline: Option<Instant>,
}

impl<'a, M, R> Search<'a, M, R>
where
    M: EnvironmentModel,
    R: RolloutPolicy<M>,
{
    /// The root state must already be known to be non-terminal.
    pub(crate) fn new(
        model: &'a M,
        config: &'a PlannerConfig,
        strategy: &'a StrategySet,
        rollout: &'a mut R,
        rng: ChaCha8Rng,
        (root_state, root_time): (M::State, TimeIndex),
        started: Instant,
    ) -> Self {
        Search {
            model,
            config,
            strategy,
            rollout,
            rng,
            tree: Tree::new(root_state, root_time, false),
            root_time,
            started,
            deadline: config.budget.time_limit().map(|limit| started + limit),
        }
    }

    /// Run up to `iterations` simulations (or until another budget limit hits),
    /// invoking `on_iteration` after every attempted simulation.
    pub(crate) fn run<FHook>(
        mut self,
        iterations: Option<usize>,
        mut on_iteration: FHook,
    ) -> Result<(Tree<M::State, M::Action>, RunMetrics), PlanError<M::Error>>
    where
        FHook: FnMut(&IterationOutcome),
    {
        let mut metrics = RunMetrics::new(iterations);
        let mut attempted = 0usize;

        let stop_reason = loop {
            if iterations.is_some_and(|limit| attempted >= limit) {
                break StopReason::Iterations;
            }
            if self.deadline_passed() {
                break StopReason::TimeLimit;
            }
            if self
                .config
                .budget
                .max_tree_depth
                .is_some_and(|depth| self.tree.max_depth() >= depth)
            {
                break StopReason::TreeDepth;
            }

            attempted += 1;
            let outcome = self.iterate()?;
            if let IterationOutcome::Completed(iteration) = &outcome {
                trace!(
                    "iteration {attempted}: path_len={} leaf={} return={:.4}",
                    iteration.path_len,
                    iteration.leaf.index(),
                    iteration.total_return
                );
            }
            on_iteration(&outcome);
            metrics.record(&outcome);
        };

        debug_assert!(self.tree.check_invariants().is_ok());
        if let Some(widening) = self.config.variant.widening() {
            debug_assert!(self.tree.check_widening(&widening).is_ok());
        }

        metrics.stop_reason = stop_reason;
        metrics.node_count = self.tree.node_count();
        metrics.action_node_count = self.tree.action_node_count();
        metrics.max_depth = self.tree.max_depth();
        metrics.elapsed = self.started.elapsed();
        debug!(
            "search stopped ({stop_reason:?}) after {} simulations, {} discarded, {} nodes",
            metrics.iterations_completed, metrics.iterations_discarded, metrics.node_count
        );
        Ok((self.tree, metrics))
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// One simulation: descend and expand, roll out, backpropagate.
    fn iterate(&mut self) -> Result<IterationOutcome, PlanError<M::Error>> {
        let checkpoint = self.tree.checkpoint();

        let descent = match self.descend() {
            Ok(descent) => descent,
            Err(abort) => return self.abandon(checkpoint, abort),
        };
        let evaluation = match self.evaluate(descent.leaf) {
            Ok(evaluation) => evaluation,
            Err(abort) => return self.abandon(checkpoint, abort),
        };

        let gamma = self.config.gamma;
        match self.tree.backpropagate(
            &descent.path,
            descent.leaf,
            evaluation.discounted_return,
            gamma,
        ) {
            Ok(total_return) => Ok(IterationOutcome::Completed(IterationMetrics {
                leaf: descent.leaf,
                leaf_is_new: descent.leaf_is_new,
                path_len: descent.path.len(),
                reward_prefix: total_return
                    - gamma.powi(descent.path.len() as i32) * evaluation.discounted_return,
                rollout_return: evaluation.discounted_return,
                rollout_steps: evaluation.steps,
                total_return,
            })),
            Err(TreeError::NumericAnomaly { node_id, value }) => {
                warn!(
                    "discarding simulation: non-finite return {value} at node {}",
                    node_id.index()
                );
                self.tree.rollback(checkpoint)?;
                Ok(IterationOutcome::Discarded(DiscardReason::NumericAnomaly {
                    node_id,
                    value,
                }))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn abandon(
        &mut self,
        checkpoint: Checkpoint,
        abort: Abort<M::Error>,
    ) -> Result<IterationOutcome, PlanError<M::Error>> {
        match abort {
            Abort::Interrupted => {
                debug!("time budget expired mid-simulation, rolling back");
                self.tree.rollback(checkpoint)?;
                Ok(IterationOutcome::Discarded(DiscardReason::Interrupted))
            }
            Abort::Failed(err) => Err(err),
        }
    }

    /// Walk from the root until a terminal node or a freshly created node is reached.
    /// With `HorizonMode::FromRoot` nodes at the horizon also end the walk.
    fn descend(&mut self) -> Result<Descent, Abort<M::Error>> {
        let mut current = self.tree.root_id();
        let mut path = Vec::new();

        loop {
            if self.deadline_passed() {
                return Err(Abort::Interrupted);
            }

            let (is_terminal, time, depth, has_pool) = {
                let node = self.tree.node(current)?;
                (
                    node.is_terminal(),
                    node.time_index(),
                    node.depth(),
                    node.has_action_pool(),
                )
            };
            let horizon_reached = self.config.horizon_mode == HorizonMode::FromRoot
                && depth >= self.config.rollout_horizon as u64;
            if is_terminal || horizon_reached {
                return Ok(Descent {
                    path,
                    leaf: current,
                    leaf_is_new: false,
                });
            }

            let model_time = model_time_for(self.config.dynamics, self.root_time, time);
            if !has_pool && ActionStrategy::<M>::needs_action_pool(self.strategy) {
                let actions = {
                    let node = self.tree.node(current)?;
                    self.model
                        .legal_actions(node.state(), model_time)
                        .map_err(PlanError::Adapter)?
                };
                self.tree.set_action_pool(current, dedup_actions(actions))?;
            }

            let choice = {
                let ctx = SelectionContext {
                    model: self.model,
                    tree: &self.tree,
                    node: current,
                    model_time,
                    exploration_constant: self.config.exploration_constant,
                    tie_break: self.config.tie_break,
                };
                match self
                    .strategy
                    .expand(&ctx, &mut self.rng)
                    .map_err(PlanError::Adapter)?
                {
                    Some(proposal) => Choice::Expand(proposal),
                    None => match self.strategy.select(&ctx, &mut self.rng) {
                        Some(action_id) => Choice::Descend(action_id),
                        None => {
                            return Err(Abort::Failed(PlanError::NoLegalActions { time, depth }));
                        }
                    },
                }
            };

            let action_id = match choice {
                Choice::Expand(Proposal::Untried { position }) => self
                    .tree
                    .expand_untried(current, position)?
                    .ok_or_else(|| TreeError::InvariantViolation {
                        node_id: current,
                        detail: format!("no untried action at position {position}"),
                    })?,
                Choice::Expand(Proposal::Sampled(action)) => {
                    match self.existing_action(current, &action)? {
                        Some(action_id) => action_id,
                        None => self.tree.add_action_node(current, action)?,
                    }
                }
                Choice::Descend(action_id) => action_id,
            };

            let (child, reward, child_is_new) = self.sample_outcome(current, action_id)?;
            path.push(PathStep {
                decision: current,
                action: action_id,
                reward,
            });
            if child_is_new {
                return Ok(Descent {
                    path,
                    leaf: child,
                    leaf_is_new: true,
                });
            }
            current = child;
        }
    }

    /// A sampled action equal to one already tried is merged into it.
    fn existing_action(
        &self,
        node: NodeId,
        action: &M::Action,
    ) -> Result<Option<ActionNodeId>, TreeError> {
        Ok(self
            .tree
            .children_of(node)?
            .into_iter()
            .find(|(_, tried)| tried.action() == action)
            .map(|(id, _)| id))
    }

    /// Draw the successor of taking `action_id` in `decision`.
    ///
    /// Returns the child, the transition reward, and whether the child was just created.
    fn sample_outcome(
        &mut self,
        decision: NodeId,
        action_id: ActionNodeId,
    ) -> Result<(NodeId, f64, bool), Abort<M::Error>> {
        if let Some(widening) = self.config.outcome_widening {
            let action = self.tree.action_node(action_id)?;
            let outcomes = action.outcomes();
            if !outcomes.is_empty() && !widening.allows(outcomes.len(), action.visits() + 1) {
                // Saturated: revisit a known outcome in proportion to how often it was drawn.
                let total: u64 = outcomes.counts().map(|(_, count)| count).sum();
                let mut draw = self.rng.gen_range(0..total.max(1));
                let mut chosen = None;
                for (child, count) in outcomes.counts() {
                    if draw < count {
                        chosen = Some(child);
                        break;
                    }
                    draw -= count;
                }
                let child = chosen
                    .or_else(|| outcomes.children().last())
                    .ok_or(TreeError::MissingActionNode {
                        action_node_id: action_id,
                    })?;
                let reward = self.tree.node(child)?.reward();
                self.tree.revisit_outcome(action_id, child)?;
                return Ok((child, reward, false));
            }
        }

        let (node_time, queried, transition) = {
            let node = self.tree.node(decision)?;
            let action = self.tree.action_node(action_id)?;
            let queried = model_time_for(self.config.dynamics, self.root_time, node.time_index());
            let transition = self
                .model
                .step(node.state(), action.action(), queried, &mut self.rng)
                .map_err(PlanError::Adapter)?;
            (node.time_index(), queried, transition)
        };
        let child_time = successor_time::<M::Error>(node_time, queried, transition.time_index)?;
        let Transition {
            state,
            reward,
            terminal,
            ..
        } = transition;

        let known = self.tree.find_outcome(action_id, |child| {
            child.time_index() == child_time && *child.state() == state
        })?;
        match known {
            Some(child) => {
                self.tree.revisit_outcome(action_id, child)?;
                Ok((child, reward, false))
            }
            None => {
                let child = self
                    .tree
                    .add_outcome(action_id, state, child_time, reward, terminal)?;
                Ok((child, reward, true))
            }
        }
    }

    /// Estimate the return from `leaf` with a default-policy rollout.
    fn evaluate(&mut self, leaf: NodeId) -> Result<RolloutResult, Abort<M::Error>> {
        let node = self.tree.node(leaf)?;
        let max_steps = match self.config.horizon_mode {
            HorizonMode::FromLeaf => self.config.rollout_horizon,
            HorizonMode::FromRoot => self
                .config
                .rollout_horizon
                .saturating_sub(usize::try_from(node.depth()).unwrap_or(usize::MAX)),
        };
        if node.is_terminal() || max_steps == 0 {
            return Ok(RolloutResult {
                discounted_return: 0.0,
                steps: 0,
                end: if node.is_terminal() {
                    RolloutEnd::Terminal
                } else {
                    RolloutEnd::Horizon
                },
            });
        }
        let start = (node.state().clone(), node.time_index(), node.depth());

        let model = self.model;
        let policy = &mut *self.rollout;
        let dynamics = self.config.dynamics;
        let root_time = self.root_time;
        let deadline = self.deadline;
        let params = RolloutParams {
            gamma: self.config.gamma,
            max_steps,
        };

        let result = rollout(
            start,
            params,
            &mut self.rng,
            |(state, time, depth): &(M::State, TimeIndex, u64),
             rng: &mut ChaCha8Rng|
             -> Result<M::Action, PlanError<M::Error>> {
                let query = model_time_for(dynamics, root_time, *time);
                policy
                    .choose(model, state, query, rng)
                    .map_err(PlanError::Adapter)?
                    .ok_or(PlanError::NoLegalActions {
                        time: *time,
                        depth: *depth,
                    })
            },
            |(state, time, depth): &(M::State, TimeIndex, u64),
             action: &M::Action,
             rng: &mut ChaCha8Rng|
             -> Result<((M::State, TimeIndex, u64), f64, bool), PlanError<M::Error>> {
                let query = model_time_for(dynamics, root_time, *time);
                let transition = model
                    .step(state, action, query, rng)
                    .map_err(PlanError::Adapter)?;
                let next_time = successor_time(*time, query, transition.time_index)?;
                Ok((
                    (transition.state, next_time, depth + 1),
                    transition.reward,
                    transition.terminal,
                ))
            },
            || deadline.is_some_and(|deadline| Instant::now() >= deadline),
        )?;

        if result.end == RolloutEnd::Interrupted {
            return Err(Abort::Interrupted);
        }
        Ok(result)
    }
}
