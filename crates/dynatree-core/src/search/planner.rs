use std::time::Instant;

use log::debug;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::model::EnvironmentModel;
use crate::search::{
    config::{ConfigError, PlannerConfig},
    engine::Search,
    error::PlanError,
    metrics::{IterationOutcome, RunMetrics},
    rollout::{RolloutPolicy, UniformRollout},
    strategy::StrategySet,
};
use crate::tree::{
    ids::TimeIndex,
    search_tree::{RootPolicy, Tree, best_by_value, best_by_visits},
    stats::NodeStats,
};

/// Aggregated statistics of one root action after planning.
#[derive(Debug, Clone, PartialEq)]
pub struct RootActionStats<A> {
    pub action: A,
    pub visits: u64,
    /// Mean return observed through the action.
    pub value: f64,
    pub value_sum: f64,
}

/// Everything one planning call produced.
#[derive(Debug, Clone)]
pub struct PlanReport<A> {
    /// Recommended action under the configured root policy.
    pub action: A,
    /// Root actions in the order they were first expanded.
    pub root_actions: Vec<RootActionStats<A>>,
    pub metrics: RunMetrics,
}

/// Online planner: builds a fresh search tree for every call and returns the
/// recommended action for the given state and time step.
pub struct Planner<M, R = UniformRollout> {
    model: M,
    config: PlannerConfig,
    strategy: StrategySet,
    rollout: R,
}

impl<M: EnvironmentModel> Planner<M> {
    /// Create a planner with uniform random rollouts.
    pub fn new(model: M, config: PlannerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let strategy = StrategySet::from_variant(&config.variant, config.expansion_order);
        Ok(Planner {
            model,
            config,
            strategy,
            rollout: UniformRollout,
        })
    }
}

impl<M, R> Planner<M, R>
where
    M: EnvironmentModel,
    R: RolloutPolicy<M>,
{
    /// Replace the rollout policy.
    pub fn with_rollout_policy<P: RolloutPolicy<M>>(self, rollout: P) -> Planner<M, P> {
        Planner {
            model: self.model,
            config: self.config,
            strategy: self.strategy,
            rollout,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Swap in a new configuration after validating it.
    pub fn set_config(&mut self, config: PlannerConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.strategy = StrategySet::from_variant(&config.variant, config.expansion_order);
        self.config = config;
        Ok(())
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Build a single search tree for `state` at `time` and return it with its metrics.
    ///
    /// Always runs on the calling thread; `workers` is ignored.
    pub fn plan_tree(
        &mut self,
        state: &M::State,
        time: TimeIndex,
    ) -> Result<(Tree<M::State, M::Action>, RunMetrics), PlanError<M::Error>> {
        self.plan_with_hook(state, time, |_| {})
    }

    /// Like `plan_tree`, invoking `on_iteration` after every attempted simulation.
    pub fn plan_with_hook<F>(
        &mut self,
        state: &M::State,
        time: TimeIndex,
        on_iteration: F,
    ) -> Result<(Tree<M::State, M::Action>, RunMetrics), PlanError<M::Error>>
    where
        F: FnMut(&IterationOutcome),
    {
        self.ensure_plannable(state, time)?;
        Search::new(
            &self.model,
            &self.config,
            &self.strategy,
            &mut self.rollout,
            search_rng(self.config.seed, time, 0),
            (state.clone(), time),
            Instant::now(),
        )
        .run(self.config.budget.iterations, on_iteration)
    }

    fn ensure_plannable(&self, state: &M::State, time: TimeIndex) -> Result<(), PlanError<M::Error>> {
        if self
            .model
            .is_terminal(state, time)
            .map_err(PlanError::Adapter)?
        {
            return Err(PlanError::TerminalState { time });
        }
        Ok(())
    }
}

impl<M, R> Planner<M, R>
where
    M: EnvironmentModel + Sync,
    M::State: Send + Sync,
    M::Action: Send,
    M::Error: Send,
    R: RolloutPolicy<M> + Clone + Send,
{
    /// Plan from `state` at `time` and return the recommended action.
    pub fn select_action(
        &mut self,
        state: &M::State,
        time: TimeIndex,
    ) -> Result<M::Action, PlanError<M::Error>> {
        Ok(self.plan(state, time)?.action)
    }

    /// Plan from `state` at `time` and report root statistics alongside the action.
    ///
    /// With `workers > 1` independent trees are grown in parallel, each with its
    /// own random stream and share of the iteration budget, and their root
    /// statistics are summed per action before the root policy is applied.
    pub fn plan(
        &mut self,
        state: &M::State,
        time: TimeIndex,
    ) -> Result<PlanReport<M::Action>, PlanError<M::Error>> {
        self.ensure_plannable(state, time)?;

        let shares = split_iterations(self.config.budget.iterations, self.config.workers);
        let started = Instant::now();
        debug!("planning at {time} with budget {:?}", self.config.budget);

        let runs = if shares.len() == 1 {
            let run = Search::new(
                &self.model,
                &self.config,
                &self.strategy,
                &mut self.rollout,
                search_rng(self.config.seed, time, 0),
                (state.clone(), time),
                started,
            )
            .run(shares[0], |_| {})?;
            vec![root_summary::<_, _, M::Error>(&run.0, run.1)?]
        } else {
            let model = &self.model;
            let config = &self.config;
            let strategy = &self.strategy;
            let jobs: Vec<(usize, Option<usize>, R)> = shares
                .into_iter()
                .enumerate()
                .map(|(worker, share)| (worker, share, self.rollout.clone()))
                .collect();
            debug!("planning with {} workers", jobs.len());

            jobs.into_par_iter()
                .map(|(worker, share, mut rollout)| {
                    let (tree, metrics) = Search::new(
                        model,
                        config,
                        strategy,
                        &mut rollout,
                        search_rng(config.seed, time, worker as u64),
                        (state.clone(), time),
                        started,
                    )
                    .run(share, |_| {})?;
                    root_summary::<_, _, M::Error>(&tree, metrics)
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut metrics: Option<RunMetrics> = None;
        let mut merged: Vec<(M::Action, NodeStats)> = Vec::new();
        for (root_actions, run_metrics) in runs {
            match metrics.as_mut() {
                Some(total) => total.absorb(&run_metrics),
                None => metrics = Some(run_metrics),
            }
            for (action, stats) in root_actions {
                match merged.iter_mut().find(|(known, _)| *known == action) {
                    Some((_, total)) => total.merge(&stats),
                    None => merged.push((action, stats)),
                }
            }
        }

        let indexed = merged.iter().enumerate().map(|(idx, (_, stats))| (idx, *stats));
        let best = match self.config.root_policy {
            RootPolicy::MaxVisits => best_by_visits(indexed),
            RootPolicy::MaxValue => best_by_value(indexed),
        }
        .ok_or(PlanError::NoRecommendation)?;

        let root_actions: Vec<RootActionStats<M::Action>> = merged
            .into_iter()
            .map(|(action, stats)| RootActionStats {
                action,
                visits: stats.visits(),
                value: stats.q(),
                value_sum: stats.value_sum(),
            })
            .collect();
        let action = root_actions[best].action.clone();
        debug!(
            "recommending {action:?} at {time} after {} root visits",
            root_actions[best].visits
        );

        Ok(PlanReport {
            action,
            root_actions,
            metrics: metrics.unwrap_or_default(),
        })
    }
}

/// Root actions of a finished tree with their statistics.
fn root_summary<S, A: Clone, E>(
    tree: &Tree<S, A>,
    metrics: RunMetrics,
) -> Result<(Vec<(A, NodeStats)>, RunMetrics), PlanError<E>> {
    let root_actions = tree
        .children_of(tree.root_id())?
        .into_iter()
        .map(|(_, action)| (action.action().clone(), *action.stats()))
        .collect();
    Ok((root_actions, metrics))
}

/// Per-call generator: the same seed, time and worker always give the same stream.
fn search_rng(seed: u64, time: TimeIndex, worker: u64) -> ChaCha8Rng {
    let mut rng =
        ChaCha8Rng::seed_from_u64(seed.wrapping_add(time.value().wrapping_mul(0x9E37_79B9_7F4A_7C15)));
    rng.set_stream(worker);
    rng
}

/// Split the iteration budget across workers; workers that would get nothing are dropped.
fn split_iterations(iterations: Option<usize>, workers: usize) -> Vec<Option<usize>> {
    let workers = workers.max(1);
    match iterations {
        None => vec![None; workers],
        Some(total) => {
            let base = total / workers;
            let extra = total % workers;
            (0..workers)
                .map(|worker| base + usize::from(worker < extra))
                .filter(|share| *share > 0)
                .map(Some)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_iterations_spreads_remainder_over_first_workers() {
        assert_eq!(
            split_iterations(Some(10), 4),
            vec![Some(3), Some(3), Some(2), Some(2)]
        );
    }

    #[test]
    fn split_iterations_drops_idle_workers() {
        assert_eq!(split_iterations(Some(2), 4), vec![Some(1), Some(1)]);
    }

    #[test]
    fn split_iterations_keeps_every_worker_under_time_budget() {
        assert_eq!(split_iterations(None, 3), vec![None, None, None]);
    }

    #[test]
    fn search_rng_depends_on_time_and_worker() {
        use rand::RngCore;

        let mut a = search_rng(7, TimeIndex::from(3), 0);
        let mut b = search_rng(7, TimeIndex::from(3), 0);
        let mut c = search_rng(7, TimeIndex::from(4), 0);
        let mut d = search_rng(7, TimeIndex::from(3), 1);
        let first = a.next_u64();
        assert_eq!(first, b.next_u64());
        assert_ne!(first, c.next_u64());
        assert_ne!(first, d.next_u64());
    }
}
