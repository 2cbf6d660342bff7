use rand::{RngCore, distributions::WeightedIndex, prelude::Distribution, seq::SliceRandom};

use crate::model::EnvironmentModel;
use crate::tree::ids::TimeIndex;

/// Picks actions for the cheap playout past the tree frontier.
pub trait RolloutPolicy<M: EnvironmentModel> {
    /// Return the action to play, or `None` if the state offers none.
    fn choose(
        &mut self,
        model: &M,
        state: &M::State,
        time: TimeIndex,
        rng: &mut dyn RngCore,
    ) -> Result<Option<M::Action>, M::Error>;
}

/// Default rollout policy: whatever `EnvironmentModel::sample_action` draws,
/// which is uniform over the legal actions unless the model overrides it.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformRollout;

impl<M: EnvironmentModel> RolloutPolicy<M> for UniformRollout {
    fn choose(
        &mut self,
        model: &M,
        state: &M::State,
        time: TimeIndex,
        rng: &mut dyn RngCore,
    ) -> Result<Option<M::Action>, M::Error> {
        model.sample_action(state, time, rng)
    }
}

/// Heuristic rollout policy: draws a legal action with probability proportional
/// to `weight(state, time, action)`. Falls back to a uniform draw when every
/// weight is zero or invalid.
#[derive(Debug, Clone)]
pub struct BiasedRollout<F> {
    weight: F,
}

impl<F> BiasedRollout<F> {
    pub fn new(weight: F) -> Self {
        BiasedRollout { weight }
    }
}

impl<M, F> RolloutPolicy<M> for BiasedRollout<F>
where
    M: EnvironmentModel,
    F: FnMut(&M::State, TimeIndex, &M::Action) -> f64,
{
    fn choose(
        &mut self,
        model: &M,
        state: &M::State,
        time: TimeIndex,
        rng: &mut dyn RngCore,
    ) -> Result<Option<M::Action>, M::Error> {
        let actions = model.legal_actions(state, time)?;
        let weights: Vec<f64> = actions
            .iter()
            .map(|action| (self.weight)(state, time, action))
            .map(|w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
            .collect();
        match WeightedIndex::new(&weights) {
            Ok(dist) => Ok(actions.get(dist.sample(rng)).cloned()),
            Err(_) => Ok(actions.choose(rng).cloned()),
        }
    }
}

/// Rollout parameters controlling return shape and stopping criteria.
#[derive(Debug, Clone, Copy)]
pub struct RolloutParams {
    pub gamma: f64,
    pub max_steps: usize,
}

/// Why a rollout stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutEnd {
    Terminal,
    Horizon,
    /// `should_stop` fired; the partial return must be thrown away.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RolloutResult {
    pub discounted_return: f64,
    pub steps: usize,
    pub end: RolloutEnd,
}

/// Run a default-policy rollout from `start`, accumulating `sum gamma^t * r_t`.
///
/// The environment stays generic and is only reached through callbacks:
/// - `choose(position, rng) -> action`
/// - `step(position, action, rng) -> (next_position, reward, is_terminal)`
/// - `should_stop() -> bool`, polled before every step
///
/// No tree nodes are created for rollout steps.
pub fn rollout<P, A, G, FChoose, FStep, FStop, E>(
    start: P,
    params: RolloutParams,
    rng: &mut G,
    mut choose: FChoose,
    mut step: FStep,
    mut should_stop: FStop,
) -> Result<RolloutResult, E>
where
    G: RngCore + ?Sized,
    FChoose: FnMut(&P, &mut G) -> Result<A, E>,
    FStep: FnMut(&P, &A, &mut G) -> Result<(P, f64, bool), E>,
    FStop: FnMut() -> bool,
{
    let mut position = start;
    let mut total_return = 0.0;
    let mut discount = 1.0;

    for steps in 0..params.max_steps {
        if should_stop() {
            return Ok(RolloutResult {
                discounted_return: total_return,
                steps,
                end: RolloutEnd::Interrupted,
            });
        }

        let action = choose(&position, rng)?;
        let (next, reward, is_terminal) = step(&position, &action, rng)?;
        total_return += discount * reward;
        discount *= params.gamma;
        position = next;

        if is_terminal {
            return Ok(RolloutResult {
                discounted_return: total_return,
                steps: steps + 1,
                end: RolloutEnd::Terminal,
            });
        }
    }

    Ok(RolloutResult {
        discounted_return: total_return,
        steps: params.max_steps,
        end: RolloutEnd::Horizon,
    })
}
