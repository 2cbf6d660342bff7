use std::fmt::Debug;

use rand::{RngCore, seq::SliceRandom};

use crate::tree::ids::TimeIndex;

/// Result of applying one action to one state.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S> {
    pub state: S,
    pub reward: f64,
    pub terminal: bool,
    /// Time step of `state`; never earlier than the time the step was queried at.
    pub time_index: TimeIndex,
}

/// Generic interface to a (possibly non-stationary) environment model.
///
/// Every call is pure with respect to its arguments: randomness only comes in
/// through `rng`, which the planner seeds explicitly. Dynamics may depend on the
/// `time` argument.
pub trait EnvironmentModel {
    type State: Clone + PartialEq;
    type Action: Clone + PartialEq + Debug;
    type Error: std::error::Error + 'static;

    /// Return the initial state of the environment and its time step.
    fn reset(&mut self) -> Result<(Self::State, TimeIndex), Self::Error>;

    /// Return the enumerable action set of a state.
    /// Models with continuous actions may return an empty set and provide
    /// `sample_action` instead; they can then only be planned with sampling variants.
    fn legal_actions(
        &self,
        state: &Self::State,
        time: TimeIndex,
    ) -> Result<Vec<Self::Action>, Self::Error>;

    /// Draw one action for `state`; `None` means no action is available.
    /// Defaults to a uniform draw from `legal_actions`.
    fn sample_action(
        &self,
        state: &Self::State,
        time: TimeIndex,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Self::Action>, Self::Error> {
        let actions = self.legal_actions(state, time)?;
        Ok(actions.choose(rng).cloned())
    }

    /// Sample one transition.
    fn step(
        &self,
        state: &Self::State,
        action: &Self::Action,
        time: TimeIndex,
        rng: &mut dyn RngCore,
    ) -> Result<Transition<Self::State>, Self::Error>;

    /// Return whether a state is terminal at a given time.
    fn is_terminal(&self, state: &Self::State, time: TimeIndex) -> Result<bool, Self::Error>;

    /// Distance between two actions, used to infer values of unsampled actions.
    /// Defaults to the discrete metric.
    fn action_distance(&self, a: &Self::Action, b: &Self::Action) -> f64 {
        if a == b { 0.0 } else { 1.0 }
    }
}
