use std::collections::HashMap;

use dynatree_core::TimeIndex;

use crate::{MdpError, MdpSpec};

/// Floating point tolerance used when validating probability sums.
pub(crate) const PROB_TOLERANCE: f64 = 1e-9;

/// Position of a state in declaration order; the planner's state type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateKey(usize);

impl StateKey {
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for StateKey {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

/// One sampled step of a compiled MDP.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub next: StateKey,
    pub reward: f64,
    /// Whether `next` is terminal at the following time step.
    pub terminal: bool,
}

/// Validated MDP with resolved state references and per-action outcome CDFs.
#[derive(Debug, Clone)]
pub struct CompiledMdp {
    start: StateKey,
    horizon: Option<u64>,
    states: Vec<StateRec>,
    state_ids: Vec<String>,
    state_id_to_key: HashMap<String, StateKey>,
}

#[derive(Debug, Clone)]
struct StateRec {
    terminal: bool,
    actions: Vec<ActionRec>,
}

#[derive(Debug, Clone)]
struct ActionRec {
    id: String,
    outcomes: Vec<OutcomeRec>,
    cdf: Vec<f64>,
}

#[derive(Debug, Clone)]
struct OutcomeRec {
    next: StateKey,
    reward: f64,
    drift: f64,
}

impl OutcomeRec {
    fn reward_at(&self, time: TimeIndex) -> f64 {
        self.reward + self.drift * time.value() as f64
    }
}

impl CompiledMdp {
    /// Validate `spec` and resolve its string references into dense keys and CDFs.
    pub(crate) fn from_spec(spec: &MdpSpec) -> Result<Self, MdpError> {
        spec.validate_with_tolerance(PROB_TOLERANCE)?;

        let state_ids: Vec<String> = spec.states.iter().map(|state| state.id.clone()).collect();
        let state_id_to_key: HashMap<String, StateKey> = state_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), StateKey::from(idx)))
            .collect();
        let resolve = |id: &str| state_id_to_key.get(id).copied();

        let start = resolve(&spec.start).ok_or_else(|| MdpError::UnknownStartState {
            start: spec.start.clone(),
        })?;

        let states = spec
            .states
            .iter()
            .map(|state| {
                let actions = state
                    .actions
                    .as_deref()
                    .unwrap_or(&[])
                    .iter()
                    .map(|action| {
                        let outcomes = action
                            .outcomes
                            .iter()
                            .map(|outcome| {
                                let next = resolve(&outcome.next).ok_or_else(|| {
                                    MdpError::UnknownNextState {
                                        state: state.id.clone(),
                                        action: action.id.clone(),
                                        next: outcome.next.clone(),
                                    }
                                })?;
                                Ok(OutcomeRec {
                                    next,
                                    reward: outcome.reward,
                                    drift: outcome.reward_drift.unwrap_or(0.0),
                                })
                            })
                            .collect::<Result<Vec<_>, MdpError>>()?;
                        let cdf = action
                            .outcomes
                            .iter()
                            .scan(0.0_f64, |cumulative, outcome| {
                                *cumulative += outcome.prob;
                                Some(*cumulative)
                            })
                            .collect();
                        Ok(ActionRec {
                            id: action.id.clone(),
                            outcomes,
                            cdf,
                        })
                    })
                    .collect::<Result<Vec<_>, MdpError>>()?;
                Ok(StateRec {
                    terminal: state.terminal.unwrap_or(false),
                    actions,
                })
            })
            .collect::<Result<Vec<_>, MdpError>>()?;

        Ok(Self {
            start,
            horizon: spec.horizon,
            states,
            state_ids,
            state_id_to_key,
        })
    }

    /// Return the start state key.
    pub fn start(&self) -> StateKey {
        self.start
    }

    /// Time step at which every state becomes terminal, if any.
    pub fn horizon(&self) -> Option<u64> {
        self.horizon
    }

    /// Return the number of compiled states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Check whether a state is terminal at `time`, either by declaration or by the horizon.
    pub fn is_terminal(&self, key: StateKey, time: TimeIndex) -> Option<bool> {
        let past_horizon = self.horizon.is_some_and(|h| time.value() >= h);
        self.states
            .get(key.index())
            .map(|state| state.terminal || past_horizon)
    }

    /// Return the number of actions available from a state.
    pub fn num_actions(&self, key: StateKey) -> Option<usize> {
        self.states
            .get(key.index())
            .map(|state| state.actions.len())
    }

    /// Return the string id of an action.
    pub fn action_id(&self, key: StateKey, action: usize) -> Option<&str> {
        self.states
            .get(key.index())?
            .actions
            .get(action)
            .map(|action| action.id.as_str())
    }

    /// Convert a state key back to its original string id.
    pub fn state_id(&self, key: StateKey) -> Option<&str> {
        self.state_ids.get(key.index()).map(String::as_str)
    }

    /// Convert a string id into a compiled state key.
    pub fn state_key(&self, id: &str) -> Option<StateKey> {
        self.state_id_to_key.get(id).copied()
    }

    /// Outcomes of taking `action` in `state` at `time` as `(next, probability, reward)`.
    pub fn transitions(
        &self,
        state: StateKey,
        action: usize,
        time: TimeIndex,
    ) -> Option<Vec<(StateKey, f64, f64)>> {
        let action = self.states.get(state.index())?.actions.get(action)?;
        let mut previous = 0.0;
        Some(
            action
                .outcomes
                .iter()
                .zip(&action.cdf)
                .map(|(outcome, cumulative)| {
                    let prob = cumulative - previous;
                    previous = *cumulative;
                    (outcome.next, prob, outcome.reward_at(time))
                })
                .collect(),
        )
    }

    /// Expected reward of taking `action` in `state` at `time`.
    pub fn expected_reward(&self, state: StateKey, action: usize, time: TimeIndex) -> Option<f64> {
        let transitions = self.transitions(state, action, time)?;
        Some(transitions.iter().map(|(_, prob, reward)| prob * reward).sum())
    }

    /// Sample one transition for `(state_key, action)` at `time` using a uniform sample in `[0, 1)`.
    ///
    /// Stepping a terminal state is a no-op that stays put with zero reward.
    pub(crate) fn sample_transition(
        &self,
        state_key: StateKey,
        action: usize,
        time: TimeIndex,
        sample: f64,
    ) -> Result<Step, MdpError> {
        let state = self
            .states
            .get(state_key.index())
            .ok_or(MdpError::UnknownState {
                index: state_key.index(),
            })?;
        if self.is_terminal(state_key, time) == Some(true) {
            return Ok(Step {
                next: state_key,
                reward: 0.0,
                terminal: true,
            });
        }

        let unknown_action = || MdpError::UnknownAction {
            state: self.state_id(state_key).unwrap_or_default().to_string(),
            action,
        };
        let action_rec = state.actions.get(action).ok_or_else(unknown_action)?;

        // Rounding can leave the last cumulative value just under 1.0.
        let chosen_idx = action_rec
            .cdf
            .partition_point(|p| *p <= sample)
            .min(action_rec.outcomes.len().saturating_sub(1));
        let outcome = action_rec.outcomes.get(chosen_idx).ok_or_else(unknown_action)?;

        let next_time = time.advanced_by(1);
        Ok(Step {
            next: outcome.next,
            reward: outcome.reward_at(time),
            terminal: self.is_terminal(outcome.next, next_time).unwrap_or(true),
        })
    }
}
