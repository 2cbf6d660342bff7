use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{CompiledMdp, MdpError, compiled::PROB_TOLERANCE};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Serializable MDP schema used for YAML IO and validation.
pub struct MdpSpec {
    /// Schema version for future compatibility checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// String id of the start state.
    pub start: String,
    /// Every state is terminal once the clock reaches this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon: Option<u64>,
    /// All state declarations in the model.
    pub states: Vec<StateSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// A single state declaration in the MDP schema.
pub struct StateSpec {
    /// Unique state id.
    pub id: String,
    /// Whether this state is terminal (defaults to `false` if omitted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<bool>,
    /// Available actions from this state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<ActionSpec>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// A named action and its stochastic outcomes.
pub struct ActionSpec {
    pub id: String,
    pub outcomes: Vec<OutcomeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One probabilistic transition for an action.
/// Its reward at time `t` is `reward + reward_drift * t`.
pub struct OutcomeSpec {
    pub next: String,
    pub prob: f64,
    pub reward: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_drift: Option<f64>,
}

impl MdpSpec {
    /// Validate schema invariants using the crate default tolerance.
    pub fn validate(&self) -> Result<(), MdpError> {
        self.validate_with_tolerance(PROB_TOLERANCE)
    }

    /// Validate the horizon, ids, transitions, and probability constraints.
    pub fn validate_with_tolerance(&self, tolerance: f64) -> Result<(), MdpError> {
        if self.start.trim().is_empty() {
            return Err(MdpError::MissingStart);
        }
        if self.horizon == Some(0) {
            return Err(MdpError::InvalidHorizon);
        }

        let mut known = HashSet::with_capacity(self.states.len());
        if let Some(dup) = self.states.iter().find(|state| !known.insert(state.id.as_str())) {
            return Err(MdpError::DuplicateStateId { id: dup.id.clone() });
        }
        if !known.contains(self.start.as_str()) {
            return Err(MdpError::UnknownStartState {
                start: self.start.clone(),
            });
        }

        self.states
            .iter()
            .try_for_each(|state| state.validate(&known, tolerance))
    }

    /// Compile this spec into the runtime representation.
    pub fn compile(&self) -> Result<CompiledMdp, MdpError> {
        CompiledMdp::from_spec(self)
    }
}

impl StateSpec {
    fn validate(&self, known: &HashSet<&str>, tolerance: f64) -> Result<(), MdpError> {
        let actions = self.actions.as_deref().unwrap_or(&[]);
        if self.terminal.unwrap_or(false) && !actions.is_empty() {
            return Err(MdpError::TerminalStateHasActions {
                state: self.id.clone(),
            });
        }

        let mut action_ids = HashSet::with_capacity(actions.len());
        for action in actions {
            if !action_ids.insert(action.id.as_str()) {
                return Err(MdpError::DuplicateActionId {
                    state: self.id.clone(),
                    action: action.id.clone(),
                });
            }
            action.validate(&self.id, known, tolerance)?;
        }
        Ok(())
    }
}

/// Which numeric field of an outcome is out of range.
enum BadField {
    Probability(f64),
    Reward(f64),
    Drift(f64),
}

impl ActionSpec {
    fn validate(&self, state: &str, known: &HashSet<&str>, tolerance: f64) -> Result<(), MdpError> {
        if self.outcomes.is_empty() {
            return Err(MdpError::EmptyOutcomes {
                state: state.to_string(),
                action: self.id.clone(),
            });
        }

        for (outcome_index, outcome) in self.outcomes.iter().enumerate() {
            if let Some(bad) = outcome.bad_field() {
                let (state, action) = (state.to_string(), self.id.clone());
                return Err(match bad {
                    BadField::Probability(value) => MdpError::InvalidProbability {
                        state,
                        action,
                        outcome_index,
                        value,
                    },
                    BadField::Reward(value) => MdpError::InvalidReward {
                        state,
                        action,
                        outcome_index,
                        value,
                    },
                    BadField::Drift(value) => MdpError::InvalidDrift {
                        state,
                        action,
                        outcome_index,
                        value,
                    },
                });
            }
            if !known.contains(outcome.next.as_str()) {
                return Err(MdpError::UnknownNextState {
                    state: state.to_string(),
                    action: self.id.clone(),
                    next: outcome.next.clone(),
                });
            }
        }

        let sum: f64 = self.outcomes.iter().map(|outcome| outcome.prob).sum();
        if (sum - 1.0).abs() > tolerance {
            return Err(MdpError::ProbabilitySum {
                state: state.to_string(),
                action: self.id.clone(),
                sum,
                tolerance,
            });
        }
        Ok(())
    }
}

impl OutcomeSpec {
    fn bad_field(&self) -> Option<BadField> {
        if !self.prob.is_finite() || self.prob < 0.0 {
            Some(BadField::Probability(self.prob))
        } else if !self.reward.is_finite() {
            Some(BadField::Reward(self.reward))
        } else {
            self.reward_drift
                .filter(|drift| !drift.is_finite())
                .map(BadField::Drift)
        }
    }
}
