use dynatree_core::{EnvironmentModel, TimeIndex, Transition};
use rand::RngCore;

use crate::{CompiledMdp, MdpError, StateKey};

/// Compiled MDP exposed to the planner.
///
/// Actions are indices into the action list of the current state. Rewards may
/// drift with the time step and a configured horizon makes every state
/// terminal once reached, so the model is non-stationary in general.
#[derive(Debug, Clone)]
pub struct MdpModel {
    mdp: CompiledMdp,
    start_time: TimeIndex,
}

impl MdpModel {
    pub fn new(mdp: CompiledMdp) -> Self {
        Self {
            mdp,
            start_time: TimeIndex::ZERO,
        }
    }

    /// Start episodes at `time` instead of 0.
    pub fn starting_at(mut self, time: TimeIndex) -> Self {
        self.start_time = time;
        self
    }

    /// Borrow the underlying compiled MDP.
    pub fn mdp(&self) -> &CompiledMdp {
        &self.mdp
    }

    fn check_state(&self, state: StateKey) -> Result<(), MdpError> {
        if state.index() < self.mdp.state_count() {
            Ok(())
        } else {
            Err(MdpError::UnknownState {
                index: state.index(),
            })
        }
    }
}

/// Uniform sample in `[0, 1)` from the top 53 bits of one draw.
fn unit_sample(rng: &mut dyn RngCore) -> f64 {
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

impl EnvironmentModel for MdpModel {
    type State = StateKey;
    type Action = usize;
    type Error = MdpError;

    fn reset(&mut self) -> Result<(StateKey, TimeIndex), MdpError> {
        Ok((self.mdp.start(), self.start_time))
    }

    fn legal_actions(&self, state: &StateKey, time: TimeIndex) -> Result<Vec<usize>, MdpError> {
        if self.is_terminal(state, time)? {
            return Ok(Vec::new());
        }
        let count = self.mdp.num_actions(*state).unwrap_or(0);
        Ok((0..count).collect())
    }

    fn step(
        &self,
        state: &StateKey,
        action: &usize,
        time: TimeIndex,
        rng: &mut dyn RngCore,
    ) -> Result<Transition<StateKey>, MdpError> {
        let step = self
            .mdp
            .sample_transition(*state, *action, time, unit_sample(rng))?;
        Ok(Transition {
            state: step.next,
            reward: step.reward,
            terminal: step.terminal,
            time_index: time.advanced_by(1),
        })
    }

    fn is_terminal(&self, state: &StateKey, time: TimeIndex) -> Result<bool, MdpError> {
        self.check_state(*state)?;
        Ok(self.mdp.is_terminal(*state, time).unwrap_or(true))
    }
}
