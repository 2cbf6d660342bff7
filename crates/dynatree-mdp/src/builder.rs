use crate::{ActionSpec, CompiledMdp, MdpError, MdpSpec, OutcomeSpec, StateSpec};

#[derive(Debug, Clone, Default)]
/// Programmatic alternative to writing the YAML by hand
pub struct MdpBuilder {
    start: Option<String>,
    horizon: Option<u64>,
    states: Vec<StateSpec>,
}

impl MdpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the state episodes start in
    pub fn set_start(&mut self, state: impl Into<String>) -> &mut Self {
        self.start = Some(state.into());
        self
    }

    /// Make every state terminal from time step `horizon` on
    pub fn set_horizon(&mut self, horizon: u64) -> &mut Self {
        self.horizon = Some(horizon);
        self
    }

    /// Declare a state; terminal states cannot take actions
    pub fn add_state(&mut self, id: impl Into<String>, terminal: bool) -> &mut Self {
        self.states.push(StateSpec {
            id: id.into(),
            terminal: Some(terminal),
            actions: Some(Vec::new()),
        });
        self
    }

    /// Add an action to a state
    pub fn add_action(
        &mut self,
        state_id: impl AsRef<str>,
        action_id: impl Into<String>,
    ) -> Result<&mut Self, MdpError> {
        self.state_mut(state_id.as_ref())?
            .actions
            .get_or_insert_with(Vec::new)
            .push(ActionSpec {
                id: action_id.into(),
                outcomes: Vec::new(),
            });
        Ok(self)
    }

    fn state_mut(&mut self, state_id: &str) -> Result<&mut StateSpec, MdpError> {
        self.states
            .iter_mut()
            .find(|s| s.id == state_id)
            .ok_or_else(|| MdpError::BuilderUnknownState {
                state: state_id.to_string(),
            })
    }

    /// Add an outcome with a constant reward to an action
    pub fn add_outcome(
        &mut self,
        state_id: impl AsRef<str>,
        action_id: impl AsRef<str>,
        next: impl Into<String>,
        prob: f64,
        reward: f64,
    ) -> Result<&mut Self, MdpError> {
        self.push_outcome(
            state_id.as_ref(),
            action_id.as_ref(),
            OutcomeSpec {
                next: next.into(),
                prob,
                reward,
                reward_drift: None,
            },
        )
    }

    /// Add an outcome whose reward changes by `drift` every time step
    pub fn add_drifting_outcome(
        &mut self,
        state_id: impl AsRef<str>,
        action_id: impl AsRef<str>,
        next: impl Into<String>,
        prob: f64,
        reward: f64,
        drift: f64,
    ) -> Result<&mut Self, MdpError> {
        self.push_outcome(
            state_id.as_ref(),
            action_id.as_ref(),
            OutcomeSpec {
                next: next.into(),
                prob,
                reward,
                reward_drift: Some(drift),
            },
        )
    }

    fn push_outcome(
        &mut self,
        state_id: &str,
        action_id: &str,
        outcome: OutcomeSpec,
    ) -> Result<&mut Self, MdpError> {
        let action = self
            .state_mut(state_id)?
            .actions
            .get_or_insert_with(Vec::new)
            .iter_mut()
            .find(|a| a.id == action_id)
            .ok_or_else(|| MdpError::BuilderUnknownAction {
                state: state_id.to_string(),
                action: action_id.to_string(),
            })?;
        action.outcomes.push(outcome);
        Ok(self)
    }

    pub fn build_spec(self) -> Result<MdpSpec, MdpError> {
        let start = self.start.ok_or(MdpError::MissingStart)?;
        let spec = MdpSpec {
            version: Some(1),
            start,
            horizon: self.horizon,
            states: self.states,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn compile(self) -> Result<CompiledMdp, MdpError> {
        let spec = self.build_spec()?;
        spec.compile()
    }
}
