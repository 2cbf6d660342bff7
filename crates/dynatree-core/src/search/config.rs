use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::search::{inference::InferenceConfig, selection::TieBreak, widening::Widening};
use crate::tree::search_tree::RootPolicy;

const DEFAULT_PLANNER_CONFIG_YAML: &str = include_str!("../../config/planner.default.yaml");

/// Computational budget of one planning call. Whichever limit is hit first stops the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Budget {
    /// Number of simulations to attempt.
    pub iterations: Option<usize>,
    /// Wall-clock limit in milliseconds. An in-flight simulation is abandoned when it expires.
    pub time_limit_ms: Option<u64>,
    /// Stop once some decision node reaches this depth.
    pub max_tree_depth: Option<u64>,
}

impl Default for Budget {
    fn default() -> Self {
        Budget {
            iterations: Some(256),
            time_limit_ms: None,
            max_tree_depth: None,
        }
    }
}

impl Budget {
    /// Budget bounded by iteration count only.
    pub fn iterations(iterations: usize) -> Self {
        Budget {
            iterations: Some(iterations),
            time_limit_ms: None,
            max_tree_depth: None,
        }
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations.is_none() && self.time_limit_ms.is_none() {
            return Err(ConfigError::Invalid(
                "budget needs an iteration count or a time limit".to_string(),
            ));
        }
        if self.iterations == Some(0) {
            return Err(ConfigError::Invalid(
                "budget.iterations must be greater than 0".to_string(),
            ));
        }
        if self.time_limit_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "budget.time_limit_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_tree_depth == Some(0) {
            return Err(ConfigError::Invalid(
                "budget.max_tree_depth must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the rollout horizon is counted from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizonMode {
    /// Rollouts run at most `rollout_horizon` steps past the node they start from.
    #[default]
    FromLeaf,
    /// Tree prefix plus rollout never exceeds `rollout_horizon` steps from the root.
    FromRoot,
}

/// Order in which untried discrete actions are expanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionOrder {
    /// In the order the model lists them.
    #[default]
    Listed,
    /// Uniformly at random among the untried ones.
    Random,
}

/// Which clock the model is queried with while simulating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicsMode {
    /// Every simulated step uses the dynamics of the planning time.
    Frozen,
    /// Simulated steps use the dynamics of their own simulated time.
    #[default]
    Advancing,
}

/// Search variant; selects the strategy set the engine runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Variant {
    /// Enumerated discrete actions, every legal action tried before UCB descent.
    #[default]
    Uct,
    /// Sampled actions with progressive widening.
    OlUct { widening: Widening },
    /// Sampled actions with progressive widening, scored through value inference.
    IqUct {
        widening: Widening,
        #[serde(default)]
        inference: InferenceConfig,
    },
}

impl Variant {
    /// Widening schedule of the sampling variants.
    pub fn widening(&self) -> Option<Widening> {
        match self {
            Variant::Uct => None,
            Variant::OlUct { widening } | Variant::IqUct { widening, .. } => Some(*widening),
        }
    }
}

fn default_exploration_constant() -> f64 {
    1.4
}

fn default_gamma() -> f64 {
    0.95
}

fn default_rollout_horizon() -> usize {
    32
}

fn default_workers() -> usize {
    1
}

/// Planner configuration.
///
/// `root_policy` has no default when loading YAML: the final choice rule must be stated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerConfig {
    #[serde(default)]
    pub budget: Budget,
    #[serde(default = "default_exploration_constant")]
    pub exploration_constant: f64,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default = "default_rollout_horizon")]
    pub rollout_horizon: usize,
    #[serde(default)]
    pub horizon_mode: HorizonMode,
    pub root_policy: RootPolicy,
    #[serde(default)]
    pub tie_break: TieBreak,
    #[serde(default)]
    pub expansion_order: ExpansionOrder,
    #[serde(default)]
    pub variant: Variant,
    /// Caps distinct stochastic outcomes per action node; `None` keeps every distinct draw.
    #[serde(default)]
    pub outcome_widening: Option<Widening>,
    #[serde(default)]
    pub dynamics: DynamicsMode,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub seed: u64,
}

impl PlannerConfig {
    /// Configuration with the given root policy and every other field at its default.
    pub fn new(root_policy: RootPolicy) -> Self {
        PlannerConfig {
            budget: Budget::default(),
            exploration_constant: default_exploration_constant(),
            gamma: default_gamma(),
            rollout_horizon: default_rollout_horizon(),
            horizon_mode: HorizonMode::default(),
            root_policy,
            tie_break: TieBreak::default(),
            expansion_order: ExpansionOrder::default(),
            variant: Variant::default(),
            outcome_widening: None,
            dynamics: DynamicsMode::default(),
            workers: default_workers(),
            seed: 0,
        }
    }

    /// Parse a planner config from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: PlannerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a planner config from a YAML file path.
    pub fn from_yaml_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Return the default YAML config included with this crate.
    pub fn default_yaml() -> &'static str {
        DEFAULT_PLANNER_CONFIG_YAML
    }

    /// Parse the default YAML config included with this crate.
    pub fn from_default_yaml() -> Result<Self, ConfigError> {
        Self::from_yaml_str(Self::default_yaml())
    }

    /// Serialize this config back to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.budget.validate()?;
        if !self.exploration_constant.is_finite() || self.exploration_constant <= 0.0 {
            return Err(ConfigError::Invalid(
                "exploration_constant must be finite and > 0".to_string(),
            ));
        }
        if !self.gamma.is_finite() || self.gamma <= 0.0 || self.gamma > 1.0 {
            return Err(ConfigError::Invalid(
                "gamma must be within (0, 1]".to_string(),
            ));
        }
        if self.rollout_horizon == 0 {
            return Err(ConfigError::Invalid(
                "rollout_horizon must be greater than 0".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid(
                "workers must be greater than 0".to_string(),
            ));
        }
        match &self.variant {
            Variant::Uct => {}
            Variant::OlUct { widening } => widening.validate("variant.widening")?,
            Variant::IqUct {
                widening,
                inference,
            } => {
                widening.validate("variant.widening")?;
                inference.validate()?;
            }
        }
        if let Some(widening) = &self.outcome_widening {
            widening.validate("outcome_widening")?;
        }
        Ok(())
    }
}

/// Error type for loading and validating `PlannerConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid planner config: {0}")]
    Invalid(String),
}
