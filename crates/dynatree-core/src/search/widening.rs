use serde::{Deserialize, Serialize};

use crate::search::config::ConfigError;

/// Progressive widening schedule: a node visited `n` times may hold at most
/// `ceil(k * n^alpha)` children.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Widening {
    pub k: f64,
    pub alpha: f64,
}

impl Widening {
    pub fn new(k: f64, alpha: f64) -> Self {
        Widening { k, alpha }
    }

    /// Maximum number of children allowed at `visits`.
    pub fn max_children(&self, visits: u64) -> usize {
        let bound = (self.k * (visits as f64).powf(self.alpha)).ceil();
        if bound.is_finite() && bound > 0.0 {
            bound as usize
        } else {
            0
        }
    }

    /// Whether a node with `children` children may grow another one at `visits`.
    pub fn allows(&self, children: usize, visits: u64) -> bool {
        children < self.max_children(visits)
    }

    pub(crate) fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if !self.k.is_finite() || self.k <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "{field}.k must be finite and > 0"
            )));
        }
        if !self.alpha.is_finite() || !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::Invalid(format!(
                "{field}.alpha must be within [0, 1]"
            )));
        }
        Ok(())
    }
}
