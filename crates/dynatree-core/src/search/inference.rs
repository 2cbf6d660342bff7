//! Value inference for actions that were never simulated at a node.
//!
//! A query action is scored from its sampled siblings. The value is an
//! interpolation of the siblings' means; the confidence is a pseudo visit
//! count that shrinks with distance from the sampled points, so exploration
//! bonuses still favour regions nobody sampled.

use serde::{Deserialize, Serialize};

use crate::search::config::ConfigError;

/// Siblings closer than this are treated as the query action itself.
pub const EXACT_MATCH_DISTANCE: f64 = 1e-12;

/// Interpolation weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Weighting {
    /// Shepard interpolation: `visits / distance^power`.
    InverseDistance { power: f64 },
    /// `visits * exp(-d^2 / (2 * bandwidth^2))`.
    Gaussian,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    pub weighting: Weighting,
    /// Kernel width for the confidence (and for gaussian weights).
    pub bandwidth: f64,
    /// Action proposals drawn and scored per widening step.
    pub candidates: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        InferenceConfig {
            weighting: Weighting::InverseDistance { power: 2.0 },
            bandwidth: 1.0,
            candidates: 4,
        }
    }
}

impl InferenceConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if let Weighting::InverseDistance { power } = self.weighting {
            if !power.is_finite() || power <= 0.0 {
                return Err(ConfigError::Invalid(
                    "inference.weighting.power must be finite and > 0".to_string(),
                ));
            }
        }
        if !self.bandwidth.is_finite() || self.bandwidth <= 0.0 {
            return Err(ConfigError::Invalid(
                "inference.bandwidth must be finite and > 0".to_string(),
            ));
        }
        if self.candidates == 0 {
            return Err(ConfigError::Invalid(
                "inference.candidates must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn kernel(&self, distance: f64) -> f64 {
        let scaled = distance / self.bandwidth;
        (-0.5 * scaled * scaled).exp()
    }
}

/// A sampled sibling as seen from the query action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f64,
    pub value: f64,
    pub visits: u64,
}

/// Inferred value of a query action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inference {
    pub value: f64,
    /// Pseudo visit count backing `value`; use it where a visit count would go.
    pub confidence: f64,
}

/// Infer the value at a query action from its sampled siblings.
///
/// Returns `None` when no sibling has been visited. When some sibling sits on
/// the query action, its mean is returned unchanged.
pub fn infer_value(neighbors: &[Neighbor], config: &InferenceConfig) -> Option<Inference> {
    let visited = || {
        neighbors
            .iter()
            .filter(|n| n.visits > 0 && n.distance >= 0.0 && n.value.is_finite())
    };
    if visited().next().is_none() {
        return None;
    }

    let confidence: f64 = visited()
        .map(|n| n.visits as f64 * config.kernel(n.distance))
        .sum();

    let (exact_visits, exact_sum) = visited()
        .filter(|n| n.distance <= EXACT_MATCH_DISTANCE)
        .fold((0.0, 0.0), |(count, sum), n| {
            (count + n.visits as f64, sum + n.visits as f64 * n.value)
        });
    if exact_visits > 0.0 {
        return Some(Inference {
            value: exact_sum / exact_visits,
            confidence,
        });
    }

    let weight = |n: &Neighbor| match config.weighting {
        Weighting::InverseDistance { power } => n.visits as f64 / n.distance.powf(power),
        Weighting::Gaussian => n.visits as f64 * config.kernel(n.distance),
    };
    let (weight_sum, weighted_values) = visited().fold((0.0, 0.0), |(total, acc), n| {
        let w = weight(n);
        (total + w, acc + w * n.value)
    });

    let value = if weight_sum > 0.0 && weight_sum.is_finite() && weighted_values.is_finite() {
        weighted_values / weight_sum
    } else {
        // Every weight underflowed: fall back to the visit-weighted mean.
        let (count, sum) = visited().fold((0.0, 0.0), |(count, sum), n| {
            (count + n.visits as f64, sum + n.visits as f64 * n.value)
        });
        sum / count
    };

    Some(Inference { value, confidence })
}
