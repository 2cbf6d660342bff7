use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// How equal scores are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the first candidate in iteration order.
    #[default]
    FirstEncountered,
    /// Draw uniformly among the tied candidates.
    Random,
}

/// Return the key with the highest score.
///
/// With `TieBreak::Random` the winner among exact ties is drawn by reservoir
/// sampling, so the draw consumes randomness only when a tie actually occurs.
pub fn argmax<K, I>(scored: I, tie_break: TieBreak, rng: &mut dyn RngCore) -> Option<K>
where
    I: IntoIterator<Item = (K, f64)>,
{
    let mut best: Option<(K, f64)> = None;
    let mut ties = 0u64;

    for (key, score) in scored {
        if score.is_nan() {
            continue;
        }
        match &best {
            None => {
                best = Some((key, score));
                ties = 1;
            }
            Some((_, best_score)) if score > *best_score => {
                best = Some((key, score));
                ties = 1;
            }
            Some((_, best_score)) if score == *best_score => {
                ties += 1;
                if tie_break == TieBreak::Random && rng.gen_range(0..ties) == 0 {
                    best = Some((key, score));
                }
            }
            Some(_) => {}
        }
    }

    best.map(|(key, _)| key)
}
