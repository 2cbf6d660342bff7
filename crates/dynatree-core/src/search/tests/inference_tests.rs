use proptest::prelude::*;

use crate::search::inference::{InferenceConfig, Neighbor, Weighting, infer_value};

fn neighbor(distance: f64, value: f64, visits: u64) -> Neighbor {
    Neighbor {
        distance,
        value,
        visits,
    }
}

#[test]
fn no_visited_sibling_means_no_inference() {
    let config = InferenceConfig::default();
    assert_eq!(infer_value(&[], &config), None);
    assert_eq!(infer_value(&[neighbor(0.5, 3.0, 0)], &config), None);
}

#[test]
fn sampled_action_keeps_its_own_mean() {
    let config = InferenceConfig::default();
    let neighbors = [neighbor(0.0, 2.0, 5), neighbor(0.1, -4.0, 50)];

    let inference = infer_value(&neighbors, &config).expect("visited siblings");

    assert_eq!(inference.value, 2.0);
    assert!(inference.confidence > 5.0);
}

#[test]
fn closer_siblings_weigh_more() {
    let config = InferenceConfig::default();
    let neighbors = [neighbor(0.1, 1.0, 1), neighbor(0.9, 0.0, 1)];

    let inference = infer_value(&neighbors, &config).expect("visited siblings");

    // Shepard weights 1/0.01 and 1/0.81.
    let expected = 100.0 / (100.0 + 1.0 / 0.81);
    assert!((inference.value - expected).abs() < 1e-9);
}

#[test]
fn confidence_decays_with_distance() {
    let config = InferenceConfig {
        weighting: Weighting::Gaussian,
        ..InferenceConfig::default()
    };
    let near = infer_value(&[neighbor(0.1, 1.0, 10)], &config).expect("visited");
    let far = infer_value(&[neighbor(3.0, 1.0, 10)], &config).expect("visited");
    assert!(near.confidence > far.confidence);
    assert!(near.confidence <= 10.0);
}

#[test]
fn underflowing_weights_fall_back_to_visit_weighted_mean() {
    let config = InferenceConfig {
        weighting: Weighting::Gaussian,
        bandwidth: 1e-3,
        candidates: 1,
    };
    let neighbors = [neighbor(10.0, 1.0, 1), neighbor(20.0, 4.0, 2)];

    let inference = infer_value(&neighbors, &config).expect("visited siblings");

    assert!((inference.value - 3.0).abs() < 1e-12);
}

proptest! {
    #[test]
    fn inferred_value_stays_within_sibling_range(
        siblings in proptest::collection::vec((0.001f64..5.0, -10.0f64..10.0, 1u64..50), 1..12),
        power in 0.5f64..4.0,
    ) {
        let config = InferenceConfig {
            weighting: Weighting::InverseDistance { power },
            ..InferenceConfig::default()
        };
        let neighbors: Vec<Neighbor> = siblings
            .iter()
            .map(|(d, v, n)| neighbor(*d, *v, *n))
            .collect();

        let inference = infer_value(&neighbors, &config).expect("visited siblings");

        let low = siblings.iter().map(|(_, v, _)| *v).fold(f64::INFINITY, f64::min);
        let high = siblings.iter().map(|(_, v, _)| *v).fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(inference.value >= low - 1e-9 && inference.value <= high + 1e-9);
        prop_assert!(inference.confidence >= 0.0);
    }
}
