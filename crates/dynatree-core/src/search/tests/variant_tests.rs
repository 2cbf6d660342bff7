use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::search::{
    config::{Budget, ExpansionOrder, PlannerConfig, Variant},
    error::PlanError,
    inference::InferenceConfig,
    planner::Planner,
    selection::TieBreak,
    strategy::{ActionStrategy, IqUctStrategy, Proposal, SelectionContext, UctStrategy},
    tests::models::{Peak, TwoArms},
    widening::Widening,
};
use crate::tree::{
    ids::TimeIndex,
    search_tree::{PathStep, RootPolicy, Tree},
};

fn sampling_config(variant: Variant, iterations: usize) -> PlannerConfig {
    PlannerConfig {
        budget: Budget::iterations(iterations),
        exploration_constant: 0.5,
        gamma: 1.0,
        variant,
        seed: 3,
        ..PlannerConfig::new(RootPolicy::MaxVisits)
    }
}

#[test]
fn oluct_respects_progressive_widening_at_the_root() {
    let widening = Widening::new(1.0, 0.5);
    let mut planner = Planner::new(
        Peak { peak: 0.7 },
        sampling_config(Variant::OlUct { widening }, 400),
    )
    .expect("valid config");

    let (tree, _) = planner.plan_tree(&(), TimeIndex::ZERO).expect("planning succeeds");

    let root = tree.node(tree.root_id()).expect("root");
    assert!(root.children().len() <= widening.max_children(root.visits()));
    assert!(root.children().len() > 1);
    assert!(tree.check_invariants().is_ok());
}

#[test]
fn oluct_concentrates_near_the_peak() {
    let widening = Widening::new(1.0, 0.5);
    let mut planner = Planner::new(
        Peak { peak: 0.7 },
        sampling_config(Variant::OlUct { widening }, 600),
    )
    .expect("valid config");

    let action = planner
        .select_action(&(), TimeIndex::ZERO)
        .expect("planning succeeds");

    assert!((action - 0.7).abs() < 0.3, "recommended {action}");
}

#[test]
fn iquct_concentrates_near_the_peak() {
    let variant = Variant::IqUct {
        widening: Widening::new(1.0, 0.5),
        inference: InferenceConfig {
            bandwidth: 0.1,
            ..InferenceConfig::default()
        },
    };
    let mut planner =
        Planner::new(Peak { peak: 0.7 }, sampling_config(variant, 600)).expect("valid config");

    let report = planner
        .plan(&(), TimeIndex::ZERO)
        .expect("planning succeeds");

    assert!((report.action - 0.7).abs() < 0.3, "recommended {}", report.action);
    let root_visits: u64 = report.root_actions.iter().map(|stats| stats.visits).sum();
    assert_eq!(root_visits, 600);
}

#[test]
fn uct_cannot_plan_without_an_enumerable_action_set() {
    let mut planner =
        Planner::new(Peak { peak: 0.5 }, sampling_config(Variant::Uct, 10)).expect("valid config");

    let err = planner
        .select_action(&(), TimeIndex::ZERO)
        .expect_err("no enumerable actions");

    assert!(matches!(err, PlanError::NoLegalActions { depth: 0, .. }));
}

#[test]
fn uct_tries_every_root_action_before_repeating() {
    let config = PlannerConfig {
        budget: Budget::iterations(2),
        ..PlannerConfig::new(RootPolicy::MaxVisits)
    };
    let mut planner = Planner::new(TwoArms::new(5), config).expect("valid config");

    let report = planner
        .plan(&(), TimeIndex::ZERO)
        .expect("planning succeeds");

    assert_eq!(report.root_actions.len(), 2);
    assert!(report.root_actions.iter().all(|stats| stats.visits == 1));
}

#[test]
fn uct_strategy_expands_in_listed_or_random_order() {
    let model = TwoArms::new(5);
    let mut tree: Tree<(), char> = Tree::new((), TimeIndex::ZERO, false);
    let root = tree.root_id();
    tree.set_action_pool(root, vec!['A', 'B']).expect("root exists");
    let ctx = SelectionContext {
        model: &model,
        tree: &tree,
        node: root,
        model_time: TimeIndex::ZERO,
        exploration_constant: 1.0,
        tie_break: TieBreak::FirstEncountered,
    };
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    let listed = UctStrategy {
        order: ExpansionOrder::Listed,
    };
    assert_eq!(
        listed.expand(&ctx, &mut rng).expect("infallible"),
        Some(Proposal::Untried { position: 0 })
    );

    let random = UctStrategy {
        order: ExpansionOrder::Random,
    };
    let mut positions = [false; 2];
    for _ in 0..50 {
        match random.expand(&ctx, &mut rng).expect("infallible") {
            Some(Proposal::Untried { position }) => positions[position] = true,
            other => panic!("unexpected proposal {other:?}"),
        }
    }
    assert_eq!(positions, [true, true]);
}

#[test]
fn iquct_infers_tried_values_exactly_and_interpolates_between_them() {
    let model = Peak { peak: 0.5 };
    let mut tree: Tree<(), f64> = Tree::new((), TimeIndex::ZERO, false);
    let root = tree.root_id();
    for (action, reward) in [(0.2, 1.0), (0.8, 3.0)] {
        let action_id = tree.add_action_node(root, action).expect("root exists");
        let leaf = tree
            .add_outcome(action_id, (), TimeIndex::from(1), reward, true)
            .expect("action exists");
        tree.backpropagate(
            &[PathStep {
                decision: root,
                action: action_id,
                reward,
            }],
            leaf,
            0.0,
            1.0,
        )
        .expect("finite");
    }
    let strategy = IqUctStrategy {
        widening: Widening::new(1.0, 0.5),
        inference: InferenceConfig::default(),
    };
    let ctx = SelectionContext {
        model: &model,
        tree: &tree,
        node: root,
        model_time: TimeIndex::ZERO,
        exploration_constant: 1.0,
        tie_break: TieBreak::FirstEncountered,
    };

    let tried = strategy.infer_value(&ctx, &0.2).expect("visited siblings");
    assert_eq!(tried.value, 1.0);

    let midway = strategy.infer_value(&ctx, &0.5).expect("visited siblings");
    assert!((midway.value - 2.0).abs() < 1e-12);

    let closer_to_high = strategy.infer_value(&ctx, &0.7).expect("visited siblings");
    assert!(closer_to_high.value > 2.0 && closer_to_high.value < 3.0);
}

#[test]
fn iquct_keeps_descending_while_widening_is_closed() {
    let model = Peak { peak: 0.5 };
    let mut tree: Tree<(), f64> = Tree::new((), TimeIndex::ZERO, false);
    let root = tree.root_id();
    let action_id = tree.add_action_node(root, 0.4).expect("root exists");
    let leaf = tree
        .add_outcome(action_id, (), TimeIndex::from(1), 1.0, true)
        .expect("action exists");
    tree.backpropagate(
        &[PathStep {
            decision: root,
            action: action_id,
            reward: 1.0,
        }],
        leaf,
        0.0,
        1.0,
    )
    .expect("finite");
    // One child at two visits stays within ceil(0.5 * 2^0) = 1.
    let strategy = IqUctStrategy {
        widening: Widening::new(0.5, 0.0),
        inference: InferenceConfig::default(),
    };
    let ctx = SelectionContext {
        model: &model,
        tree: &tree,
        node: root,
        model_time: TimeIndex::ZERO,
        exploration_constant: 1.0,
        tie_break: TieBreak::FirstEncountered,
    };
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    assert_eq!(strategy.expand(&ctx, &mut rng).expect("infallible"), None);
    assert_eq!(strategy.select(&ctx, &mut rng), Some(action_id));
}
