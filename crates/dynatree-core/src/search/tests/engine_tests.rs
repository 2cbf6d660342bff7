use std::time::Duration;

use crate::search::{
    config::{Budget, DynamicsMode, HorizonMode, PlannerConfig},
    error::PlanError,
    metrics::{DiscardReason, IterationOutcome, StopReason},
    planner::Planner,
    tests::models::{Fault, Faulty, ModelFailure, Scatter, TwoArms},
    widening::Widening,
};
use crate::tree::{ids::TimeIndex, search_tree::RootPolicy};

fn config(iterations: usize) -> PlannerConfig {
    PlannerConfig {
        budget: Budget::iterations(iterations),
        gamma: 1.0,
        ..PlannerConfig::new(RootPolicy::MaxVisits)
    }
}

#[test]
fn better_arm_is_recommended_and_visited_more() {
    let mut planner = Planner::new(TwoArms::new(3), config(100)).expect("valid config");

    let report = planner
        .plan(&(), TimeIndex::ZERO)
        .expect("planning succeeds");

    assert_eq!(report.action, 'A');
    let visits = |action: char| {
        report
            .root_actions
            .iter()
            .find(|stats| stats.action == action)
            .map(|stats| stats.visits)
            .expect("both arms are expanded")
    };
    assert!(visits('A') > visits('B'));
    assert_eq!(visits('A') + visits('B'), 100);
    assert_eq!(report.metrics.iterations_completed, 100);
    assert_eq!(report.metrics.stop_reason, StopReason::Iterations);
}

#[test]
fn terminal_root_fails_before_any_step() {
    let mut planner = Planner::new(TwoArms::new(3), config(10)).expect("valid config");

    let err = planner
        .select_action(&(), TimeIndex::from(3))
        .expect_err("terminal root must be rejected");

    assert!(matches!(err, PlanError::TerminalState { time } if time == TimeIndex::from(3)));
    assert_eq!(planner.model().step_calls(), 0);
}

#[test]
fn tree_keeps_visit_and_outcome_bookkeeping() {
    let mut planner = Planner::new(Scatter { width: 3, steps: 4 }, config(200))
        .expect("valid config");

    let (tree, metrics) = planner
        .plan_tree(&0, TimeIndex::ZERO)
        .expect("planning succeeds");

    assert!(tree.check_invariants().is_ok());
    assert_eq!(
        tree.node(tree.root_id()).expect("root").visits(),
        metrics.iterations_completed as u64
    );
    for (_, node) in tree.nodes() {
        if let Some(parent) = node.parent() {
            let action = tree.action_node(parent).expect("parent exists");
            let parent_node = tree.node(action.parent()).expect("grandparent exists");
            assert_eq!(node.time_index(), parent_node.time_index().advanced_by(1));
            assert_eq!(node.depth(), parent_node.depth() + 1);
        }
    }
}

#[test]
fn outcome_widening_caps_distinct_successors() {
    let widening = Widening::new(1.0, 0.5);
    let config = PlannerConfig {
        outcome_widening: Some(widening),
        ..config(300)
    };
    let mut planner = Planner::new(Scatter { width: 1000, steps: 3 }, config).expect("valid config");

    let (tree, _) = planner.plan_tree(&0, TimeIndex::ZERO).expect("planning succeeds");

    assert!(tree.check_invariants().is_ok());
    for (_, action) in tree.action_nodes() {
        assert!(action.outcomes_len() <= widening.max_children(action.visits()).max(1));
    }
}

#[test]
fn frozen_dynamics_query_the_planning_time_only() {
    let config = PlannerConfig {
        dynamics: DynamicsMode::Frozen,
        ..config(50)
    };
    let mut planner = Planner::new(TwoArms::new(10), config).expect("valid config");

    let (tree, _) = planner
        .plan_tree(&(), TimeIndex::from(4))
        .expect("planning succeeds");

    assert!(
        planner
            .model()
            .queried_times()
            .iter()
            .all(|time| *time == TimeIndex::from(4))
    );
    // Simulated time still advances inside the tree.
    assert!(tree.max_depth() > 0);
    assert!(
        tree.nodes()
            .all(|(_, node)| node.time_index().value() == 4 + node.depth())
    );
}

#[test]
fn advancing_dynamics_query_simulated_times() {
    let mut planner = Planner::new(TwoArms::new(10), config(50)).expect("valid config");

    planner
        .plan_tree(&(), TimeIndex::from(4))
        .expect("planning succeeds");

    let queried = planner.model().queried_times();
    assert!(queried.iter().all(|time| *time >= TimeIndex::from(4)));
    assert!(queried.iter().any(|time| *time > TimeIndex::from(4)));
}

#[test]
fn horizon_from_root_bounds_every_simulation() {
    let config = PlannerConfig {
        rollout_horizon: 3,
        horizon_mode: HorizonMode::FromRoot,
        ..config(40)
    };
    let mut planner = Planner::new(TwoArms::new(50), config).expect("valid config");

    let mut longest = 0;
    planner
        .plan_with_hook(&(), TimeIndex::ZERO, |outcome| {
            if let IterationOutcome::Completed(metrics) = outcome {
                longest = longest.max(metrics.path_len + metrics.rollout_steps);
            }
        })
        .expect("planning succeeds");

    assert!(longest > 0);
    assert!(longest <= 3);
}

#[test]
fn non_finite_rewards_discard_the_simulation() {
    let mut planner =
        Planner::new(Faulty { fault: Fault::NanReward }, config(20)).expect("valid config");

    let mut discarded = Vec::new();
    let (tree, metrics) = planner
        .plan_with_hook(&(), TimeIndex::from(5), |outcome| {
            if let IterationOutcome::Discarded(reason) = outcome {
                discarded.push(*reason);
            }
        })
        .expect("anomalies are not fatal");

    assert!(!discarded.is_empty());
    assert!(
        discarded
            .iter()
            .all(|reason| matches!(reason, DiscardReason::NumericAnomaly { .. }))
    );
    assert_eq!(
        metrics.iterations_completed + metrics.iterations_discarded,
        20
    );
    assert!(tree.check_invariants().is_ok());
    assert_eq!(
        tree.node(tree.root_id()).expect("root").visits(),
        metrics.iterations_completed as u64
    );
}

#[test]
fn model_errors_are_propagated() {
    let mut planner =
        Planner::new(Faulty { fault: Fault::StepFails }, config(5)).expect("valid config");

    let err = planner
        .plan_tree(&(), TimeIndex::from(5))
        .expect_err("step failures propagate");

    assert!(matches!(err, PlanError::Adapter(ModelFailure(time)) if time == TimeIndex::from(5)));
}

#[test]
fn time_regression_is_rejected() {
    let mut planner =
        Planner::new(Faulty { fault: Fault::Rewinds }, config(5)).expect("valid config");

    let err = planner
        .plan_tree(&(), TimeIndex::from(5))
        .expect_err("time must not go backwards");

    assert!(matches!(
        err,
        PlanError::TimeRegression { from, to }
            if from == TimeIndex::from(5) && to == TimeIndex::from(4)
    ));
}

#[test]
fn missing_actions_in_live_state_are_an_error() {
    let mut planner =
        Planner::new(Faulty { fault: Fault::NoActions }, config(5)).expect("valid config");

    let err = planner
        .select_action(&(), TimeIndex::from(5))
        .expect_err("no actions to plan with");

    assert!(matches!(err, PlanError::NoLegalActions { depth: 0, .. }));
}

#[test]
fn time_budget_stops_the_search() {
    let config = PlannerConfig {
        budget: Budget {
            iterations: None,
            time_limit_ms: Some(30),
            max_tree_depth: None,
        },
        ..config(1)
    };
    let mut planner = Planner::new(TwoArms::new(20), config).expect("valid config");

    let report = planner
        .plan(&(), TimeIndex::ZERO)
        .expect("planning succeeds");

    assert_eq!(report.metrics.stop_reason, StopReason::TimeLimit);
    assert!(report.metrics.iterations_completed > 0);
    assert!(report.metrics.elapsed >= Duration::from_millis(30));
}

#[test]
fn tree_depth_budget_stops_the_search() {
    let config = PlannerConfig {
        budget: Budget {
            iterations: Some(10_000),
            time_limit_ms: None,
            max_tree_depth: Some(3),
        },
        ..config(1)
    };
    let mut planner = Planner::new(TwoArms::new(100), config).expect("valid config");

    let (tree, metrics) = planner
        .plan_tree(&(), TimeIndex::ZERO)
        .expect("planning succeeds");

    assert_eq!(metrics.stop_reason, StopReason::TreeDepth);
    assert_eq!(tree.max_depth(), 3);
    assert!(metrics.iterations_completed < 10_000);
}

#[test]
fn same_seed_and_time_reproduce_the_plan() {
    let config = PlannerConfig {
        seed: 11,
        ..config(120)
    };
    let mut first = Planner::new(Scatter { width: 4, steps: 5 }, config.clone()).expect("valid");
    let mut second = Planner::new(Scatter { width: 4, steps: 5 }, config).expect("valid");

    let a = first.plan(&0, TimeIndex::from(2)).expect("planning succeeds");
    let b = second.plan(&0, TimeIndex::from(2)).expect("planning succeeds");

    assert_eq!(a.action, b.action);
    assert_eq!(a.root_actions, b.root_actions);
}

#[test]
fn parallel_workers_share_the_iteration_budget() {
    let config = PlannerConfig {
        workers: 4,
        ..config(202)
    };
    let mut planner = Planner::new(TwoArms::new(3), config).expect("valid config");

    let report = planner
        .plan(&(), TimeIndex::ZERO)
        .expect("planning succeeds");

    assert_eq!(report.action, 'A');
    assert_eq!(report.metrics.iterations_requested, Some(202));
    assert_eq!(report.metrics.iterations_completed, 202);
    let root_visits: u64 = report.root_actions.iter().map(|stats| stats.visits).sum();
    assert_eq!(root_visits, 202);
    assert_eq!(report.root_actions.len(), 2);
}

#[test]
fn max_value_policy_reads_mean_returns() {
    let config = PlannerConfig {
        root_policy: RootPolicy::MaxValue,
        ..config(30)
    };
    let mut planner = Planner::new(TwoArms::new(2), config).expect("valid config");

    let report = planner
        .plan(&(), TimeIndex::ZERO)
        .expect("planning succeeds");

    let best = report
        .root_actions
        .iter()
        .max_by(|a, b| a.value.total_cmp(&b.value))
        .expect("root actions exist");
    assert_eq!(report.action, best.action);
}
