use crate::search::{
    config::{Budget, ConfigError, DynamicsMode, HorizonMode, PlannerConfig, Variant},
    inference::Weighting,
    selection::TieBreak,
    widening::Widening,
};
use crate::tree::search_tree::RootPolicy;

#[test]
fn default_config_yaml_parses() {
    let config = PlannerConfig::from_default_yaml().expect("default yaml should parse");
    assert_eq!(config, PlannerConfig::new(RootPolicy::MaxVisits));
    assert_eq!(config.budget.iterations, Some(256));
    assert_eq!(config.variant, Variant::Uct);
}

#[test]
fn iquct_yaml_parses_with_nested_settings() {
    let yaml = r#"
budget:
  iterations: 64
  time_limit_ms: 50
root_policy: max_value
tie_break: random
horizon_mode: from_root
dynamics: frozen
variant:
  kind: iq_uct
  widening: { k: 2.0, alpha: 0.5 }
  inference:
    weighting: { kind: gaussian }
    bandwidth: 0.25
    candidates: 3
outcome_widening: { k: 1.0, alpha: 0.3 }
workers: 2
seed: 9
"#;
    let config = PlannerConfig::from_yaml_str(yaml).expect("valid yaml");

    assert_eq!(config.root_policy, RootPolicy::MaxValue);
    assert_eq!(config.tie_break, TieBreak::Random);
    assert_eq!(config.horizon_mode, HorizonMode::FromRoot);
    assert_eq!(config.dynamics, DynamicsMode::Frozen);
    assert_eq!(config.budget.time_limit_ms, Some(50));
    assert_eq!(config.outcome_widening, Some(Widening::new(1.0, 0.3)));
    match config.variant {
        Variant::IqUct {
            widening,
            inference,
        } => {
            assert_eq!(widening, Widening::new(2.0, 0.5));
            assert_eq!(inference.weighting, Weighting::Gaussian);
            assert_eq!(inference.candidates, 3);
        }
        other => panic!("unexpected variant {other:?}"),
    }
}

#[test]
fn root_policy_must_be_stated() {
    let err = PlannerConfig::from_yaml_str("budget:\n  iterations: 10\n")
        .expect_err("root_policy is required");
    assert!(matches!(err, ConfigError::Yaml(_)));
}

#[test]
fn unknown_fields_are_rejected() {
    let err = PlannerConfig::from_yaml_str("root_policy: max_visits\niterations: 10\n")
        .expect_err("misplaced field");
    assert!(matches!(err, ConfigError::Yaml(_)));
}

#[test]
fn yaml_round_trip_preserves_config() {
    let config = PlannerConfig {
        variant: Variant::OlUct {
            widening: Widening::new(1.5, 0.4),
        },
        ..PlannerConfig::new(RootPolicy::MaxValue)
    };
    let yaml = config.to_yaml().expect("serializes");
    assert_eq!(PlannerConfig::from_yaml_str(&yaml).expect("parses"), config);
}

#[test]
fn invalid_values_are_rejected() {
    let base = PlannerConfig::new(RootPolicy::MaxVisits);
    let cases = [
        PlannerConfig {
            exploration_constant: 0.0,
            ..base.clone()
        },
        PlannerConfig {
            exploration_constant: f64::NAN,
            ..base.clone()
        },
        PlannerConfig {
            gamma: 0.0,
            ..base.clone()
        },
        PlannerConfig {
            gamma: 1.5,
            ..base.clone()
        },
        PlannerConfig {
            rollout_horizon: 0,
            ..base.clone()
        },
        PlannerConfig {
            workers: 0,
            ..base.clone()
        },
        PlannerConfig {
            budget: Budget {
                iterations: None,
                time_limit_ms: None,
                max_tree_depth: Some(4),
            },
            ..base.clone()
        },
        PlannerConfig {
            budget: Budget::iterations(0),
            ..base.clone()
        },
        PlannerConfig {
            variant: Variant::OlUct {
                widening: Widening::new(1.0, 1.5),
            },
            ..base.clone()
        },
        PlannerConfig {
            outcome_widening: Some(Widening::new(0.0, 0.5)),
            ..base.clone()
        },
    ];

    for config in cases {
        assert!(
            matches!(config.validate(), Err(ConfigError::Invalid(_))),
            "{config:?} should be rejected"
        );
    }
}
