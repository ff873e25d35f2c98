use super::*;
use crate::domain::{
    Dosage, HealthProfile, Interaction, InteractionType, RiskLevel, Severity, SubstanceContext,
    SubstanceSource,
};
use crate::rules::{RuleEvaluator, RuleRepository};

use futures_util::FutureExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn engine() -> InteractionEngine {
    let evaluator = RuleEvaluator::new(Arc::new(RuleRepository::builtin()));
    InteractionEngine::with_default_checkers(evaluator, EngineConfig::default())
}

fn stack(names: &[&str]) -> Vec<SubstanceContext> {
    names
        .iter()
        .map(|n| SubstanceContext::new(*n, SubstanceSource::Stack))
        .collect()
}

fn fixed_checker(name: &str, priority: i32, found: Vec<Interaction>) -> InteractionChecker {
    InteractionChecker::new(
        name,
        priority,
        |_| true,
        move |_, _| {
            let found = found.clone();
            async move { Ok(found) }.boxed()
        },
    )
}

#[tokio::test]
async fn test_fewer_than_two_substances_is_rejected() {
    let err = engine()
        .check_interactions(&stack(&["Iron"]), None, &CheckConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_rule_checker_finds_iron_calcium() {
    let result = engine()
        .check_interactions(&stack(&["Iron", "Calcium"]), None, &CheckConfig::default())
        .await
        .expect("check succeeds");

    assert_eq!(result.interactions.len(), 1);
    assert_eq!(result.summary.moderate, 1);
    assert_eq!(result.summary.overall_risk, RiskLevel::Moderate);
    assert_eq!(
        result.checkers_run,
        vec![RULE_CHECKER.to_string(), DUPLICATION_CHECKER.to_string()]
    );
}

#[tokio::test]
async fn test_second_identical_request_hits_cache() {
    let engine = engine();
    let config = CheckConfig::default();

    let first = engine
        .check_interactions(&stack(&["Iron", "Calcium"]), None, &config)
        .await
        .expect("first check");
    let second = engine
        .check_interactions(&stack(&["Calcium", "Iron"]), None, &config)
        .await
        .expect("second check");

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.interactions, second.interactions);

    let metrics = engine.metrics();
    assert_eq!(metrics.total_checks, 2);
    assert_eq!(metrics.cache_hits, 1);
    assert_eq!(metrics.cache_misses, 1);
}

#[tokio::test]
async fn test_user_context_changes_cache_key_and_escalates() {
    let engine = engine();
    let substances = stack(&["Iron", "Calcium"]);
    let elderly = HealthProfile::default().with_age(75);

    let plain = engine
        .check_interactions(&substances, None, &CheckConfig::default())
        .await
        .expect("plain check");
    let personal = engine
        .check_interactions(&substances, Some(&elderly), &CheckConfig::default())
        .await
        .expect("personal check");

    assert!(!personal.from_cache);
    assert_eq!(plain.interactions[0].personalized_severity, Severity::Moderate);
    assert_eq!(personal.interactions[0].personalized_severity, Severity::High);
    assert_eq!(personal.summary.overall_risk, RiskLevel::High);
}

#[tokio::test]
async fn test_failing_checker_is_isolated() {
    let engine = engine();
    engine.register_checker(InteractionChecker::new(
        "broken",
        50,
        |_| true,
        |_, _| {
            async {
                Err(CheckerError::Failed {
                    checker: "broken".to_string(),
                    reason: "upstream down".to_string(),
                })
            }
            .boxed()
        },
    ));

    let result = engine
        .check_interactions(&stack(&["Iron", "Calcium"]), None, &CheckConfig::default())
        .await
        .expect("check still succeeds");

    assert_eq!(result.interactions.len(), 1);
    assert_eq!(result.failed_checkers, vec!["broken".to_string()]);
    let metrics = engine.metrics();
    assert_eq!(metrics.checker_invocations, 3);
    assert_eq!(metrics.checker_failures, 1);
    assert!((metrics.error_rate - 1.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_panicking_checker_is_isolated() {
    let engine = engine();
    engine.register_checker(InteractionChecker::new(
        "panics",
        50,
        |_| true,
        |_, _| async { panic!("checker bug") }.boxed(),
    ));

    let result = engine
        .check_interactions(&stack(&["Iron", "Calcium"]), None, &CheckConfig::default())
        .await
        .expect("check still succeeds");
    assert_eq!(result.failed_checkers, vec!["panics".to_string()]);
    assert_eq!(result.interactions.len(), 1);
}

#[tokio::test]
async fn test_dedup_keeps_higher_severity() {
    let registry = CheckerRegistry::new();
    registry.register(fixed_checker(
        "low",
        10,
        vec![
            Interaction::new("a", "b", InteractionType::SupplementSupplement, Severity::Low, "x")
                .with_recommendation("space doses"),
        ],
    ));
    registry.register(fixed_checker(
        "high",
        20,
        vec![
            Interaction::new("B", "A", InteractionType::SupplementSupplement, Severity::High, "y")
                .with_recommendation("avoid"),
        ],
    ));
    let engine = InteractionEngine::new(registry, EngineConfig::default());

    let result = engine
        .check_interactions(&stack(&["a", "b"]), None, &CheckConfig::default())
        .await
        .expect("check succeeds");

    assert_eq!(result.interactions.len(), 1);
    let only = &result.interactions[0].interaction;
    assert_eq!(only.severity, Severity::High);
    assert_eq!(only.recommendations, vec!["avoid", "space doses"]);
}

#[tokio::test]
async fn test_different_types_are_not_merged() {
    let registry = CheckerRegistry::new();
    registry.register(fixed_checker(
        "both",
        10,
        vec![
            Interaction::new("a", "b", InteractionType::SupplementSupplement, Severity::Low, "x"),
            Interaction::new("a", "b", InteractionType::NutrientNutrient, Severity::Low, "y"),
        ],
    ));
    let engine = InteractionEngine::new(registry, EngineConfig::default());
    let result = engine
        .check_interactions(&stack(&["a", "b"]), None, &CheckConfig::default())
        .await
        .expect("check succeeds");
    assert_eq!(result.interactions.len(), 2);
}

#[tokio::test]
async fn test_min_severity_filters_output_not_metrics() {
    let registry = CheckerRegistry::new();
    registry.register(fixed_checker(
        "mixed",
        10,
        vec![
            Interaction::new("a", "b", InteractionType::SupplementSupplement, Severity::Low, "x"),
            Interaction::new("a", "c", InteractionType::SupplementSupplement, Severity::High, "y"),
        ],
    ));
    let engine = InteractionEngine::new(registry, EngineConfig::default());

    let result = engine
        .check_interactions(
            &stack(&["a", "b", "c"]),
            None,
            &CheckConfig::default().min_severity(Severity::Moderate),
        )
        .await
        .expect("check succeeds");

    assert_eq!(result.interactions.len(), 1);
    assert_eq!(result.summary.high, 1);
    assert_eq!(result.summary.low, 0);
    assert_eq!(engine.metrics().interactions_found, 2);
}

#[tokio::test]
async fn test_no_applicable_checkers_returns_empty_result() {
    let registry = CheckerRegistry::new();
    registry.register(InteractionChecker::new(
        "never",
        10,
        |_| false,
        |_, _| async { Ok(Vec::new()) }.boxed(),
    ));
    let engine = InteractionEngine::new(registry, EngineConfig::default());

    let result = engine
        .check_interactions(&stack(&["a", "b"]), None, &CheckConfig::default())
        .await
        .expect("empty result, not an error");
    assert!(result.interactions.is_empty());
    assert_eq!(result.summary.overall_risk, RiskLevel::None);
    assert!(result.checkers_run.is_empty());
}

#[tokio::test]
async fn test_checkers_dispatch_in_priority_order() {
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let registry = CheckerRegistry::new();
    for (name, priority) in [("low", 1), ("high", 99), ("mid", 50)] {
        let order = Arc::clone(&order);
        registry.register(InteractionChecker::new(
            name,
            priority,
            |_| true,
            move |_, _| {
                order.lock().push(name);
                async { Ok(Vec::new()) }.boxed()
            },
        ));
    }
    let engine = InteractionEngine::new(registry, EngineConfig::default());
    engine
        .check_interactions(&stack(&["a", "b"]), None, &CheckConfig::default())
        .await
        .expect("check succeeds");

    assert_eq!(*order.lock(), vec!["high", "mid", "low"]);
}

#[test]
fn test_register_replaces_same_type() {
    let registry = CheckerRegistry::new();
    registry.register(fixed_checker("x", 1, Vec::new()));
    registry.register(fixed_checker("x", 5, Vec::new()));
    assert_eq!(registry.len(), 1);
    assert!(registry.unregister("x"));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_duplication_checker_flags_same_active() {
    let evaluator = RuleEvaluator::new(Arc::new(RuleRepository::builtin()));
    let registry = CheckerRegistry::new();
    registry.register(duplication_checker(evaluator));
    let engine = InteractionEngine::new(registry, EngineConfig::default());

    let substances = vec![
        SubstanceContext::new("Vitamin D3 2000 IU", SubstanceSource::Stack)
            .with_dosage(Dosage::new(2000.0, "iu")),
        SubstanceContext::new("Cholecalciferol", SubstanceSource::NewProduct)
            .with_dosage(Dosage::new(25.0, "mcg")),
    ];
    let result = engine
        .check_interactions(&substances, None, &CheckConfig::default())
        .await
        .expect("check succeeds");

    assert_eq!(result.interactions.len(), 1);
    let hit = &result.interactions[0].interaction;
    assert_eq!(hit.interaction_type, InteractionType::NutrientNutrient);
    assert_eq!(hit.severity, Severity::Moderate);
    assert!(hit.mechanism.contains("vitamin d"));
}

#[tokio::test]
async fn test_checker_counter_tracks_invocations() {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = CheckerRegistry::new();
    let counter = Arc::clone(&calls);
    registry.register(InteractionChecker::new(
        "counting",
        1,
        |_| true,
        move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Vec::new()) }.boxed()
        },
    ));
    let engine = InteractionEngine::new(registry, EngineConfig::default());
    let substances = stack(&["a", "b"]);

    for _ in 0..3 {
        engine
            .check_interactions(&substances, None, &CheckConfig::default())
            .await
            .expect("check succeeds");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.registry().stats()["counting"].invocations, 1);

    engine.clear_cache();
    engine
        .check_interactions(&substances, None, &CheckConfig::default())
        .await
        .expect("check succeeds");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_negative_context_dose_is_rejected() {
    let substances = vec![
        SubstanceContext::new("Zinc", SubstanceSource::Stack).with_dosage(Dosage::new(-10.0, "mg")),
        SubstanceContext::new("Copper", SubstanceSource::Stack),
    ];
    let err = engine()
        .check_interactions(&substances, None, &CheckConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput { ref reason } if reason.contains("Zinc")));
}

#[tokio::test]
async fn test_checker_changes_drop_cached_results() {
    let engine = engine();
    let substances = stack(&["Vitamin C", "Magnesium"]);

    let before = engine
        .check_interactions(&substances, None, &CheckConfig::default())
        .await
        .expect("check succeeds");
    assert!(before.interactions.is_empty());

    engine.register_checker(fixed_checker(
        "extra",
        50,
        vec![Interaction::new(
            "vitamin c",
            "magnesium",
            InteractionType::SupplementSupplement,
            Severity::Low,
            "test finding",
        )],
    ));
    let after = engine
        .check_interactions(&substances, None, &CheckConfig::default())
        .await
        .expect("check succeeds");
    assert_eq!(after.interactions.len(), 1);

    assert!(engine.unregister_checker("extra"));
    assert!(!engine.unregister_checker("extra"));
    let removed = engine
        .check_interactions(&substances, None, &CheckConfig::default())
        .await
        .expect("check succeeds");
    assert!(removed.interactions.is_empty());
}
