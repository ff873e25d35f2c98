use super::*;
use crate::cache::{CacheConfig, ResponseCache};
use crate::constants::{
    CACHE_SOURCE_LABEL, ESTIMATED_ANALYSIS_COST_USD, LIVE_SOURCE_LABEL, RULE_SOURCE_LABEL,
};
use crate::domain::{
    HealthProfile, Ingredient, Interaction, InteractionType, Product, RiskLevel, Severity,
    StackItem,
};
use crate::rules::{RuleEvaluator, RuleRepository};

use std::sync::Arc;
use std::time::Duration;

fn evaluator() -> RuleEvaluator {
    RuleEvaluator::new(Arc::new(RuleRepository::builtin()))
}

fn router_with(analyzer: Arc<MockAnalyzer>) -> TierRouter {
    TierRouter::new(
        evaluator(),
        ResponseCache::new(CacheConfig::default()),
        analyzer,
    )
}

fn live_payload() -> AnalysisPayload {
    AnalysisPayload {
        summary: "No clinically relevant interactions between these products".to_string(),
        overall_risk_level: RiskLevel::Low,
        interactions: vec![],
        nutrient_warnings: vec![],
        recommendations: vec!["Take with food".to_string()],
        category_scores: [("absorption".to_string(), 0.1)].into_iter().collect(),
        confidence: Some(0.9),
    }
}

fn quiet_product() -> Product {
    Product::new("Vitamin C")
}

fn quiet_stack() -> Vec<StackItem> {
    vec![StackItem::supplement("Magnesium")]
}

fn iron_calcium() -> (Product, Vec<StackItem>) {
    (Product::new("Iron"), vec![StackItem::supplement("Calcium")])
}

#[tokio::test]
async fn test_empty_product_name_is_rejected() {
    let router = router_with(Arc::new(MockAnalyzer::returning(live_payload())));
    let err = router
        .analyze_product(&Product::new("  "), &[], None, &AnalyzeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_negative_dose_is_rejected_before_any_tier() {
    let analyzer = Arc::new(MockAnalyzer::returning(live_payload()));
    let router = router_with(analyzer.clone())
        .with_network(Arc::new(StaticNetworkStatus::new(true)));
    let product = Product::new("Vitamin K")
        .with_ingredient(Ingredient::with_amount("Vitamin K", -5.0, "mcg"));
    let stack = vec![StackItem::medication("Warfarin")];

    let err = router
        .analyze_product(&product, &stack, None, &AnalyzeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RouterError::InvalidInput { ref reason } if reason.contains("-5")));
    assert_eq!(analyzer.call_count(), 0);
    assert_eq!(router.stats().total_requests, 0);
}

#[tokio::test]
async fn test_non_finite_stack_dose_is_rejected() {
    let router = router_with(Arc::new(MockAnalyzer::returning(live_payload())));
    let stack = vec![
        StackItem::supplement("Calcium").with_ingredient(Ingredient::with_amount("Calcium", f64::NAN, "mg")),
    ];

    let err = router
        .analyze_product(&quiet_product(), &stack, None, &AnalyzeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_speed_priority_returns_rule_findings() {
    let analyzer = Arc::new(MockAnalyzer::returning(live_payload()));
    let router = router_with(analyzer.clone());
    let (product, stack) = iron_calcium();

    let result = router
        .analyze_product(
            &product,
            &stack,
            None,
            &AnalyzeOptions::default().priority(AnalysisPriority::Speed),
        )
        .await
        .expect("routed");

    assert_eq!(result.tier, Tier::RuleBased);
    assert_eq!(result.source, RULE_SOURCE_LABEL);
    assert_eq!(result.result.overall_risk_level, RiskLevel::Moderate);
    assert_eq!(result.cost_savings, ESTIMATED_ANALYSIS_COST_USD);
    assert!(!result.is_degraded());
    assert_eq!(analyzer.call_count(), 0);
}

#[tokio::test]
async fn test_offline_with_findings_short_circuits() {
    let analyzer = Arc::new(MockAnalyzer::returning(live_payload()));
    let router = router_with(analyzer.clone())
        .with_network(Arc::new(StaticNetworkStatus::new(true)));
    let (product, stack) = iron_calcium();

    let result = router
        .analyze_product(&product, &stack, None, &AnalyzeOptions::default())
        .await
        .expect("routed");

    assert_eq!(result.tier, Tier::RuleBased);
    assert!(result.offline_mode);
    assert_eq!(analyzer.call_count(), 0);
}

#[tokio::test]
async fn test_offline_without_cache_never_calls_analyzer() {
    let analyzer = Arc::new(MockAnalyzer::returning(live_payload()));
    let router = router_with(analyzer.clone())
        .with_network(Arc::new(StaticNetworkStatus::new(true)));

    let result = router
        .analyze_product(&quiet_product(), &quiet_stack(), None, &AnalyzeOptions::default())
        .await
        .expect("routed");

    assert_eq!(result.tier, Tier::RuleBased);
    assert!(result.offline_mode);
    assert!(!result.fallback_mode);
    assert_eq!(result.result.overall_risk_level, RiskLevel::None);
    assert_eq!(analyzer.call_count(), 0);
    assert_eq!(router.stats().offline_responses, 1);
}

#[tokio::test]
async fn test_live_result_is_cached_for_next_request() {
    let analyzer = Arc::new(MockAnalyzer::returning(live_payload()));
    let router = router_with(analyzer.clone());
    let options = AnalyzeOptions::default();

    let first = router
        .analyze_product(&quiet_product(), &quiet_stack(), None, &options)
        .await
        .expect("first");
    assert_eq!(first.tier, Tier::LiveAi);
    assert_eq!(first.source, LIVE_SOURCE_LABEL);
    assert_eq!(first.cost_savings, 0.0);
    assert_eq!(first.confidence, 0.9);

    let second = router
        .analyze_product(&Product::new("vitamin  c"), &quiet_stack(), None, &options)
        .await
        .expect("second");
    assert_eq!(second.tier, Tier::Cached);
    assert_eq!(second.source, CACHE_SOURCE_LABEL);
    assert_eq!(second.cost_savings, ESTIMATED_ANALYSIS_COST_USD);
    assert_eq!(second.result.summary, first.result.summary);
    assert_eq!(analyzer.call_count(), 1);

    let stats = router.stats();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.tier_usage.live_ai, 1);
    assert_eq!(stats.tier_usage.cached, 1);
    assert_eq!(stats.analysis_calls, 1);
    assert!((stats.total_cost_savings - ESTIMATED_ANALYSIS_COST_USD).abs() < 1e-12);
    assert_eq!(stats.cache.hits, 1);
}

#[tokio::test]
async fn test_force_refresh_bypasses_cache() {
    let analyzer = Arc::new(MockAnalyzer::returning(live_payload()));
    let router = router_with(analyzer.clone());

    for options in [
        AnalyzeOptions::default(),
        AnalyzeOptions::default().force_refresh(),
    ] {
        let result = router
            .analyze_product(&quiet_product(), &quiet_stack(), None, &options)
            .await
            .expect("routed");
        assert_eq!(result.tier, Tier::LiveAi);
    }
    assert_eq!(analyzer.call_count(), 2);
}

#[tokio::test]
async fn test_profile_changes_cache_key() {
    let analyzer = Arc::new(MockAnalyzer::returning(live_payload()));
    let router = router_with(analyzer.clone());
    let elderly = HealthProfile::default().with_age(72);

    router
        .analyze_product(&quiet_product(), &quiet_stack(), None, &AnalyzeOptions::default())
        .await
        .expect("anonymous");
    let result = router
        .analyze_product(
            &quiet_product(),
            &quiet_stack(),
            Some(&elderly),
            &AnalyzeOptions::default(),
        )
        .await
        .expect("profiled");

    assert_eq!(result.tier, Tier::LiveAi);
    assert_eq!(analyzer.call_count(), 2);
}

#[tokio::test]
async fn test_live_merge_puts_rules_first_and_takes_max_risk() {
    let duplicate = Interaction::new(
        "calcium",
        "iron",
        InteractionType::NutrientNutrient,
        Severity::Low,
        "model wording",
    )
    .with_source(LIVE_SOURCE_LABEL);
    let extra = Interaction::new(
        "iron",
        "coffee",
        InteractionType::SupplementSupplement,
        Severity::Low,
        "Tannins reduce iron absorption",
    )
    .with_source(LIVE_SOURCE_LABEL);
    let payload = AnalysisPayload {
        overall_risk_level: RiskLevel::Low,
        interactions: vec![duplicate, extra],
        ..live_payload()
    };
    let router = router_with(Arc::new(MockAnalyzer::returning(payload)));
    let (product, stack) = iron_calcium();

    let result = router
        .analyze_product(&product, &stack, None, &AnalyzeOptions::default())
        .await
        .expect("routed");

    assert_eq!(result.tier, Tier::LiveAi);
    let merged = &result.result;
    assert_eq!(merged.overall_risk_level, RiskLevel::Moderate);
    assert_eq!(merged.interactions.len(), 2);
    assert_eq!(merged.interactions[0].source, RULE_SOURCE_LABEL);
    assert_eq!(merged.interactions[0].severity, Severity::Moderate);
    assert_eq!(merged.interactions[1].mechanism, "Tannins reduce iron absorption");
    assert_eq!(
        merged.recommendations[0],
        "Separate iron and calcium doses by at least 2 hours"
    );
    assert!(merged.recommendations.contains(&"Take with food".to_string()));
}

#[tokio::test]
async fn test_cache_hit_merges_current_rule_findings() {
    let analyzer = Arc::new(MockAnalyzer::returning(live_payload()));
    let router = router_with(analyzer.clone());
    let (product, stack) = iron_calcium();

    router
        .analyze_product(&product, &stack, None, &AnalyzeOptions::default())
        .await
        .expect("live");
    let cached = router
        .analyze_product(&product, &stack, None, &AnalyzeOptions::default())
        .await
        .expect("cached");

    assert_eq!(cached.tier, Tier::Cached);
    let rule_entries = cached
        .result
        .interactions
        .iter()
        .filter(|i| i.source == RULE_SOURCE_LABEL)
        .count();
    assert_eq!(rule_entries, 1);
    assert_eq!(cached.result.overall_risk_level, RiskLevel::Moderate);
}

#[tokio::test]
async fn test_stored_payload_is_tagged_and_invalidatable() {
    let router = router_with(Arc::new(MockAnalyzer::returning(live_payload())));
    let key = analysis_key(&quiet_product(), &quiet_stack(), None);

    router
        .analyze_product(
            &quiet_product(),
            &quiet_stack(),
            None,
            &AnalyzeOptions::default().user_id("u-1"),
        )
        .await
        .expect("live");

    let meta = router.cache().entry_meta(&key).expect("stored");
    assert!(meta.tags.contains("product:vitamin c"));
    assert!(meta.tags.contains("user:u-1"));
    assert!(meta.tags.contains("risk:low"));
    assert!((meta.quality - 0.78).abs() < 1e-9);

    assert_eq!(router.invalidate_by_tags(&["user:u-1"]), 1);
    assert!(router.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failure_falls_back_after_retries() {
    let analyzer = Arc::new(MockAnalyzer::failing());
    let router = router_with(analyzer.clone());

    let result = router
        .analyze_product(&quiet_product(), &quiet_stack(), None, &AnalyzeOptions::default())
        .await
        .expect("fallback is not an error");

    assert_eq!(result.tier, Tier::RuleBased);
    assert!(result.fallback_mode);
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|e| e.contains("mock provider down"))
    );
    assert_eq!(analyzer.call_count(), 3);

    let stats = router.stats();
    assert_eq!(stats.fallbacks, 1);
    assert_eq!(stats.analysis_calls, 3);
    assert_eq!(stats.analysis_failures, 3);
    assert_eq!(stats.tier_usage.rule_based, 1);
    assert!(router.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried() {
    let analyzer = Arc::new(
        MockAnalyzer::returning(live_payload()).then(Err(AnalyzerError::Unavailable {
            reason: "503".to_string(),
        })),
    );
    let router = router_with(analyzer.clone());

    let result = router
        .analyze_product(&quiet_product(), &quiet_stack(), None, &AnalyzeOptions::default())
        .await
        .expect("routed");

    assert_eq!(result.tier, Tier::LiveAi);
    assert_eq!(analyzer.call_count(), 2);
    assert_eq!(router.stats().analysis_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_parse_failure_is_not_retried() {
    let analyzer = Arc::new(MockAnalyzer::failing().then(Err(AnalyzerError::Parse {
        reason: "not json".to_string(),
    })));
    let router = router_with(analyzer.clone());

    let result = router
        .analyze_product(&quiet_product(), &quiet_stack(), None, &AnalyzeOptions::default())
        .await
        .expect("routed");

    assert!(result.fallback_mode);
    assert_eq!(analyzer.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout_is_a_failure() {
    let analyzer =
        Arc::new(MockAnalyzer::returning(live_payload()).with_delay(Duration::from_secs(10)));
    let router = router_with(analyzer.clone()).with_config(
        RouterConfig::default()
            .analysis_timeout(Duration::from_secs(1))
            .retries(1),
    );

    let result = router
        .analyze_product(&quiet_product(), &quiet_stack(), None, &AnalyzeOptions::default())
        .await
        .expect("routed");

    assert!(result.fallback_mode);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("timed out")));
    assert_eq!(analyzer.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_latency_budget_bounds_retries() {
    let analyzer = Arc::new(MockAnalyzer::failing());
    let router = router_with(analyzer.clone());

    let result = router
        .analyze_product(
            &quiet_product(),
            &quiet_stack(),
            None,
            &AnalyzeOptions::default().latency_budget(Duration::from_millis(200)),
        )
        .await
        .expect("routed");

    assert!(result.fallback_mode);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("200ms")));
    // First attempt fails immediately; the 500ms backoff outlasts the budget.
    assert_eq!(analyzer.call_count(), 1);
}

#[tokio::test]
async fn test_cost_events_are_recorded_per_request() {
    let tracker = Arc::new(RecordingCostTracker::default());
    let router = router_with(Arc::new(MockAnalyzer::returning(live_payload())))
        .with_cost_tracker(tracker.clone());
    let (product, stack) = iron_calcium();

    router
        .analyze_product(
            &product,
            &stack,
            None,
            &AnalyzeOptions::default().priority(AnalysisPriority::Speed),
        )
        .await
        .expect("rules");
    router
        .analyze_product(&quiet_product(), &quiet_stack(), None, &AnalyzeOptions::default())
        .await
        .expect("live");

    assert_eq!(
        tracker.events(),
        vec![
            (Tier::RuleBased, ESTIMATED_ANALYSIS_COST_USD),
            (Tier::LiveAi, 0.0)
        ]
    );
}

#[tokio::test]
async fn test_reset_stats_keeps_cache() {
    let router = router_with(Arc::new(MockAnalyzer::returning(live_payload())));
    router
        .analyze_product(&quiet_product(), &quiet_stack(), None, &AnalyzeOptions::default())
        .await
        .expect("live");

    router.reset_stats();
    let stats = router.stats();
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.average_response_ms, 0.0);
    assert_eq!(stats.cache.entry_count, 1);
}

#[test]
fn test_backoff_doubles_and_caps() {
    let config = RouterConfig::default();
    assert_eq!(config.backoff(1), Duration::from_millis(500));
    assert_eq!(config.backoff(2), Duration::from_secs(1));
    assert_eq!(config.backoff(4), Duration::from_secs(4));
    assert_eq!(config.backoff(5), Duration::from_secs(5));
    assert_eq!(config.backoff(40), Duration::from_secs(5));
}

#[test]
fn test_analysis_key_ignores_order_and_case() {
    let a = vec![StackItem::supplement("Zinc"), StackItem::medication("Warfarin")];
    let b = vec![StackItem::medication("warfarin"), StackItem::supplement("ZINC")];
    let product = Product::new("Fish Oil");
    let key = analysis_key(&product, &a, None);

    assert!(key.starts_with(ANALYSIS_KEY_PREFIX));
    assert_eq!(key, analysis_key(&Product::new("fish  oil"), &b, None));
    assert_ne!(
        key,
        analysis_key(&product, &a, Some(&HealthProfile::default().with_age(30)))
    );
    assert_ne!(
        key,
        analysis_key(&product, &[StackItem::supplement("Zinc 50mg")], None)
    );
}

#[test]
fn test_payload_quality_heuristic() {
    assert!((payload_quality(&AnalysisPayload::default()) - 0.1).abs() < 1e-9);
    assert!((payload_quality(&live_payload()) - 0.78).abs() < 1e-9);

    let vague = AnalysisPayload {
        summary: "Looks fine".to_string(),
        interactions: vec![Interaction::new(
            "a",
            "b",
            InteractionType::SupplementSupplement,
            Severity::Low,
            "",
        )],
        confidence: Some(0.0),
        ..AnalysisPayload::default()
    };
    assert_eq!(payload_quality(&vague), 0.0);
}

#[test]
fn test_payload_quality_rewards_rule_matches() {
    let (product, stack) = iron_calcium();
    let rules = evaluator().check_interactions(&product, &stack, &[]);
    let narrative = AnalysisPayload {
        summary: "Calcium and iron compete for the same intestinal transporters".to_string(),
        confidence: Some(0.8),
        ..AnalysisPayload::default()
    };

    let without_rules = payload_quality(&narrative);
    let with_rules = payload_quality(&merge(&rules, narrative));

    assert!((without_rules - 0.46).abs() < 1e-9);
    assert!((with_rules - (without_rules + 0.3)).abs() < 1e-9);
}

#[test]
fn test_merge_replaces_stale_rule_entries_and_warnings() {
    let evaluator = evaluator();
    let (product, stack) = iron_calcium();
    let rules = evaluator.check_interactions(&product, &stack, &[]);

    let once = merge(&rules, live_payload());
    let twice = merge(&rules, once.clone());
    assert_eq!(once.interactions, twice.interactions);
    assert_eq!(once.recommendations, twice.recommendations);
}
