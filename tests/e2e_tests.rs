//! End-to-end routing scenarios.

mod common;

use std::sync::Arc;

use stacksafe::constants::RULE_SOURCE_LABEL;
use stacksafe::domain::{Product, RiskLevel, Severity, StackItem};
use stacksafe::router::{AnalysisPriority, AnalyzeOptions, MockAnalyzer, Tier};

use common::fixtures::{
    calcium_stack, evaluator, iron_product, live_payload, offline_router, quiet_product, router,
    vitamin_d_product,
};
use common::harness::spawn_test_server;

#[tokio::test(start_paused = true)]
async fn test_iron_calcium_survives_unreachable_analyzer() {
    let analyzer = Arc::new(MockAnalyzer::failing());
    let router = router(analyzer.clone());

    let result = router
        .analyze_product(&iron_product(), &calcium_stack(), None, &AnalyzeOptions::default())
        .await
        .expect("routing never fails on analyzer errors");

    assert_eq!(result.tier, Tier::RuleBased);
    assert!(result.fallback_mode);
    assert!(result.result.overall_risk_level >= RiskLevel::Moderate);

    let iron_calcium = result
        .result
        .interactions
        .iter()
        .find(|i| i.pair.contains("calcium") && i.pair.contains("iron"))
        .expect("iron/calcium interaction");
    assert_eq!(iron_calcium.severity, Severity::Moderate);
    assert_eq!(iron_calcium.source, RULE_SOURCE_LABEL);
    assert!(
        iron_calcium
            .mechanism
            .to_lowercase()
            .contains("absorption competition")
    );
    assert!(
        iron_calcium
            .recommendations
            .iter()
            .any(|r| r.contains("at least 2 hours"))
    );
    assert_eq!(analyzer.call_count(), 3);
}

#[tokio::test]
async fn test_vitamin_k_with_warfarin_is_critical() {
    let router = router(Arc::new(MockAnalyzer::returning(live_payload())));
    let stack = vec![StackItem::medication("Warfarin")];
    let product = Product::new("Vitamin K");

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
    assert_eq!(result.result.overall_risk_level, RiskLevel::Critical);

    let rules = evaluator().check_interactions(&product, &stack, &[]);
    let hit = &rules.interactions[0];
    assert_eq!(hit.severity, Severity::Critical);
    assert!(!hit.contraindicated);
    assert!(hit.monitoring_required);
    assert!(!hit.recommendation.is_empty());
}

#[tokio::test]
async fn test_vitamin_d_over_limit_offline() {
    let analyzer = Arc::new(MockAnalyzer::returning(live_payload()));
    let router = offline_router(analyzer.clone());

    let result = router
        .analyze_product(&vitamin_d_product(150.0), &[], None, &AnalyzeOptions::default())
        .await
        .expect("routed");

    assert_eq!(result.tier, Tier::RuleBased);
    assert!(result.offline_mode);
    let warnings = &result.result.nutrient_warnings;
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].percent_of_limit, 150.0);
    assert_eq!(analyzer.call_count(), 0);
}

#[tokio::test]
async fn test_http_analyze_round_trip() {
    let server = spawn_test_server(router(Arc::new(MockAnalyzer::returning(live_payload()))))
        .await
        .expect("Server should start");
    let client = reqwest::Client::new();
    let body = serde_json::json!({ "product": quiet_product() });

    let first = client
        .post(format!("{}/v1/analyze", server.url()))
        .json(&body)
        .send()
        .await
        .expect("request succeeds");
    assert!(first.status().is_success());
    assert_eq!(
        first.headers().get("x-stacksafe-tier").and_then(|v| v.to_str().ok()),
        Some("LIVE_AI")
    );

    let second = client
        .post(format!("{}/v1/analyze", server.url()))
        .json(&body)
        .send()
        .await
        .expect("request succeeds");
    assert_eq!(
        second.headers().get("x-stacksafe-tier").and_then(|v| v.to_str().ok()),
        Some("CACHED")
    );
    let json: serde_json::Value = second.json().await.expect("json body");
    assert_eq!(json["result"]["summary"], live_payload().summary);

    let health = client
        .get(format!("{}/healthz", server.url()))
        .send()
        .await
        .expect("health check");
    assert!(health.status().is_success());
}
