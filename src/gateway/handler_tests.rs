use axum::{Router, body::Body, http::Request, http::StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use crate::cache::{CacheConfig, ResponseCache};
use crate::gateway::{
    AppState, STACKSAFE_REQUEST_ID_HEADER, STACKSAFE_STATUS_HEADER, STACKSAFE_TIER_HEADER,
    create_router_with_state,
};
use crate::interactions::{EngineConfig, InteractionEngine};
use crate::router::{AnalysisPayload, MockAnalyzer, TierRouter};
use crate::rules::{RuleEvaluator, RuleRepository};

fn test_app(analyzer: MockAnalyzer) -> Router {
    let evaluator = RuleEvaluator::new(Arc::new(RuleRepository::builtin()));
    let router = TierRouter::new(
        evaluator.clone(),
        ResponseCache::new(CacheConfig::default()),
        Arc::new(analyzer),
    );
    let engine = InteractionEngine::with_default_checkers(evaluator, EngineConfig::default());
    create_router_with_state(AppState::new(Arc::new(router), Arc::new(engine)))
}

fn default_app() -> Router {
    test_app(MockAnalyzer::returning(AnalysisPayload {
        summary: "Looks fine".to_string(),
        recommendations: vec!["Take with water".to_string()],
        confidence: Some(0.9),
        ..AnalysisPayload::default()
    }))
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> axum::response::Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    router.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("Response body should be valid JSON")
}

#[tokio::test]
async fn test_healthz() {
    let response = send(&default_app(), "GET", "/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[STACKSAFE_STATUS_HEADER], "healthy");
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_analyze_rule_tier_sets_tier_header() {
    let app = default_app();
    let body = serde_json::json!({
        "product": {"name": "Vitamin K"},
        "stack": [{"name": "Warfarin", "kind": "medication"}],
        "options": {"priority": "speed"}
    });

    let response = send(&app, "POST", "/v1/analyze", Some(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[STACKSAFE_TIER_HEADER], "RULE_BASED");
    assert_eq!(response.headers()[STACKSAFE_STATUS_HEADER], "ok");

    let json = json_body(response).await;
    assert_eq!(json["tier"], "RULE_BASED");
    assert_eq!(json["result"]["overall_risk_level"], "CRITICAL");
}

#[tokio::test]
async fn test_analyze_live_then_cached() {
    let app = default_app();
    let body = serde_json::json!({
        "product": {"name": "Vitamin C"},
        "stack": [{"name": "Magnesium"}]
    });

    let first = send(&app, "POST", "/v1/analyze", Some(body.clone())).await;
    assert_eq!(first.headers()[STACKSAFE_TIER_HEADER], "LIVE_AI");
    let first_id = first.headers()[STACKSAFE_REQUEST_ID_HEADER].clone();
    assert_eq!(first_id.len(), 36);

    let second = send(&app, "POST", "/v1/analyze", Some(body)).await;
    assert_eq!(second.headers()[STACKSAFE_TIER_HEADER], "CACHED");
    assert_ne!(second.headers()[STACKSAFE_REQUEST_ID_HEADER], first_id);
    assert_eq!(json_body(second).await["source"], "response_cache");
}

#[tokio::test(start_paused = true)]
async fn test_analyze_fallback_is_marked_degraded() {
    let app = test_app(MockAnalyzer::failing());
    let body = serde_json::json!({"product": {"name": "Vitamin C"}});

    let response = send(&app, "POST", "/v1/analyze", Some(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[STACKSAFE_TIER_HEADER], "RULE_BASED");
    assert_eq!(response.headers()[STACKSAFE_STATUS_HEADER], "degraded");
    assert_eq!(json_body(response).await["fallback_mode"], true);
}

#[tokio::test]
async fn test_analyze_rejects_bad_schema() {
    let response = send(
        &default_app(),
        "POST",
        "/v1/analyze",
        Some(serde_json::json!({"stack": []})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[STACKSAFE_STATUS_HEADER], "invalid_request");
    let json = json_body(response).await;
    assert_eq!(json["code"], 400);
    assert!(json["error"].as_str().unwrap().contains("Invalid request schema"));
}

#[tokio::test]
async fn test_analyze_rejects_blank_product_name() {
    let response = send(
        &default_app(),
        "POST",
        "/v1/analyze",
        Some(serde_json::json!({"product": {"name": " "}})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analyze_rejects_negative_dose() {
    let body = serde_json::json!({
        "product": {
            "name": "Vitamin K",
            "ingredients": [{"name": "Vitamin K", "amount": -5.0, "unit": "mcg"}]
        },
        "stack": [{"name": "Warfarin", "kind": "medication"}]
    });

    let response = send(&default_app(), "POST", "/v1/analyze", Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[STACKSAFE_STATUS_HEADER], "invalid_request");
    assert_eq!(json_body(response).await["code"], 400);
}

#[tokio::test]
async fn test_check_interactions_endpoint() {
    let app = default_app();
    let body = serde_json::json!({
        "substances": [
            {"name": "Iron", "source": "stack"},
            {"name": "Calcium", "source": "new_product"}
        ]
    });

    let response = send(&app, "POST", "/v1/interactions/check", Some(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["summary"]["total"], 1);
    assert_eq!(json["summary"]["overall_risk"], "MODERATE");
    assert_eq!(json["from_cache"], false);
}

#[tokio::test]
async fn test_check_interactions_needs_two_substances() {
    let body = serde_json::json!({"substances": [{"name": "Iron", "source": "stack"}]});
    let response = send(&default_app(), "POST", "/v1/interactions/check", Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_and_reset() {
    let app = default_app();
    send(
        &app,
        "POST",
        "/v1/analyze",
        Some(serde_json::json!({"product": {"name": "Vitamin C"}})),
    )
    .await;

    let stats = json_body(send(&app, "GET", "/v1/stats", None).await).await;
    assert_eq!(stats["router"]["total_requests"], 1);
    assert_eq!(stats["router"]["tier_usage"]["live_ai"], 1);
    assert_eq!(stats["engine"]["total_checks"], 0);

    let reset = send(&app, "POST", "/v1/stats/reset", None).await;
    assert_eq!(reset.status(), StatusCode::NO_CONTENT);

    let stats = json_body(send(&app, "GET", "/v1/stats", None).await).await;
    assert_eq!(stats["router"]["total_requests"], 0);
    assert_eq!(stats["router"]["cache"]["entry_count"], 1);
}

#[tokio::test]
async fn test_invalidate_and_clear() {
    let app = default_app();
    for name in ["Vitamin C", "Zinc"] {
        send(
            &app,
            "POST",
            "/v1/analyze",
            Some(serde_json::json!({"product": {"name": name}})),
        )
        .await;
    }

    let invalidated = send(
        &app,
        "POST",
        "/v1/cache/invalidate",
        Some(serde_json::json!({"tags": ["product:zinc"]})),
    )
    .await;
    assert_eq!(json_body(invalidated).await["count"], 1);

    let empty = send(
        &app,
        "POST",
        "/v1/cache/invalidate",
        Some(serde_json::json!({"tags": ["  "]})),
    )
    .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let cleared = send(&app, "DELETE", "/v1/cache?pattern=analysis", None).await;
    assert_eq!(json_body(cleared).await["count"], 1);

    let cleared = send(&app, "DELETE", "/v1/cache", None).await;
    assert_eq!(json_body(cleared).await["count"], 0);
}
