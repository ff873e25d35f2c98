//! HTTP gateway (Axum) over the tier router and the interaction engine.
//!
//! This module is primarily used by the `stacksafe` server binary.

pub mod error;
pub mod handler;
pub mod state;

#[cfg(test)]
mod handler_tests;

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::GatewayError;
pub use handler::{
    analyze_handler, check_interactions_handler, clear_cache_handler, invalidate_handler,
    reset_stats_handler, stats_handler,
};
pub use state::AppState;

pub const STACKSAFE_STATUS_HEADER: &str = "X-Stacksafe-Status";
/// Carries the tier label (`RULE_BASED`, `CACHED`, `LIVE_AI`) on analysis responses.
pub const STACKSAFE_TIER_HEADER: &str = "X-Stacksafe-Tier";
pub const STACKSAFE_STATUS_HEALTHY: &str = "healthy";
pub const STACKSAFE_REQUEST_ID_HEADER: &str = "X-Stacksafe-Request-Id";

pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/v1/analyze", post(analyze_handler))
        .route("/v1/interactions/check", post(check_interactions_handler))
        .route("/v1/stats", get(stats_handler))
        .route("/v1/stats/reset", post(reset_stats_handler))
        .route("/v1/cache/invalidate", post(invalidate_handler))
        .route("/v1/cache", axum::routing::delete(clear_cache_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        STACKSAFE_STATUS_HEADER,
        HeaderValue::from_static(STACKSAFE_STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}
