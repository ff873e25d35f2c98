use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::error::GatewayError;
use super::state::AppState;
use super::{STACKSAFE_REQUEST_ID_HEADER, STACKSAFE_STATUS_HEADER, STACKSAFE_TIER_HEADER};
use crate::domain::{HealthProfile, Product, StackItem, SubstanceContext, UserContext};
use crate::interactions::{CheckConfig, EngineMetrics};
use crate::router::{AnalyzeOptions, RouterStats};

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub product: Product,
    #[serde(default)]
    pub stack: Vec<StackItem>,
    #[serde(default)]
    pub health_profile: Option<HealthProfile>,
    #[serde(default)]
    pub options: AnalyzeOptions,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub substances: Vec<SubstanceContext>,
    #[serde(default)]
    pub user_context: Option<UserContext>,
    #[serde(default)]
    pub config: CheckConfig,
}

#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClearQuery {
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub router: RouterStats,
    pub engine: EngineMetrics,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

fn parse_body<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T, GatewayError> {
    serde_json::from_value(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request schema: {}", e)))
}

#[instrument(skip(state, body))]
pub async fn analyze_handler(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, GatewayError> {
    let request: AnalyzeRequest = parse_body(body)?;

    let result = state
        .router
        .analyze_product(
            &request.product,
            &request.stack,
            request.health_profile.as_ref(),
            &request.options,
        )
        .await?;

    debug!(tier = %result.tier, ms = result.response_time_ms, "Analysis routed");

    let mut headers = HeaderMap::new();
    headers.insert(
        STACKSAFE_TIER_HEADER,
        HeaderValue::from_static(result.tier.as_header_value()),
    );
    let status = if result.is_degraded() { "degraded" } else { "ok" };
    headers.insert(STACKSAFE_STATUS_HEADER, HeaderValue::from_static(status));
    if let Ok(id) = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()) {
        headers.insert(STACKSAFE_REQUEST_ID_HEADER, id);
    }

    Ok((StatusCode::OK, headers, Json(result)).into_response())
}

#[instrument(skip(state, body))]
pub async fn check_interactions_handler(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, GatewayError> {
    let request: CheckRequest = parse_body(body)?;

    let result = state
        .engine
        .check_interactions(
            &request.substances,
            request.user_context.as_ref(),
            &request.config,
        )
        .await?;

    Ok((StatusCode::OK, Json(result)).into_response())
}

#[instrument(skip(state))]
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        router: state.router.stats(),
        engine: state.engine.metrics(),
    })
}

#[instrument(skip(state))]
pub async fn reset_stats_handler(State(state): State<AppState>) -> StatusCode {
    state.router.reset_stats();
    state.engine.reset_metrics();
    info!("Router and engine counters reset");
    StatusCode::NO_CONTENT
}

#[instrument(skip(state, body))]
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<CountResponse>, GatewayError> {
    let request: InvalidateRequest = parse_body(body)?;
    let tags: Vec<&str> = request
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "at least one tag is required".to_string(),
        ));
    }

    let count = state.router.invalidate_by_tags(tags.as_slice());
    info!(tags = ?tags, count, "Cache entries invalidated by tag");
    Ok(Json(CountResponse { count }))
}

#[instrument(skip(state))]
pub async fn clear_cache_handler(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
) -> Json<CountResponse> {
    let pattern = query.pattern.as_deref().filter(|p| !p.is_empty());
    let count = state.router.clear(pattern);
    if pattern.is_none() {
        state.engine.clear_cache();
    }
    info!(pattern = ?pattern, count, "Cache cleared");
    Json(CountResponse { count })
}
