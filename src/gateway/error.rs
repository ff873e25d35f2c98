use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::STACKSAFE_STATUS_HEADER;
use crate::interactions::EngineError;
use crate::router::RouterError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, status_label) = match &self {
            GatewayError::InvalidRequest(_)
            | GatewayError::Router(RouterError::InvalidInput { .. })
            | GatewayError::Engine(EngineError::InvalidInput { .. }) => {
                (StatusCode::BAD_REQUEST, "invalid_request")
            }
            GatewayError::Router(RouterError::Timeout { .. }) => {
                (StatusCode::GATEWAY_TIMEOUT, "analysis_timeout")
            }
            GatewayError::Router(RouterError::Analyzer(_)) => {
                (StatusCode::BAD_GATEWAY, "analysis_error")
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            STACKSAFE_STATUS_HEADER,
            HeaderValue::from_static(status_label),
        );

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, headers, body).into_response()
    }
}
