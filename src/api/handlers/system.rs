//! System endpoints: health check and chain configuration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{ChainConfigResponse, HealthResponse};
use crate::app_state::AppState;

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /config/chain` — Configured on-chain identifiers.
#[utoipa::path(
    get,
    path = "/config/chain",
    tag = "System",
    summary = "Chain configuration",
    description = "Returns the marketplace and staking identifiers and the configured pools. Unset identifiers are null.",
    responses(
        (status = 200, description = "Chain configuration", body = ChainConfigResponse),
    )
)]
pub async fn chain_config_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(ChainConfigResponse::from(state.scheduler.engine().chain()))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/chain", get(chain_config_handler))
}
