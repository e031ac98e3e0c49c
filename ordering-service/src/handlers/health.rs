use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::get_metrics;
use crate::startup::AppState;

/// Liveness probe; reports the storage backend's health.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": state.config.service_name,
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": state.config.service_name,
                    "error": "store unavailable"
                })),
            )
        }
    }
}

pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Prometheus scrape endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
