use crate::routes::types::HealthCheckResponse;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

use super::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        service: state.service_name.clone(),
        environment: state.app_env,
        uptime_seconds: (now - state.started_at).num_seconds(),
        timestamp: now,
    })
}
