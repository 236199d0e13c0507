//! Health check endpoint

use axum::{Json, extract::State};
use chrono::Utc;

use crate::api::{state::ApiState, types::HealthResponse};

/// GET /api/v1/health
///
/// Always answers 200; a failing store is reported as `degraded`.
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let (healthy, message) = match state.store.health_check().await {
        Ok(health) => (health.healthy, health.message),
        Err(e) => (false, e.to_string()),
    };

    let now = Utc::now();
    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        timestamp: now,
        storage_healthy: healthy,
        storage_message: message,
        uptime_seconds: (now - state.started_at).num_seconds(),
    })
}
