use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::{error::ApiResult, state::ApiState, types::StatusResponse};

/// GET /api/v1/status
pub async fn current_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse::from_entries(state.status.snapshot().await))
}

/// GET /api/v1/stats
pub async fn store_stats(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let stats = state.store.get_stats().await?;

    Ok(Json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "storage": stats,
    })))
}
