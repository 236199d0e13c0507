//! Manual maintenance controls

use axum::{Json, extract::State};

use crate::actors::messages::MaintenanceStatus;
use crate::analytics::{AggregationReport, CleanupReport};
use crate::api::{error::ApiResult, state::ApiState, types::AggregateRequest};

/// POST /api/v1/admin/aggregate
pub async fn aggregate(
    State(state): State<ApiState>,
    Json(request): Json<AggregateRequest>,
) -> ApiResult<Json<AggregationReport>> {
    Ok(Json(state.maintenance.aggregate_date(request.date).await?))
}

/// POST /api/v1/admin/cleanup
pub async fn cleanup(State(state): State<ApiState>) -> ApiResult<Json<CleanupReport>> {
    Ok(Json(state.maintenance.run_cleanup_now().await?))
}

/// GET /api/v1/admin/maintenance
pub async fn maintenance_status(
    State(state): State<ApiState>,
) -> ApiResult<Json<MaintenanceStatus>> {
    Ok(Json(state.maintenance.status().await?))
}
