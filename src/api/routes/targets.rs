//! Per-target history endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{Duration, Utc};

use crate::analytics::TargetMetrics;
use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{DaysQuery, IncidentsResponse, LatencyResponse, MAX_DAYS, SummariesResponse},
};
use crate::storage::{QueryRange, Target};

async fn known_target(state: &ApiState, name: &str) -> ApiResult<Target> {
    state
        .store
        .get_target(name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("target '{name}' not found")))
}

fn window_days(query: &DaysQuery) -> ApiResult<u32> {
    query
        .resolve()
        .ok_or_else(|| ApiError::InvalidRequest(format!("days must be between 1 and {MAX_DAYS}")))
}

/// GET /api/v1/targets
pub async fn list_targets(State(state): State<ApiState>) -> ApiResult<Json<Vec<Target>>> {
    Ok(Json(state.store.list_targets().await?))
}

/// GET /api/v1/targets/:name/incidents
pub async fn get_incidents(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Json<IncidentsResponse>> {
    let days = window_days(&query)?;
    known_target(&state, &name).await?;

    let end = Utc::now();
    let start = end - Duration::days(i64::from(days));
    let incidents = state
        .store
        .query_incidents(QueryRange::new(&name, start, end))
        .await?;

    Ok(Json(IncidentsResponse {
        target: name,
        days,
        count: incidents.len(),
        incidents,
    }))
}

/// GET /api/v1/targets/:name/metrics
pub async fn get_metrics(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Json<TargetMetrics>> {
    let days = window_days(&query)?;
    known_target(&state, &name).await?;

    Ok(Json(state.analytics.target_metrics(&name, days).await?))
}

/// GET /api/v1/targets/:name/summaries
pub async fn get_summaries(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Json<SummariesResponse>> {
    let days = window_days(&query)?;
    known_target(&state, &name).await?;

    let to = Utc::now().date_naive();
    let from = to - Duration::days(i64::from(days));
    let summaries = state.store.query_daily_summaries(&name, from, to).await?;

    Ok(Json(SummariesResponse {
        target: name,
        days,
        count: summaries.len(),
        summaries,
    }))
}

/// GET /api/v1/targets/:name/latency
///
/// Hourly latency buckets over the window.
pub async fn get_latency(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Json<LatencyResponse>> {
    let days = window_days(&query)?;
    known_target(&state, &name).await?;

    let end = Utc::now();
    let start = end - Duration::days(i64::from(days));
    let buckets = state
        .store
        .latency_buckets(QueryRange::new(&name, start, end))
        .await?;

    Ok(Json(LatencyResponse {
        target: name,
        days,
        buckets,
    }))
}
