//! Request and response bodies of the admin API

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::monitors::StatusEntry;
use crate::storage::{DailySummary, Incident, LatencyBucket, TargetStatus};

/// Default look-back window for per-target queries
pub const DEFAULT_DAYS: u32 = 7;

/// Upper bound accepted for `?days=`
pub const MAX_DAYS: u32 = 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub storage_healthy: bool,
    pub storage_message: String,
    pub uptime_seconds: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub targets: Vec<StatusEntry>,
    pub total: usize,
    pub up: usize,
    pub down: usize,
}

impl StatusResponse {
    pub fn from_entries(targets: Vec<StatusEntry>) -> Self {
        let up = targets
            .iter()
            .filter(|e| e.status == TargetStatus::Up)
            .count();
        let down = targets
            .iter()
            .filter(|e| e.status == TargetStatus::Down)
            .count();

        Self {
            total: targets.len(),
            up,
            down,
            targets,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentsResponse {
    pub target: String,
    pub days: u32,
    pub count: usize,
    pub incidents: Vec<Incident>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummariesResponse {
    pub target: String,
    pub days: u32,
    pub count: usize,
    pub summaries: Vec<DailySummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyResponse {
    pub target: String,
    pub days: u32,
    pub buckets: Vec<LatencyBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateRequest {
    pub date: NaiveDate,
}

/// `?days=N` query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

impl DaysQuery {
    /// Validated window length, `None` when out of range
    pub fn resolve(&self) -> Option<u32> {
        match self.days {
            None => Some(DEFAULT_DAYS),
            Some(d) if (1..=MAX_DAYS).contains(&d) => Some(d),
            Some(_) => None,
        }
    }
}
