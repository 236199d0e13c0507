//! Latest-round status snapshot for dashboards

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::storage::schema::{ProbeResult, TargetStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEntry {
    pub target: String,
    pub url: String,
    pub status: TargetStatus,
    pub latency_ms: u64,
    pub status_code: u16,
    pub checked_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl StatusEntry {
    pub fn from_result(url: &str, result: &ProbeResult) -> Self {
        Self {
            target: result.target.clone(),
            url: url.to_string(),
            status: TargetStatus::from_is_up(result.is_up),
            latency_ms: result.latency_ms,
            status_code: result.http_status,
            checked_at: result.timestamp,
            error_message: result.error_message.clone(),
        }
    }
}

/// Snapshot of the most recent round, replaced wholesale once per round
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    entries: Arc<RwLock<Vec<StatusEntry>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, mut entries: Vec<StatusEntry>) {
        entries.sort_by(|a, b| a.target.cmp(&b.target));
        *self.entries.write().await = entries;
    }

    pub async fn snapshot(&self) -> Vec<StatusEntry> {
        self.entries.read().await.clone()
    }
}
