//! In-memory storage backend (no persistence)
//!
//! Useful for:
//! - Testing without database dependencies
//! - Running with `"storage": { "backend": "none" }`
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart, so the transition
//!   detector always starts from `Unknown`
//! - **Unbounded**: Only retention cleanup shrinks the tables
//!
//! All state lives behind a single `RwLock`, which makes every write
//! (including incident open/close) atomic with respect to the others.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, DurationRound, NaiveDate, TimeDelta, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, QueryRange, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{
    AuditEntry, DailySummary, Incident, LatencyBucket, NotificationLog, ProbeResult, Target,
    TargetStatus,
};

#[derive(Default)]
struct MemoryState {
    targets: BTreeMap<String, Target>,
    probe_results: Vec<ProbeResult>,
    incidents: Vec<Incident>,
    next_incident_id: i64,
    summaries: BTreeMap<(String, NaiveDate), DailySummary>,
    notifications: Vec<NotificationLog>,
    audit_entries: Vec<AuditEntry>,
}

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }
}

fn retain_counting<T>(rows: &mut Vec<T>, keep: impl Fn(&T) -> bool) -> u64 {
    let before = rows.len();
    rows.retain(keep);
    (before - rows.len()) as u64
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list_targets(&self) -> StorageResult<Vec<Target>> {
        Ok(self.state.read().await.targets.values().cloned().collect())
    }

    async fn get_target(&self, name: &str) -> StorageResult<Option<Target>> {
        Ok(self.state.read().await.targets.get(name).cloned())
    }

    async fn insert_target(&self, target: &Target) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.targets.contains_key(&target.name) {
            return Err(StorageError::Conflict(format!(
                "target '{}' already exists",
                target.name
            )));
        }
        state.targets.insert(target.name.clone(), target.clone());
        Ok(())
    }

    async fn update_target_url(&self, name: &str, url: &str) -> StorageResult<()> {
        let mut state = self.state.write().await;
        match state.targets.get_mut(name) {
            Some(target) => {
                target.url = url.to_string();
                Ok(())
            }
            None => Err(StorageError::NotFound(format!("target '{}'", name))),
        }
    }

    async fn set_target_enabled(&self, name: &str, enabled: bool) -> StorageResult<()> {
        match self.state.write().await.targets.get_mut(name) {
            Some(target) => {
                target.enabled = enabled;
                Ok(())
            }
            None => Err(StorageError::NotFound(format!("target '{}'", name))),
        }
    }

    async fn update_target_status(
        &self,
        name: &str,
        status: TargetStatus,
        checked_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        if let Some(target) = self.state.write().await.targets.get_mut(name) {
            target.status = status;
            target.last_checked = Some(checked_at);
        }
        Ok(())
    }

    async fn insert_probe_result(&self, result: &ProbeResult) -> StorageResult<()> {
        self.state.write().await.probe_results.push(result.clone());
        Ok(())
    }

    async fn query_probe_results(&self, query: QueryRange) -> StorageResult<Vec<ProbeResult>> {
        debug!("querying in-memory probe results for {}", query.target);

        let state = self.state.read().await;
        let mut results: Vec<ProbeResult> = state
            .probe_results
            .iter()
            .filter(|r| r.target == query.target && r.timestamp >= query.start && r.timestamp < query.end)
            .cloned()
            .collect();

        // stable sort keeps insertion order for equal timestamps
        results.sort_by_key(|r| r.timestamp);
        results.truncate(query.limit.unwrap_or(usize::MAX));
        Ok(results)
    }

    async fn latest_probe_results(&self) -> StorageResult<Vec<ProbeResult>> {
        let state = self.state.read().await;
        let mut latest: BTreeMap<&str, &ProbeResult> = BTreeMap::new();

        for result in &state.probe_results {
            match latest.get(result.target.as_str()) {
                Some(existing) if existing.timestamp > result.timestamp => {}
                _ => {
                    latest.insert(&result.target, result);
                }
            }
        }

        Ok(latest.into_values().cloned().collect())
    }

    async fn latency_buckets(&self, query: QueryRange) -> StorageResult<Vec<LatencyBucket>> {
        let state = self.state.read().await;
        let mut buckets: BTreeMap<DateTime<Utc>, Vec<u64>> = BTreeMap::new();

        for result in state.probe_results.iter().filter(|r| {
            r.target == query.target
                && r.timestamp >= query.start
                && r.timestamp < query.end
                && r.latency_ms > 0
        }) {
            let hour = result
                .timestamp
                .duration_trunc(TimeDelta::hours(1))
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
            buckets.entry(hour).or_default().push(result.latency_ms);
        }

        Ok(buckets
            .into_iter()
            .map(|(hour, latencies)| {
                let sum: u64 = latencies.iter().sum();
                LatencyBucket {
                    hour,
                    count: latencies.len() as u64,
                    avg_latency_ms: sum as f64 / latencies.len() as f64,
                    min_latency_ms: latencies.iter().copied().min().unwrap_or(0),
                    max_latency_ms: latencies.iter().copied().max().unwrap_or(0),
                }
            })
            .collect())
    }

    async fn delete_probe_results_before(&self, before: DateTime<Utc>) -> StorageResult<u64> {
        let mut state = self.state.write().await;
        Ok(retain_counting(&mut state.probe_results, |r| r.timestamp >= before))
    }

    async fn open_incident(
        &self,
        target: &str,
        start_time: DateTime<Utc>,
    ) -> StorageResult<Option<Incident>> {
        let mut state = self.state.write().await;

        if state
            .incidents
            .iter()
            .any(|i| i.target == target && i.is_open())
        {
            return Ok(None);
        }

        state.next_incident_id += 1;
        let incident = Incident {
            id: state.next_incident_id,
            target: target.to_string(),
            start_time,
            end_time: None,
            duration_seconds: 0,
            note: None,
        };
        state.incidents.push(incident.clone());
        Ok(Some(incident))
    }

    async fn close_incident(
        &self,
        target: &str,
        end_time: DateTime<Utc>,
    ) -> StorageResult<Option<Incident>> {
        let mut state = self.state.write().await;

        let Some(incident) = state
            .incidents
            .iter_mut()
            .find(|i| i.target == target && i.is_open())
        else {
            return Ok(None);
        };

        incident.end_time = Some(end_time);
        incident.duration_seconds = (end_time - incident.start_time).num_seconds().max(0);
        Ok(Some(incident.clone()))
    }

    async fn ongoing_incident(&self, target: &str) -> StorageResult<Option<Incident>> {
        Ok(self
            .state
            .read()
            .await
            .incidents
            .iter()
            .find(|i| i.target == target && i.is_open())
            .cloned())
    }

    async fn query_incidents(&self, query: QueryRange) -> StorageResult<Vec<Incident>> {
        let state = self.state.read().await;
        let mut incidents: Vec<Incident> = state
            .incidents
            .iter()
            .filter(|i| {
                i.target == query.target
                    && i.start_time < query.end
                    && i.end_time.is_none_or(|end| end > query.start)
            })
            .cloned()
            .collect();

        incidents.sort_by_key(|i| i.start_time);
        incidents.truncate(query.limit.unwrap_or(usize::MAX));
        Ok(incidents)
    }

    async fn delete_closed_incidents_before(&self, before: DateTime<Utc>) -> StorageResult<u64> {
        let mut state = self.state.write().await;
        Ok(retain_counting(&mut state.incidents, |i| {
            i.end_time.is_none_or(|end| end >= before)
        }))
    }

    async fn upsert_daily_summary(&self, summary: &DailySummary) -> StorageResult<()> {
        self.state
            .write()
            .await
            .summaries
            .insert((summary.target.clone(), summary.date), summary.clone());
        Ok(())
    }

    async fn get_daily_summary(
        &self,
        target: &str,
        date: NaiveDate,
    ) -> StorageResult<Option<DailySummary>> {
        Ok(self
            .state
            .read()
            .await
            .summaries
            .get(&(target.to_string(), date))
            .cloned())
    }

    async fn query_daily_summaries(
        &self,
        target: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StorageResult<Vec<DailySummary>> {
        Ok(self
            .state
            .read()
            .await
            .summaries
            .values()
            .filter(|s| s.target == target && s.date >= from && s.date <= to)
            .cloned()
            .collect())
    }

    async fn delete_daily_summaries_before(&self, before: NaiveDate) -> StorageResult<u64> {
        let mut state = self.state.write().await;
        let count = state.summaries.len();
        state.summaries.retain(|(_, date), _| *date >= before);
        Ok((count - state.summaries.len()) as u64)
    }

    async fn insert_notification(&self, log: &NotificationLog) -> StorageResult<i64> {
        let mut state = self.state.write().await;
        state.notifications.push(log.clone());
        Ok(state.notifications.len() as i64)
    }

    async fn recent_notifications(&self, limit: usize) -> StorageResult<Vec<NotificationLog>> {
        let state = self.state.read().await;
        let mut logs = state.notifications.clone();
        logs.reverse();
        logs.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        logs.truncate(limit);
        Ok(logs)
    }

    async fn delete_notifications_before(&self, before: DateTime<Utc>) -> StorageResult<u64> {
        let mut state = self.state.write().await;
        Ok(retain_counting(&mut state.notifications, |n| n.sent_at >= before))
    }

    async fn insert_audit_entry(&self, entry: &AuditEntry) -> StorageResult<i64> {
        let mut state = self.state.write().await;
        state.audit_entries.push(entry.clone());
        Ok(state.audit_entries.len() as i64)
    }

    async fn recent_audit_entries(&self, limit: usize) -> StorageResult<Vec<AuditEntry>> {
        let state = self.state.read().await;
        let mut entries = state.audit_entries.clone();
        entries.reverse();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn delete_audit_entries_before(&self, before: DateTime<Utc>) -> StorageResult<u64> {
        let mut state = self.state.write().await;
        Ok(retain_counting(&mut state.audit_entries, |e| e.timestamp >= before))
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let state = self.state.read().await;
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                (
                    "probe_results".to_string(),
                    state.probe_results.len().to_string(),
                ),
            ]),
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let state = self.state.read().await;
        let open = state.incidents.iter().filter(|i| i.is_open()).count();
        Ok(format!(
            "In-Memory: {} targets, {} probe results, {} open incidents, {} daily summaries",
            state.targets.len(),
            state.probe_results.len(),
            open,
            state.summaries.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
