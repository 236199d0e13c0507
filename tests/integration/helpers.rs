//! Helper functions for integration tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use watchdog::actors::dispatcher::ProbeRound;
use watchdog::monitors::Prober;
use watchdog::storage::{
    AuditEntry, DailySummary, HealthStatus, Incident, LatencyBucket, NotificationLog,
    ProbeResult, QueryRange, StorageBackend, StorageError, StorageResult, Target, TargetStatus,
    memory::MemoryBackend,
};

pub fn memory_store() -> Arc<dyn StorageBackend> {
    Arc::new(MemoryBackend::new())
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
}

pub fn at(d: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, d, h, m, s).unwrap()
}

pub fn up(target: &str, timestamp: DateTime<Utc>, latency_ms: u64) -> ProbeResult {
    ProbeResult {
        target: target.to_string(),
        timestamp,
        http_status: 200,
        is_up: true,
        latency_ms,
        error_message: None,
    }
}

pub fn down(target: &str, timestamp: DateTime<Utc>) -> ProbeResult {
    ProbeResult {
        target: target.to_string(),
        timestamp,
        http_status: 503,
        is_up: false,
        latency_ms: 5,
        error_message: None,
    }
}

pub async fn with_targets(store: &Arc<dyn StorageBackend>, names: &[&str]) -> Vec<Target> {
    let mut targets = vec![];
    for name in names {
        let target = Target::new(*name, format!("https://{name}.test"));
        store.insert_target(&target).await.unwrap();
        targets.push(target);
    }
    targets
}

pub fn probe_round() -> ProbeRound {
    let prober = Prober::new(Duration::from_secs(2)).unwrap();
    ProbeRound::new(prober, 4, Duration::from_secs(5))
}

/// In-memory store with switchable failures
#[derive(Default)]
pub struct FaultyBackend {
    pub inner: MemoryBackend,

    /// `query_probe_results` fails for this target
    pub broken_target: Option<String>,

    /// `delete_closed_incidents_before` fails
    pub fail_incident_cleanup: bool,
}

fn injected() -> StorageError {
    StorageError::QueryFailed("injected failure".to_string())
}

#[async_trait]
impl StorageBackend for FaultyBackend {
    async fn list_targets(&self) -> StorageResult<Vec<Target>> {
        self.inner.list_targets().await
    }

    async fn get_target(&self, name: &str) -> StorageResult<Option<Target>> {
        self.inner.get_target(name).await
    }

    async fn insert_target(&self, target: &Target) -> StorageResult<()> {
        self.inner.insert_target(target).await
    }

    async fn update_target_url(&self, name: &str, url: &str) -> StorageResult<()> {
        self.inner.update_target_url(name, url).await
    }

    async fn set_target_enabled(&self, name: &str, enabled: bool) -> StorageResult<()> {
        self.inner.set_target_enabled(name, enabled).await
    }

    async fn update_target_status(
        &self,
        name: &str,
        status: TargetStatus,
        checked_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.inner.update_target_status(name, status, checked_at).await
    }

    async fn insert_probe_result(&self, result: &ProbeResult) -> StorageResult<()> {
        self.inner.insert_probe_result(result).await
    }

    async fn query_probe_results(&self, query: QueryRange) -> StorageResult<Vec<ProbeResult>> {
        if self.broken_target.as_deref() == Some(query.target.as_str()) {
            return Err(injected());
        }
        self.inner.query_probe_results(query).await
    }

    async fn latest_probe_results(&self) -> StorageResult<Vec<ProbeResult>> {
        self.inner.latest_probe_results().await
    }

    async fn latency_buckets(&self, query: QueryRange) -> StorageResult<Vec<LatencyBucket>> {
        self.inner.latency_buckets(query).await
    }

    async fn delete_probe_results_before(&self, before: DateTime<Utc>) -> StorageResult<u64> {
        self.inner.delete_probe_results_before(before).await
    }

    async fn open_incident(
        &self,
        target: &str,
        start_time: DateTime<Utc>,
    ) -> StorageResult<Option<Incident>> {
        self.inner.open_incident(target, start_time).await
    }

    async fn close_incident(
        &self,
        target: &str,
        end_time: DateTime<Utc>,
    ) -> StorageResult<Option<Incident>> {
        self.inner.close_incident(target, end_time).await
    }

    async fn ongoing_incident(&self, target: &str) -> StorageResult<Option<Incident>> {
        self.inner.ongoing_incident(target).await
    }

    async fn query_incidents(&self, query: QueryRange) -> StorageResult<Vec<Incident>> {
        self.inner.query_incidents(query).await
    }

    async fn delete_closed_incidents_before(&self, before: DateTime<Utc>) -> StorageResult<u64> {
        if self.fail_incident_cleanup {
            return Err(injected());
        }
        self.inner.delete_closed_incidents_before(before).await
    }

    async fn upsert_daily_summary(&self, summary: &DailySummary) -> StorageResult<()> {
        self.inner.upsert_daily_summary(summary).await
    }

    async fn get_daily_summary(
        &self,
        target: &str,
        date: NaiveDate,
    ) -> StorageResult<Option<DailySummary>> {
        self.inner.get_daily_summary(target, date).await
    }

    async fn query_daily_summaries(
        &self,
        target: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StorageResult<Vec<DailySummary>> {
        self.inner.query_daily_summaries(target, from, to).await
    }

    async fn delete_daily_summaries_before(&self, before: NaiveDate) -> StorageResult<u64> {
        self.inner.delete_daily_summaries_before(before).await
    }

    async fn insert_notification(&self, log: &NotificationLog) -> StorageResult<i64> {
        self.inner.insert_notification(log).await
    }

    async fn recent_notifications(&self, limit: usize) -> StorageResult<Vec<NotificationLog>> {
        self.inner.recent_notifications(limit).await
    }

    async fn delete_notifications_before(&self, before: DateTime<Utc>) -> StorageResult<u64> {
        self.inner.delete_notifications_before(before).await
    }

    async fn insert_audit_entry(&self, entry: &AuditEntry) -> StorageResult<i64> {
        self.inner.insert_audit_entry(entry).await
    }

    async fn recent_audit_entries(&self, limit: usize) -> StorageResult<Vec<AuditEntry>> {
        self.inner.recent_audit_entries(limit).await
    }

    async fn delete_audit_entries_before(&self, before: DateTime<Utc>) -> StorageResult<u64> {
        self.inner.delete_audit_entries_before(before).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn get_stats(&self) -> StorageResult<String> {
        self.inner.get_stats().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}
