//! Aggregation, retention and read-side metrics over the result store
//!
//! ## Failure Semantics
//!
//! Daily aggregation is best-effort: a target whose summary cannot be built
//! is logged and skipped, the rest are still aggregated. Retention cleanup is
//! fail-fast: the first category that fails aborts the run and the remaining
//! categories wait for the next trigger.
//!
//! ## Retention Horizon
//!
//! The cleanup cutoff is `now - retention_days`, but never later than the
//! start of the current UTC day. A horizon of 0 days therefore keeps
//! everything recorded today.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::monitors::incidents::{IncidentStats, summarize};
use crate::storage::schema::{day_bounds, start_of_day};
use crate::storage::{
    DailySummary, Incident, ProbeResult, QueryRange, StorageBackend, StorageResult,
};

/// Result of aggregating one date for every target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub date: Option<NaiveDate>,

    pub targets: usize,

    /// Summaries written
    pub generated: usize,

    /// Targets without any probe result on that date
    pub skipped: usize,

    /// Targets whose aggregation failed
    pub failed: Vec<String>,
}

/// Rows removed by one retention run, in deletion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub cutoff: DateTime<Utc>,
    pub probe_results: u64,
    pub incidents: u64,
    pub summaries: u64,
    pub notifications: u64,
    pub audit_entries: u64,
}

/// Rolling window metrics for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetMetrics {
    pub target: String,
    pub period_days: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_checks: u64,
    pub successful_checks: u64,
    pub uptime_percentage: f64,
    pub avg_latency_ms: f64,
    pub total_downtime_seconds: i64,
    pub incident_count: u64,
    pub mttr_seconds: Option<f64>,
    pub longest_incident_seconds: Option<i64>,
}

/// Cutoff for a retention horizon of `retention_days`
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    let horizon = now - Duration::days(i64::from(retention_days));
    horizon.min(start_of_day(now))
}

/// Build the summary of one target's results for one day
///
/// Returns `None` when there are no results.
pub fn summarize_day(
    target: &str,
    date: NaiveDate,
    results: &[ProbeResult],
    incidents: &[Incident],
    now: DateTime<Utc>,
) -> Option<DailySummary> {
    if results.is_empty() {
        return None;
    }

    let (day_start, day_end) = day_bounds(date);

    let total_checks = results.len() as u64;
    let successful_checks = results.iter().filter(|r| r.is_successful()).count() as u64;
    let latencies: Vec<u64> = results
        .iter()
        .map(|r| r.latency_ms)
        .filter(|l| *l > 0)
        .collect();

    let avg_latency_ms = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
    };

    let downtime_seconds: i64 = incidents
        .iter()
        .map(|i| i.overlap_seconds(day_start, day_end, now))
        .sum();

    let incident_count = incidents
        .iter()
        .filter(|i| i.start_time >= day_start && i.start_time < day_end)
        .count() as u64;

    Some(DailySummary {
        target: target.to_string(),
        date,
        total_checks,
        successful_checks,
        failed_checks: total_checks - successful_checks,
        uptime_percentage: successful_checks as f64 / total_checks as f64 * 100.0,
        avg_latency_ms,
        min_latency_ms: latencies.iter().copied().min().unwrap_or(0),
        max_latency_ms: latencies.iter().copied().max().unwrap_or(0),
        downtime_minutes: downtime_seconds / 60,
        incident_count,
    })
}

#[derive(Clone)]
pub struct Analytics {
    store: Arc<dyn StorageBackend>,
}

impl Analytics {
    pub fn new(store: Arc<dyn StorageBackend>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn StorageBackend> {
        &self.store
    }

    /// Aggregate and persist one target's results for `date`
    ///
    /// Re-running for the same `(target, date)` overwrites the previous row.
    #[instrument(skip(self))]
    pub async fn generate_daily_summary(
        &self,
        target: &str,
        date: NaiveDate,
    ) -> StorageResult<Option<DailySummary>> {
        let (day_start, day_end) = day_bounds(date);

        let results = self
            .store
            .query_probe_results(QueryRange::new(target, day_start, day_end))
            .await?;

        if results.is_empty() {
            warn!("no probe results for {target} on {date}");
            return Ok(None);
        }

        let incidents = self
            .store
            .query_incidents(QueryRange::new(target, day_start, day_end))
            .await?;

        let Some(summary) = summarize_day(target, date, &results, &incidents, Utc::now()) else {
            return Ok(None);
        };

        self.store.upsert_daily_summary(&summary).await?;
        debug!(
            "{target} on {date}: {:.2}% over {} checks",
            summary.uptime_percentage, summary.total_checks
        );

        Ok(Some(summary))
    }

    /// Aggregate `date` for every stored target, continuing past failures
    #[instrument(skip(self))]
    pub async fn generate_daily_summaries_for_all(
        &self,
        date: NaiveDate,
    ) -> StorageResult<AggregationReport> {
        let targets = self.store.list_targets().await?;

        let mut report = AggregationReport {
            date: Some(date),
            targets: targets.len(),
            ..Default::default()
        };

        for target in &targets {
            match self.generate_daily_summary(&target.name, date).await {
                Ok(Some(_)) => report.generated += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    error!("failed to aggregate {} for {date}: {e}", target.name);
                    report.failed.push(target.name.clone());
                }
            }
        }

        info!(
            "daily summaries for {date}: {} generated, {} skipped, {} failed",
            report.generated,
            report.skipped,
            report.failed.len()
        );
        Ok(report)
    }

    /// Delete history older than the retention horizon
    ///
    /// Categories are processed in order and the first failure aborts the
    /// run.
    #[instrument(skip(self))]
    pub async fn cleanup_old_data(&self, retention_days: u32) -> StorageResult<CleanupReport> {
        self.cleanup_old_data_at(retention_days, Utc::now()).await
    }

    pub async fn cleanup_old_data_at(
        &self,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> StorageResult<CleanupReport> {
        let cutoff = retention_cutoff(now, retention_days);
        info!("starting data cleanup (retention: {retention_days} days, cutoff {cutoff})");

        let probe_results = self.store.delete_probe_results_before(cutoff).await?;
        let incidents = self.store.delete_closed_incidents_before(cutoff).await?;
        let summaries = self
            .store
            .delete_daily_summaries_before(cutoff.date_naive())
            .await?;
        let notifications = self.store.delete_notifications_before(cutoff).await?;
        let audit_entries = self.store.delete_audit_entries_before(cutoff).await?;

        let report = CleanupReport {
            cutoff,
            probe_results,
            incidents,
            summaries,
            notifications,
            audit_entries,
        };

        info!(
            "cleanup complete: {} probe results, {} incidents, {} summaries, {} notifications, {} audit entries deleted",
            report.probe_results,
            report.incidents,
            report.summaries,
            report.notifications,
            report.audit_entries
        );
        Ok(report)
    }

    /// Share of successful (up and 2xx) checks in `[start, end)`, 0 without checks
    pub async fn uptime_percentage(
        &self,
        target: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<f64> {
        let results = self.results(target, start, end).await?;
        Ok(uptime_of(&results))
    }

    /// Mean of non-zero latencies in `[start, end)`
    pub async fn average_latency(
        &self,
        target: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<f64> {
        let results = self.results(target, start, end).await?;
        Ok(average_latency_of(&results))
    }

    /// Whether uptime in the window meets `sla_target` percent, with the actual uptime
    pub async fn sla_compliance(
        &self,
        target: &str,
        sla_target: f64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<(bool, f64)> {
        let uptime = self.uptime_percentage(target, start, end).await?;
        Ok((uptime >= sla_target, uptime))
    }

    /// Seconds of downtime inside `[start, end)`
    pub async fn total_downtime(
        &self,
        target: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<i64> {
        Ok(self.incident_stats(target, start, end).await?.total_downtime_seconds)
    }

    /// Mean time to recovery over closed incidents
    pub async fn mttr(
        &self,
        target: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Option<f64>> {
        Ok(self.incident_stats(target, start, end).await?.mttr_seconds)
    }

    /// Longest closed incident overlapping the window
    pub async fn longest_incident(
        &self,
        target: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Option<Incident>> {
        let incidents = self
            .store
            .query_incidents(QueryRange::new(target, start, end))
            .await?;

        Ok(incidents
            .into_iter()
            .filter(|i| !i.is_open())
            .max_by_key(|i| i.duration_seconds))
    }

    /// Metrics for the last `days` days
    #[instrument(skip(self))]
    pub async fn target_metrics(&self, target: &str, days: u32) -> StorageResult<TargetMetrics> {
        let end = Utc::now();
        let start = end - Duration::days(i64::from(days));

        let results = self.results(target, start, end).await?;
        let stats = self.incident_stats(target, start, end).await?;

        Ok(TargetMetrics {
            target: target.to_string(),
            period_days: days,
            start_time: start,
            end_time: end,
            total_checks: results.len() as u64,
            successful_checks: results.iter().filter(|r| r.is_successful()).count() as u64,
            uptime_percentage: uptime_of(&results),
            avg_latency_ms: average_latency_of(&results),
            total_downtime_seconds: stats.total_downtime_seconds,
            incident_count: stats.count,
            mttr_seconds: stats.mttr_seconds,
            longest_incident_seconds: stats.longest_seconds,
        })
    }

    async fn results(
        &self,
        target: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<ProbeResult>> {
        self.store
            .query_probe_results(QueryRange::new(target, start, end))
            .await
    }

    async fn incident_stats(
        &self,
        target: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<IncidentStats> {
        let incidents = self
            .store
            .query_incidents(QueryRange::new(target, start, end))
            .await?;
        Ok(summarize(&incidents, start, end, Utc::now()))
    }
}

fn uptime_of(results: &[ProbeResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let successful = results.iter().filter(|r| r.is_successful()).count();
    successful as f64 / results.len() as f64 * 100.0
}

fn average_latency_of(results: &[ProbeResult]) -> f64 {
    let latencies: Vec<u64> = results
        .iter()
        .map(|r| r.latency_ms)
        .filter(|l| *l > 0)
        .collect();

    if latencies.is_empty() {
        return 0.0;
    }
    latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
}
