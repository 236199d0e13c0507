//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the `StorageBackend` trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers (API, aggregation) never block probe writes
//! - **Connection pooling**: Concurrent rounds share one pool
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! ## Incident Atomicity
//!
//! The "one open incident per target" rule is enforced by the partial unique
//! index `idx_incidents_one_open`. Opening uses `INSERT OR IGNORE ... RETURNING`
//! and closing a single `UPDATE ... WHERE end_time IS NULL RETURNING`, so two
//! rounds racing on the same target cannot produce a second open incident or
//! close one twice.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, QueryRange, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{
    AuditEntry, DATE_FORMAT, DailySummary, Incident, LatencyBucket, NotificationLog,
    ProbeResult, Target, TargetStatus,
};

const INCIDENT_COLUMNS: &str = "id, target, start_time, end_time, duration_seconds, note";

const PROBE_COLUMNS: &str = "target, timestamp, http_status, is_up, latency_ms, error_message";

const SUMMARY_COLUMNS: &str = "target, date, total_checks, successful_checks, failed_checks, \
     uptime_percentage, avg_latency_ms, min_latency_ms, max_latency_ms, downtime_minutes, \
     incident_count";

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// SQLite storage backend
///
/// Stores targets, probe results, incidents, daily summaries and the
/// notification/audit logs in a local SQLite database file.
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for concurrent access (WAL mode, busy timeout)
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use watchdog::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./watchdog.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        info!("SQLite connection pool created");

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    /// Helper to convert timestamp to Unix milliseconds for SQLite
    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    /// Helper to convert Unix milliseconds from SQLite to DateTime
    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn parse_date(value: &str) -> StorageResult<NaiveDate> {
        NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| {
            StorageError::SerializationError(format!("invalid date '{}': {}", value, e))
        })
    }

    fn target_from_row(row: &SqliteRow) -> StorageResult<Target> {
        let status: String = row.try_get("status")?;
        Ok(Target {
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            enabled: row.try_get("enabled")?,
            status: TargetStatus::parse(&status),
            last_checked: row
                .try_get::<Option<i64>, _>("last_checked")?
                .map(Self::millis_to_timestamp),
        })
    }

    fn probe_from_row(row: &SqliteRow) -> StorageResult<ProbeResult> {
        Ok(ProbeResult {
            target: row.try_get("target")?,
            timestamp: Self::millis_to_timestamp(row.try_get("timestamp")?),
            http_status: row.try_get::<i64, _>("http_status")? as u16,
            is_up: row.try_get("is_up")?,
            latency_ms: row.try_get::<i64, _>("latency_ms")?.max(0) as u64,
            error_message: row.try_get("error_message")?,
        })
    }

    fn incident_from_row(row: &SqliteRow) -> StorageResult<Incident> {
        Ok(Incident {
            id: row.try_get("id")?,
            target: row.try_get("target")?,
            start_time: Self::millis_to_timestamp(row.try_get("start_time")?),
            end_time: row
                .try_get::<Option<i64>, _>("end_time")?
                .map(Self::millis_to_timestamp),
            duration_seconds: row.try_get("duration_seconds")?,
            note: row.try_get("note")?,
        })
    }

    fn summary_from_row(row: &SqliteRow) -> StorageResult<DailySummary> {
        let date: String = row.try_get("date")?;
        Ok(DailySummary {
            target: row.try_get("target")?,
            date: Self::parse_date(&date)?,
            total_checks: row.try_get::<i64, _>("total_checks")? as u64,
            successful_checks: row.try_get::<i64, _>("successful_checks")? as u64,
            failed_checks: row.try_get::<i64, _>("failed_checks")? as u64,
            uptime_percentage: row.try_get("uptime_percentage")?,
            avg_latency_ms: row.try_get("avg_latency_ms")?,
            min_latency_ms: row.try_get::<i64, _>("min_latency_ms")? as u64,
            max_latency_ms: row.try_get::<i64, _>("max_latency_ms")? as u64,
            downtime_minutes: row.try_get("downtime_minutes")?,
            incident_count: row.try_get::<i64, _>("incident_count")? as u64,
        })
    }

    fn notification_from_row(row: &SqliteRow) -> StorageResult<NotificationLog> {
        Ok(NotificationLog {
            target: row.try_get("target")?,
            kind: row.try_get("kind")?,
            message: row.try_get("message")?,
            severity: row.try_get("severity")?,
            sent_at: Self::millis_to_timestamp(row.try_get("sent_at")?),
            status: row.try_get("status")?,
        })
    }

    fn audit_from_row(row: &SqliteRow) -> StorageResult<AuditEntry> {
        let new_value = row
            .try_get::<Option<String>, _>("new_value")?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?;

        Ok(AuditEntry {
            action: row.try_get("action")?,
            entity_type: row.try_get("entity_type")?,
            entity_id: row.try_get("entity_id")?,
            new_value,
            actor: row.try_get("actor")?,
            timestamp: Self::millis_to_timestamp(row.try_get("timestamp")?),
        })
    }

    async fn count(&self, sql: &str) -> StorageResult<i64> {
        let row: (i64,) = sqlx::query_as(sql).fetch_one(&self.pool).await?;
        Ok(row.0)
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self))]
    async fn list_targets(&self) -> StorageResult<Vec<Target>> {
        let rows = sqlx::query(
            "SELECT name, url, enabled, status, last_checked FROM targets ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::target_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn get_target(&self, name: &str) -> StorageResult<Option<Target>> {
        let row = sqlx::query(
            "SELECT name, url, enabled, status, last_checked FROM targets WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::target_from_row).transpose()
    }

    #[instrument(skip(self, target), fields(target = %target.name))]
    async fn insert_target(&self, target: &Target) -> StorageResult<()> {
        let now = Self::timestamp_to_millis(&Utc::now());

        sqlx::query(
            r#"
            INSERT INTO targets (name, url, enabled, status, last_checked, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&target.name)
        .bind(&target.url)
        .bind(target.enabled)
        .bind(target.status.as_str())
        .bind(target.last_checked.as_ref().map(Self::timestamp_to_millis))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!("inserted target");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_target_url(&self, name: &str, url: &str) -> StorageResult<()> {
        let result = sqlx::query("UPDATE targets SET url = ?, updated_at = ? WHERE name = ?")
            .bind(url)
            .bind(Self::timestamp_to_millis(&Utc::now()))
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("target '{}'", name)));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_target_enabled(&self, name: &str, enabled: bool) -> StorageResult<()> {
        let result = sqlx::query("UPDATE targets SET enabled = ?, updated_at = ? WHERE name = ?")
            .bind(enabled)
            .bind(Self::timestamp_to_millis(&Utc::now()))
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("target '{}'", name)));
        }

        Ok(())
    }

    #[instrument(skip(self, checked_at))]
    async fn update_target_status(
        &self,
        name: &str,
        status: TargetStatus,
        checked_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        sqlx::query("UPDATE targets SET status = ?, last_checked = ? WHERE name = ?")
            .bind(status.as_str())
            .bind(Self::timestamp_to_millis(&checked_at))
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[instrument(skip(self, result), fields(target = %result.target, is_up = result.is_up))]
    async fn insert_probe_result(&self, result: &ProbeResult) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO probe_results (target, timestamp, http_status, is_up, latency_ms, error_message)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&result.target)
        .bind(Self::timestamp_to_millis(&result.timestamp))
        .bind(result.http_status as i64)
        .bind(result.is_up)
        .bind(result.latency_ms as i64)
        .bind(&result.error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(target = %query.target))]
    async fn query_probe_results(&self, query: QueryRange) -> StorageResult<Vec<ProbeResult>> {
        let limit_clause = query
            .limit
            .map(|l| format!("LIMIT {}", l))
            .unwrap_or_default();

        let sql = format!(
            r#"
            SELECT {}
            FROM probe_results
            WHERE target = ? AND timestamp >= ? AND timestamp < ?
            ORDER BY timestamp ASC, id ASC
            {}
            "#,
            PROBE_COLUMNS, limit_clause
        );

        let rows = sqlx::query(&sql)
            .bind(&query.target)
            .bind(Self::timestamp_to_millis(&query.start))
            .bind(Self::timestamp_to_millis(&query.end))
            .fetch_all(&self.pool)
            .await?;

        let results: StorageResult<Vec<ProbeResult>> =
            rows.iter().map(Self::probe_from_row).collect();
        let results = results?;
        debug!("query returned {} probe results", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn latest_probe_results(&self) -> StorageResult<Vec<ProbeResult>> {
        let sql = format!(
            r#"
            SELECT {columns}
            FROM (
                SELECT {columns},
                       ROW_NUMBER() OVER (PARTITION BY target ORDER BY timestamp DESC, id DESC) AS rn
                FROM probe_results
            )
            WHERE rn = 1
            ORDER BY target ASC
            "#,
            columns = PROBE_COLUMNS
        );

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Self::probe_from_row).collect()
    }

    #[instrument(skip(self), fields(target = %query.target))]
    async fn latency_buckets(&self, query: QueryRange) -> StorageResult<Vec<LatencyBucket>> {
        let rows = sqlx::query(
            r#"
            SELECT (timestamp / ?) * ? AS hour,
                   COUNT(*) AS count,
                   AVG(latency_ms) AS avg_latency,
                   MIN(latency_ms) AS min_latency,
                   MAX(latency_ms) AS max_latency
            FROM probe_results
            WHERE target = ? AND timestamp >= ? AND timestamp < ? AND latency_ms > 0
            GROUP BY hour
            ORDER BY hour ASC
            "#,
        )
        .bind(MILLIS_PER_HOUR)
        .bind(MILLIS_PER_HOUR)
        .bind(&query.target)
        .bind(Self::timestamp_to_millis(&query.start))
        .bind(Self::timestamp_to_millis(&query.end))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(LatencyBucket {
                    hour: Self::millis_to_timestamp(row.try_get("hour")?),
                    count: row.try_get::<i64, _>("count")? as u64,
                    avg_latency_ms: row.try_get("avg_latency")?,
                    min_latency_ms: row.try_get::<i64, _>("min_latency")? as u64,
                    max_latency_ms: row.try_get::<i64, _>("max_latency")? as u64,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn delete_probe_results_before(&self, before: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM probe_results WHERE timestamp < ?")
            .bind(Self::timestamp_to_millis(&before))
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        info!("deleted {} old probe results", deleted);
        Ok(deleted)
    }

    #[instrument(skip(self, start_time))]
    async fn open_incident(
        &self,
        target: &str,
        start_time: DateTime<Utc>,
    ) -> StorageResult<Option<Incident>> {
        let sql = format!(
            r#"
            INSERT OR IGNORE INTO incidents (target, start_time, duration_seconds)
            VALUES (?, ?, 0)
            RETURNING {}
            "#,
            INCIDENT_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(target)
            .bind(Self::timestamp_to_millis(&start_time))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::incident_from_row).transpose()
    }

    #[instrument(skip(self, end_time))]
    async fn close_incident(
        &self,
        target: &str,
        end_time: DateTime<Utc>,
    ) -> StorageResult<Option<Incident>> {
        let end_millis = Self::timestamp_to_millis(&end_time);
        let sql = format!(
            r#"
            UPDATE incidents
            SET end_time = ?, duration_seconds = MAX(0, (? - start_time) / 1000)
            WHERE target = ? AND end_time IS NULL
            RETURNING {}
            "#,
            INCIDENT_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(end_millis)
            .bind(end_millis)
            .bind(target)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::incident_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn ongoing_incident(&self, target: &str) -> StorageResult<Option<Incident>> {
        let sql = format!(
            "SELECT {} FROM incidents WHERE target = ? AND end_time IS NULL",
            INCIDENT_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(target)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::incident_from_row).transpose()
    }

    #[instrument(skip(self), fields(target = %query.target))]
    async fn query_incidents(&self, query: QueryRange) -> StorageResult<Vec<Incident>> {
        let limit_clause = query
            .limit
            .map(|l| format!("LIMIT {}", l))
            .unwrap_or_default();

        let sql = format!(
            r#"
            SELECT {}
            FROM incidents
            WHERE target = ? AND start_time < ? AND (end_time IS NULL OR end_time > ?)
            ORDER BY start_time ASC
            {}
            "#,
            INCIDENT_COLUMNS, limit_clause
        );

        let rows = sqlx::query(&sql)
            .bind(&query.target)
            .bind(Self::timestamp_to_millis(&query.end))
            .bind(Self::timestamp_to_millis(&query.start))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::incident_from_row).collect()
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn delete_closed_incidents_before(&self, before: DateTime<Utc>) -> StorageResult<u64> {
        let result =
            sqlx::query("DELETE FROM incidents WHERE end_time IS NOT NULL AND end_time < ?")
                .bind(Self::timestamp_to_millis(&before))
                .execute(&self.pool)
                .await?;

        let deleted = result.rows_affected();
        info!("deleted {} closed incidents", deleted);
        Ok(deleted)
    }

    #[instrument(skip(self, summary), fields(target = %summary.target, date = %summary.date))]
    async fn upsert_daily_summary(&self, summary: &DailySummary) -> StorageResult<()> {
        let now = Self::timestamp_to_millis(&Utc::now());

        sqlx::query(
            r#"
            INSERT INTO daily_summaries (
                target, date, total_checks, successful_checks, failed_checks,
                uptime_percentage, avg_latency_ms, min_latency_ms, max_latency_ms,
                downtime_minutes, incident_count, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (target, date) DO UPDATE SET
                total_checks = excluded.total_checks,
                successful_checks = excluded.successful_checks,
                failed_checks = excluded.failed_checks,
                uptime_percentage = excluded.uptime_percentage,
                avg_latency_ms = excluded.avg_latency_ms,
                min_latency_ms = excluded.min_latency_ms,
                max_latency_ms = excluded.max_latency_ms,
                downtime_minutes = excluded.downtime_minutes,
                incident_count = excluded.incident_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&summary.target)
        .bind(summary.date.format(DATE_FORMAT).to_string())
        .bind(summary.total_checks as i64)
        .bind(summary.successful_checks as i64)
        .bind(summary.failed_checks as i64)
        .bind(summary.uptime_percentage)
        .bind(summary.avg_latency_ms)
        .bind(summary.min_latency_ms as i64)
        .bind(summary.max_latency_ms as i64)
        .bind(summary.downtime_minutes)
        .bind(summary.incident_count as i64)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_daily_summary(
        &self,
        target: &str,
        date: NaiveDate,
    ) -> StorageResult<Option<DailySummary>> {
        let sql = format!(
            "SELECT {} FROM daily_summaries WHERE target = ? AND date = ?",
            SUMMARY_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(target)
            .bind(date.format(DATE_FORMAT).to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::summary_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn query_daily_summaries(
        &self,
        target: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StorageResult<Vec<DailySummary>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM daily_summaries
            WHERE target = ? AND date >= ? AND date <= ?
            ORDER BY date ASC
            "#,
            SUMMARY_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(target)
            .bind(from.format(DATE_FORMAT).to_string())
            .bind(to.format(DATE_FORMAT).to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::summary_from_row).collect()
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn delete_daily_summaries_before(&self, before: NaiveDate) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM daily_summaries WHERE date < ?")
            .bind(before.format(DATE_FORMAT).to_string())
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        info!("deleted {} daily summaries", deleted);
        Ok(deleted)
    }

    #[instrument(skip(self, log), fields(target = %log.target))]
    async fn insert_notification(&self, log: &NotificationLog) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO notification_logs (target, kind, message, severity, sent_at, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.target)
        .bind(&log.kind)
        .bind(&log.message)
        .bind(&log.severity)
        .bind(Self::timestamp_to_millis(&log.sent_at))
        .bind(&log.status)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    #[instrument(skip(self))]
    async fn recent_notifications(&self, limit: usize) -> StorageResult<Vec<NotificationLog>> {
        let rows = sqlx::query(
            r#"
            SELECT target, kind, message, severity, sent_at, status
            FROM notification_logs
            ORDER BY sent_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::notification_from_row).collect()
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn delete_notifications_before(&self, before: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM notification_logs WHERE sent_at < ?")
            .bind(Self::timestamp_to_millis(&before))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, entry), fields(action = %entry.action))]
    async fn insert_audit_entry(&self, entry: &AuditEntry) -> StorageResult<i64> {
        let new_value = entry
            .new_value
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (action, entity_type, entity_id, new_value, actor, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(new_value)
        .bind(&entry.actor)
        .bind(Self::timestamp_to_millis(&entry.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    #[instrument(skip(self))]
    async fn recent_audit_entries(&self, limit: usize) -> StorageResult<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT action, entity_type, entity_id, new_value, actor, timestamp
            FROM audit_logs
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::audit_from_row).collect()
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn delete_audit_entries_before(&self, before: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM audit_logs WHERE timestamp < ?")
            .bind(Self::timestamp_to_millis(&before))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let targets = self.count("SELECT COUNT(*) FROM targets").await?;
        let results = self.count("SELECT COUNT(*) FROM probe_results").await?;
        let open = self
            .count("SELECT COUNT(*) FROM incidents WHERE end_time IS NULL")
            .await?;
        let summaries = self.count("SELECT COUNT(*) FROM daily_summaries").await?;

        let file_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);
        let file_size_mb = file_size as f64 / 1_000_000.0;

        Ok(format!(
            "SQLite: {} targets, {} probe results, {} open incidents, {} daily summaries, {:.2} MB on disk",
            targets, results, open, summaries, file_size_mb
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
