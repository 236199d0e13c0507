//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! storage implementations must implement.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::error::StorageResult;
use super::schema::{
    AuditEntry, DailySummary, Incident, LatencyBucket, NotificationLog, ProbeResult, Target,
    TargetStatus,
};

/// Query parameters for fetching rows of one target within a time window
#[derive(Debug, Clone)]
pub struct QueryRange {
    /// Target to query
    pub target: String,

    /// Start of time range (inclusive)
    pub start: DateTime<Utc>,

    /// End of time range (exclusive)
    pub end: DateTime<Utc>,

    /// Maximum number of results to return
    pub limit: Option<usize>,
}

impl QueryRange {
    pub fn new(target: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            target: target.into(),
            start,
            end,
            limit: None,
        }
    }
}

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Trait for persistent storage backends
///
/// The store is the serialization point of the pipeline: concurrent rounds,
/// the maintenance actor and the API all write through it. Implementations
/// must therefore make [`open_incident`](StorageBackend::open_incident) and
/// [`close_incident`](StorageBackend::close_incident) atomic so that at most
/// one incident per target is ever open.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they will be used
/// across async tasks.
///
/// ## Error Handling
///
/// Methods return `StorageResult<T>` which wraps `StorageError`.
/// Implementations should convert backend-specific errors to
/// `StorageError` variants.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // ========================================================================
    // Targets
    // ========================================================================

    /// All stored targets, ordered by name
    async fn list_targets(&self) -> StorageResult<Vec<Target>>;

    async fn get_target(&self, name: &str) -> StorageResult<Option<Target>>;

    /// Insert a new target
    ///
    /// Returns `StorageError::Conflict` if a target with that name exists.
    async fn insert_target(&self, target: &Target) -> StorageResult<()>;

    /// Change the URL of an existing target
    async fn update_target_url(&self, name: &str, url: &str) -> StorageResult<()>;

    /// Include or exclude a target from probe rounds
    async fn set_target_enabled(&self, name: &str, enabled: bool) -> StorageResult<()>;

    /// Record the latest observed state of a target
    ///
    /// Unknown names are ignored, the pipeline may probe a target that sync
    /// has not persisted yet.
    async fn update_target_status(
        &self,
        name: &str,
        status: TargetStatus,
        checked_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    // ========================================================================
    // Probe results
    // ========================================================================

    /// Append a single probe result
    async fn insert_probe_result(&self, result: &ProbeResult) -> StorageResult<()>;

    /// Probe results for one target, ordered by timestamp (oldest first)
    async fn query_probe_results(&self, query: QueryRange) -> StorageResult<Vec<ProbeResult>>;

    /// The most recent probe result of every target that has one
    ///
    /// Used to seed the transition detector at startup.
    async fn latest_probe_results(&self) -> StorageResult<Vec<ProbeResult>>;

    /// Hourly latency statistics over non-zero latencies
    async fn latency_buckets(&self, query: QueryRange) -> StorageResult<Vec<LatencyBucket>>;

    /// Delete probe results strictly older than `before`
    ///
    /// Returns the number of rows deleted.
    async fn delete_probe_results_before(&self, before: DateTime<Utc>) -> StorageResult<u64>;

    // ========================================================================
    // Incidents
    // ========================================================================

    /// Open an incident for `target` unless one is already open
    ///
    /// Returns the new incident, or `None` if an open one already existed.
    /// The check and the insert happen atomically.
    async fn open_incident(
        &self,
        target: &str,
        start_time: DateTime<Utc>,
    ) -> StorageResult<Option<Incident>>;

    /// Close the open incident for `target`, if any
    ///
    /// Sets `end_time` and the duration in whole seconds. Returns the closed
    /// incident, or `None` if nothing was open.
    async fn close_incident(
        &self,
        target: &str,
        end_time: DateTime<Utc>,
    ) -> StorageResult<Option<Incident>>;

    /// The open incident of `target`, if any
    async fn ongoing_incident(&self, target: &str) -> StorageResult<Option<Incident>>;

    /// Incidents of one target overlapping `[start, end)`, oldest first
    ///
    /// Open incidents overlap every window that ends after their start.
    async fn query_incidents(&self, query: QueryRange) -> StorageResult<Vec<Incident>>;

    /// Delete closed incidents that ended strictly before `before`
    async fn delete_closed_incidents_before(&self, before: DateTime<Utc>) -> StorageResult<u64>;

    // ========================================================================
    // Daily summaries
    // ========================================================================

    /// Insert or overwrite the summary for `(target, date)`
    async fn upsert_daily_summary(&self, summary: &DailySummary) -> StorageResult<()>;

    async fn get_daily_summary(
        &self,
        target: &str,
        date: NaiveDate,
    ) -> StorageResult<Option<DailySummary>>;

    /// Summaries of one target for `from..=to`, oldest first
    async fn query_daily_summaries(
        &self,
        target: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StorageResult<Vec<DailySummary>>;

    /// Delete summaries for dates strictly before `before`
    async fn delete_daily_summaries_before(&self, before: NaiveDate) -> StorageResult<u64>;

    // ========================================================================
    // Notification and audit logs
    // ========================================================================

    /// Record a notification, returning its id
    async fn insert_notification(&self, log: &NotificationLog) -> StorageResult<i64>;

    /// Most recent notifications, newest first
    async fn recent_notifications(&self, limit: usize) -> StorageResult<Vec<NotificationLog>>;

    async fn delete_notifications_before(&self, before: DateTime<Utc>) -> StorageResult<u64>;

    /// Record an audit entry, returning its id
    async fn insert_audit_entry(&self, entry: &AuditEntry) -> StorageResult<i64>;

    /// Most recent audit entries, newest first
    async fn recent_audit_entries(&self, limit: usize) -> StorageResult<Vec<AuditEntry>>;

    async fn delete_audit_entries_before(&self, before: DateTime<Utc>) -> StorageResult<u64>;

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend
    /// is operational (e.g., ping database, check file access).
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Get backend-specific statistics
    ///
    /// Returns human-readable stats about the backend
    /// (e.g., "SQLite: 12000 probe results, 4 open incidents, 1.2 MB on disk").
    async fn get_stats(&self) -> StorageResult<String>;

    /// Flush and release any held resources
    async fn close(&self) -> StorageResult<()>;
}
