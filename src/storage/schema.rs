//! Row definitions for everything the pipeline persists
//!
//! ## Time Representation
//!
//! All instants are `DateTime<Utc>` in memory and unix milliseconds in the
//! database. Calendar days (daily summaries, retention) are UTC days, stored
//! as `YYYY-MM-DD` strings.
//!
//! ## Ownership
//!
//! - [`Target`] is owned by configuration; the pipeline only touches
//!   `status` and `last_checked`
//! - [`ProbeResult`] is written once and never updated
//! - [`Incident`] is created open and closed exactly once
//! - [`DailySummary`] is created or overwritten per `(target, date)`

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Format used for calendar dates in storage and the API
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Last observed state of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    /// Never probed (or state lost)
    Unknown,
    Up,
    Down,
}

impl TargetStatus {
    pub fn from_is_up(is_up: bool) -> Self {
        if is_up {
            TargetStatus::Up
        } else {
            TargetStatus::Down
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Unknown => "unknown",
            TargetStatus::Up => "up",
            TargetStatus::Down => "down",
        }
    }

    /// Parse the database representation, falling back to `Unknown`
    pub fn parse(value: &str) -> Self {
        match value {
            "up" => TargetStatus::Up,
            "down" => TargetStatus::Down,
            _ => TargetStatus::Unknown,
        }
    }
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One monitored HTTP endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Unique identity of the target
    pub name: String,

    pub url: String,

    /// Disabled targets are kept but never probed
    pub enabled: bool,

    pub status: TargetStatus,

    pub last_checked: Option<DateTime<Utc>>,
}

impl Target {
    /// A freshly configured, enabled target that has never been probed
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled: true,
            status: TargetStatus::Unknown,
            last_checked: None,
        }
    }
}

/// Outcome of a single probe
///
/// `is_up` is true iff the request did not fail at the transport layer and
/// the status code is in `[200, 400)`. Transport failures carry
/// `http_status = 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub target: String,

    /// When the probe was started
    pub timestamp: DateTime<Utc>,

    pub http_status: u16,

    pub is_up: bool,

    /// Wall-clock time until response headers (or the error)
    pub latency_ms: u64,

    pub error_message: Option<String>,
}

impl ProbeResult {
    /// Whether this result counts as a successful check for aggregation
    ///
    /// Stricter than `is_up`: redirects are up but not successful.
    pub fn is_successful(&self) -> bool {
        self.is_up && (200..300).contains(&self.http_status)
    }
}

/// A contiguous span of downtime for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,

    pub target: String,

    pub start_time: DateTime<Utc>,

    /// `None` while the incident is ongoing
    pub end_time: Option<DateTime<Utc>>,

    /// Whole seconds between start and end, 0 while open
    pub duration_seconds: i64,

    pub note: Option<String>,
}

impl Incident {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Seconds of this incident that fall inside `[window_start, window_end)`
    ///
    /// Open incidents are treated as lasting until `now`.
    pub fn overlap_seconds(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> i64 {
        let end = self.end_time.unwrap_or(now);
        let start = self.start_time.max(window_start);
        let end = end.min(window_end);

        if end <= start {
            return 0;
        }

        (end - start).num_seconds()
    }
}

/// Per target, per day uptime aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub target: String,
    pub date: NaiveDate,
    pub total_checks: u64,
    pub successful_checks: u64,
    pub failed_checks: u64,
    pub uptime_percentage: f64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub downtime_minutes: i64,
    pub incident_count: u64,
}

/// Latency statistics for one hour of probe results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyBucket {
    /// Start of the hour
    pub hour: DateTime<Utc>,
    pub count: u64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
}

/// Record of a notification emitted for a transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLog {
    pub target: String,

    /// Delivery channel (e.g. "dashboard", "webhook")
    pub kind: String,

    pub message: String,

    /// "error" for outages, "success" for recoveries
    pub severity: String,

    pub sent_at: DateTime<Utc>,

    /// "sent" or "failed"
    pub status: String,
}

/// Audit trail entry for system and admin actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// e.g. "incident_started", "target_created"
    pub action: String,

    pub entity_type: String,

    pub entity_id: String,

    /// JSON payload describing the change
    pub new_value: Option<serde_json::Value>,

    /// Who performed the action ("system" for the pipeline)
    pub actor: String,

    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Entry attributed to the pipeline itself
    pub fn system(
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl ToString,
        new_value: serde_json::Value,
    ) -> Self {
        Self {
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.to_string(),
            new_value: Some(new_value),
            actor: "system".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Start of the UTC day containing `instant`
pub fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    day_bounds(instant.date_naive()).0
}

/// Half-open `[start, end)` bounds of a UTC calendar day
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}
