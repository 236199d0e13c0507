//! Incident ledger
//!
//! Turns transitions into durable incident rows. The ledger itself holds no
//! state; the store guarantees that a target never has two open incidents,
//! so two overlapping rounds reporting the same outage collapse into one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::storage::{AuditEntry, Incident, QueryRange, StorageBackend, StorageResult};

use super::transition::Transition;

/// Aggregate view over the incidents of one target in a window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncidentStats {
    pub count: u64,

    /// Downtime inside the window, open incidents counted until now
    pub total_downtime_seconds: i64,

    /// Mean duration of closed incidents
    pub mttr_seconds: Option<f64>,

    /// Longest closed incident
    pub longest_seconds: Option<i64>,
}

#[derive(Clone)]
pub struct IncidentLedger {
    store: Arc<dyn StorageBackend>,
}

impl IncidentLedger {
    pub fn new(store: Arc<dyn StorageBackend>) -> Self {
        Self { store }
    }

    /// Apply a detected transition
    pub async fn apply(
        &self,
        target: &str,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<Incident>> {
        match transition {
            Transition::WentDown => self.open(target, at).await,
            Transition::Recovered => self.close(target, at).await,
        }
    }

    /// Open an incident unless one is already open
    #[instrument(skip(self, at))]
    pub async fn open(&self, target: &str, at: DateTime<Utc>) -> StorageResult<Option<Incident>> {
        let Some(incident) = self.store.open_incident(target, at).await? else {
            warn!("{target}: went down but an incident is already open, keeping it");
            return Ok(None);
        };

        info!("{target}: incident #{} started", incident.id);
        self.audit(AuditEntry::system(
            "incident_started",
            "incident",
            incident.id,
            json!({ "target": target, "start_time": incident.start_time }),
        ))
        .await;

        Ok(Some(incident))
    }

    /// Close the open incident, if there is one
    #[instrument(skip(self, at))]
    pub async fn close(&self, target: &str, at: DateTime<Utc>) -> StorageResult<Option<Incident>> {
        let Some(incident) = self.store.close_incident(target, at).await? else {
            warn!("{target}: recovered without an open incident");
            return Ok(None);
        };

        info!(
            "{target}: incident #{} resolved after {}s",
            incident.id, incident.duration_seconds
        );
        self.audit(AuditEntry::system(
            "incident_closed",
            "incident",
            incident.id,
            json!({
                "target": target,
                "end_time": incident.end_time,
                "duration_seconds": incident.duration_seconds,
            }),
        ))
        .await;

        Ok(Some(incident))
    }

    pub async fn ongoing(&self, target: &str) -> StorageResult<Option<Incident>> {
        self.store.ongoing_incident(target).await
    }

    /// Incidents overlapping `[start, end)`
    pub async fn by_date_range(
        &self,
        target: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Incident>> {
        self.store
            .query_incidents(QueryRange::new(target, start, end))
            .await
    }

    pub async fn stats(
        &self,
        target: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<IncidentStats> {
        let incidents = self.by_date_range(target, start, end).await?;
        Ok(summarize(&incidents, start, end, Utc::now()))
    }

    async fn audit(&self, entry: AuditEntry) {
        if let Err(e) = self.store.insert_audit_entry(&entry).await {
            error!("failed to write audit entry '{}': {e}", entry.action);
        } else {
            debug!("audit: {}", entry.action);
        }
    }
}

/// Reduce a set of incidents to window statistics
pub fn summarize(
    incidents: &[Incident],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> IncidentStats {
    let total_downtime_seconds = incidents
        .iter()
        .map(|i| i.overlap_seconds(start, end, now))
        .sum();

    let closed: Vec<i64> = incidents
        .iter()
        .filter(|i| !i.is_open())
        .map(|i| i.duration_seconds)
        .collect();

    let mttr_seconds =
        (!closed.is_empty()).then(|| closed.iter().sum::<i64>() as f64 / closed.len() as f64);

    IncidentStats {
        count: incidents.len() as u64,
        total_downtime_seconds,
        mttr_seconds,
        longest_seconds: closed.iter().copied().max(),
    }
}
