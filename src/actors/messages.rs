//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to specific actors via mpsc
//! 2. **Events**: Broadcast notifications published to multiple subscribers
//! 3. **Immutability**: All messages are cloneable for multi-subscriber patterns

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::analytics::{AggregationReport, CleanupReport};
use crate::monitors::Transition;
use crate::storage::schema::{Target, TargetStatus};

/// Event published when a target goes down or recovers
///
/// Only real transitions are broadcast; baseline and unchanged observations
/// never produce an event. Slow subscribers may lag and drop events, the
/// incident ledger remains the durable record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub target: String,

    pub url: String,

    pub transition: Transition,

    pub previous_state: TargetStatus,

    pub new_state: TargetStatus,

    pub latency_ms: u64,

    /// 0 when the request failed at the transport layer
    pub status_code: u16,

    pub error_message: Option<String>,

    /// Timestamp of the probe that caused the transition
    pub timestamp: DateTime<Utc>,
}

/// Commands that can be sent to the DispatcherActor
#[derive(Debug)]
pub enum DispatcherCommand {
    /// Run a round immediately and wait until it is fully processed
    RunNow {
        respond_to: oneshot::Sender<RoundReport>,
    },

    /// Replace the set of targets probed from the next round on
    UpdateTargets { targets: Vec<Target> },

    /// Gracefully shut down the dispatcher
    ///
    /// Rounds already spawned finish their persistence in the background.
    Shutdown,
}

/// Outcome of one processed probe round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    pub round: u64,

    pub total: usize,

    pub up: usize,

    pub down: usize,

    /// Probes cut off by the round deadline
    pub timed_out: usize,

    /// Transitions detected in this round
    pub transitions: usize,
}

/// Commands that can be sent to the MaintenanceActor
#[derive(Debug)]
pub enum MaintenanceCommand {
    /// Aggregate an explicit date right away
    AggregateDate {
        date: NaiveDate,
        respond_to: oneshot::Sender<anyhow::Result<AggregationReport>>,
    },

    /// Run retention cleanup right away
    RunCleanup {
        respond_to: oneshot::Sender<anyhow::Result<CleanupReport>>,
    },

    GetStatus {
        respond_to: oneshot::Sender<MaintenanceStatus>,
    },

    Shutdown,
}

/// Configuration and last-run information of the maintenance actor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceStatus {
    pub running: bool,

    pub daily_aggregation: bool,

    pub data_cleanup: bool,

    pub aggregation_time: NaiveTime,

    pub cleanup_time: NaiveTime,

    pub retention_days: u32,

    pub last_aggregation: Option<DateTime<Utc>>,

    pub last_cleanup: Option<DateTime<Utc>>,
}

/// Commands that can be sent to the NotifierActor
#[derive(Debug)]
pub enum NotifierCommand {
    GetStats {
        respond_to: oneshot::Sender<NotifierStats>,
    },

    /// Gracefully shut down the notifier
    Shutdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotifierStats {
    /// Transition events received
    pub received: u64,

    /// Notification log rows written
    pub recorded: u64,

    /// Webhook posts that failed
    pub webhook_failures: u64,

    /// Events dropped because the subscriber lagged
    pub lagged: u64,
}
