//! MaintenanceActor - Daily aggregation and retention cleanup
//!
//! A single loop ticks once per minute and checks two independent daily
//! trigger times. A trigger fires when `0 <= now - today@HH:MM < tick`, and
//! the date it last fired on is remembered so it never fires twice on the
//! same day. Jobs run inline on the actor loop, so two jobs never overlap.
//! Windows missed while the process was down are not caught up.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, warn};

use crate::analytics::{AggregationReport, Analytics, CleanupReport};
use crate::config::MaintenanceConfig;
use crate::storage::AuditEntry;

use super::messages::{MaintenanceCommand, MaintenanceStatus};

/// Default scheduler resolution
pub const MAINTENANCE_TICK: Duration = Duration::from_secs(60);

/// Whether a daily trigger at `at` falls into the tick that started at `now`
pub fn is_time_to_run(now: DateTime<Utc>, at: NaiveTime, tick: Duration) -> bool {
    let scheduled = now.date_naive().and_time(at).and_utc();
    let Ok(tick) = chrono::Duration::from_std(tick) else {
        return false;
    };

    let diff = now - scheduled;
    diff >= chrono::Duration::zero() && diff < tick
}

pub struct MaintenanceActor {
    analytics: Analytics,

    config: MaintenanceConfig,

    retention_days: u32,

    tick: Duration,

    command_rx: mpsc::Receiver<MaintenanceCommand>,

    /// Day the scheduled aggregation last fired
    aggregation_fired_on: Option<NaiveDate>,

    /// Day the scheduled cleanup last fired
    cleanup_fired_on: Option<NaiveDate>,

    last_aggregation: Option<DateTime<Utc>>,

    last_cleanup: Option<DateTime<Utc>>,
}

impl MaintenanceActor {
    pub fn new(
        analytics: Analytics,
        config: MaintenanceConfig,
        retention_days: u32,
        tick: Duration,
        command_rx: mpsc::Receiver<MaintenanceCommand>,
    ) -> Self {
        Self {
            analytics,
            config,
            retention_days,
            tick,
            command_rx,
            aggregation_fired_on: None,
            cleanup_fired_on: None,
            last_aggregation: None,
            last_cleanup: None,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        info!(
            "maintenance scheduler started (aggregation {} at {}, cleanup {} at {}, retention {} days)",
            on_off(self.config.daily_aggregation),
            self.config.aggregation_time.format("%H:%M"),
            on_off(self.config.data_cleanup),
            self.config.cleanup_time.format("%H:%M"),
            self.retention_days
        );

        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.on_tick(Utc::now()).await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        MaintenanceCommand::AggregateDate { date, respond_to } => {
                            let result = self.aggregate(date, "admin").await;
                            let _ = respond_to.send(result);
                        }

                        MaintenanceCommand::RunCleanup { respond_to } => {
                            let result = self.cleanup().await;
                            let _ = respond_to.send(result);
                        }

                        MaintenanceCommand::GetStatus { respond_to } => {
                            let _ = respond_to.send(self.status());
                        }

                        MaintenanceCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("maintenance actor stopped");
    }

    /// Fire whichever daily jobs are due at `now`
    pub async fn on_tick(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();

        if self.config.daily_aggregation
            && self.aggregation_fired_on != Some(today)
            && is_time_to_run(now, self.config.aggregation_time, self.tick)
        {
            self.aggregation_fired_on = Some(today);
            if let Some(yesterday) = today.pred_opt() {
                info!("running scheduled daily aggregation for {yesterday}");
                if let Err(e) = self.aggregate(yesterday, "system").await {
                    error!("daily aggregation failed: {e:#}");
                }
            }
        }

        if self.config.data_cleanup
            && self.cleanup_fired_on != Some(today)
            && is_time_to_run(now, self.config.cleanup_time, self.tick)
        {
            self.cleanup_fired_on = Some(today);
            info!("running scheduled data cleanup");
            if let Err(e) = self.cleanup().await {
                error!("data cleanup aborted: {e:#}");
            }
        }
    }

    async fn aggregate(&mut self, date: NaiveDate, actor: &str) -> Result<AggregationReport> {
        let report = self.analytics.generate_daily_summaries_for_all(date).await?;
        self.last_aggregation = Some(Utc::now());

        if actor != "system" {
            let mut entry = AuditEntry::system(
                "summary_generated",
                "daily_summary",
                date,
                json!({ "generated": report.generated, "skipped": report.skipped }),
            );
            entry.actor = actor.to_string();
            if let Err(e) = self.analytics.store().insert_audit_entry(&entry).await {
                error!("failed to write audit entry: {e}");
            }
        }

        Ok(report)
    }

    async fn cleanup(&mut self) -> Result<CleanupReport> {
        let report = self.analytics.cleanup_old_data(self.retention_days).await?;
        self.last_cleanup = Some(Utc::now());
        Ok(report)
    }

    pub fn status(&self) -> MaintenanceStatus {
        MaintenanceStatus {
            running: true,
            daily_aggregation: self.config.daily_aggregation,
            data_cleanup: self.config.data_cleanup,
            aggregation_time: self.config.aggregation_time,
            cleanup_time: self.config.cleanup_time,
            retention_days: self.retention_days,
            last_aggregation: self.last_aggregation,
            last_cleanup: self.last_cleanup,
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

/// Handle for controlling a MaintenanceActor
#[derive(Clone)]
pub struct MaintenanceHandle {
    sender: mpsc::Sender<MaintenanceCommand>,
}

impl MaintenanceHandle {
    pub fn spawn(analytics: Analytics, config: MaintenanceConfig, retention_days: u32) -> Self {
        Self::spawn_with_tick(analytics, config, retention_days, MAINTENANCE_TICK)
    }

    pub fn spawn_with_tick(
        analytics: Analytics,
        config: MaintenanceConfig,
        retention_days: u32,
        tick: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let actor = MaintenanceActor::new(analytics, config, retention_days, tick, cmd_rx);

        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Aggregate `date` for every target (idempotent)
    pub async fn aggregate_date(&self, date: NaiveDate) -> Result<AggregationReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MaintenanceCommand::AggregateDate {
                date,
                respond_to: tx,
            })
            .await?;

        rx.await?
    }

    pub async fn run_cleanup_now(&self) -> Result<CleanupReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MaintenanceCommand::RunCleanup { respond_to: tx })
            .await?;

        rx.await?
    }

    pub async fn status(&self) -> Result<MaintenanceStatus> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MaintenanceCommand::GetStatus { respond_to: tx })
            .await?;

        Ok(rx.await?)
    }

    pub async fn shutdown(self) {
        let _ = self.sender.send(MaintenanceCommand::Shutdown).await;
    }
}
