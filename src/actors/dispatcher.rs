//! DispatcherActor - Runs probe rounds on a fixed interval
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → ProbeRound (bounded pool, deadline) → spawn round task
//!                                                      ├─ StatusBoard snapshot
//!                                                      └─ per result:
//!                                                         store result → detector → ledger → TransitionEvent
//!     ↑
//!     └─── Commands (RunNow, UpdateTargets, Shutdown)
//! ```
//!
//! Rounds, whether started by the tick or by `RunNow`, run in their own task,
//! so the tick is never delayed by a previous round's probing or
//! persistence. Overlapping rounds are safe: the store
//! serializes writers and the detector drops stale observations.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval, timeout_at};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::Settings;
use crate::context::MonitorContext;
use crate::monitors::{Observation, Prober, StatusEntry};
use crate::storage::schema::{ProbeResult, Target, TargetStatus};

use super::messages::{DispatcherCommand, RoundReport, TransitionEvent};

/// Dispatcher settings derived from the config file
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub workers: usize,
    pub round_deadline: Duration,
}

impl From<&Settings> for DispatcherConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            interval: Duration::from_secs(settings.check_interval_seconds.max(1)),
            timeout: Duration::from_secs(settings.timeout_seconds),
            workers: settings.max_concurrent_probes.max(1),
            round_deadline: Duration::from_secs(settings.round_deadline_seconds()),
        }
    }
}

/// Results of one round
///
/// Every target is in exactly one of the two lists.
#[derive(Debug)]
pub struct RoundOutcome {
    /// Completed probes
    pub results: Vec<(Target, ProbeResult)>,

    /// Targets whose probe had not completed when the deadline passed,
    /// including ones still waiting for a worker. They carry no observation.
    pub cut_off: Vec<Target>,
}

/// One concurrent pass over all targets
///
/// At most `workers` probes are in flight at once. When the deadline passes
/// the remaining probes are dropped and their targets reported as cut off.
#[derive(Clone)]
pub struct ProbeRound {
    prober: Prober,
    workers: usize,
    deadline: Duration,
}

impl ProbeRound {
    pub fn new(prober: Prober, workers: usize, deadline: Duration) -> Self {
        Self {
            prober,
            workers: workers.max(1),
            deadline,
        }
    }

    #[instrument(skip_all, fields(targets = targets.len()))]
    pub async fn run(&self, targets: &[Target]) -> RoundOutcome {
        let deadline = Instant::now() + self.deadline;

        let mut probes = stream::iter(targets.iter().cloned())
            .map(|target| {
                let prober = self.prober.clone();
                async move {
                    let result = prober.probe(&target.name, &target.url).await;
                    (target, result)
                }
            })
            .buffer_unordered(self.workers);

        let mut results = Vec::with_capacity(targets.len());
        loop {
            match timeout_at(deadline, probes.next()).await {
                Ok(Some(pair)) => results.push(pair),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "round deadline of {:?} exceeded with {} of {} probes done",
                        self.deadline,
                        results.len(),
                        targets.len()
                    );
                    break;
                }
            }
        }
        drop(probes);

        let finished: HashSet<&str> = results.iter().map(|(t, _)| t.name.as_str()).collect();
        let cut_off: Vec<Target> = targets
            .iter()
            .filter(|t| !finished.contains(t.name.as_str()))
            .cloned()
            .collect();

        if !cut_off.is_empty() {
            let names: Vec<&str> = cut_off.iter().map(|t| t.name.as_str()).collect();
            warn!("no result this round for: {}", names.join(", "));
        }

        RoundOutcome { results, cut_off }
    }
}

/// Persist one probe result and act on any transition it causes
///
/// Each step is attempted independently; a failing write is logged and the
/// remaining steps still run.
#[instrument(skip_all, fields(target = %target.name))]
pub async fn process_result(ctx: &MonitorContext, target: &Target, result: &ProbeResult) -> bool {
    if let Err(e) = ctx.store.insert_probe_result(result).await {
        error!("failed to store probe result: {e}");
    }

    if let Err(e) = ctx
        .store
        .update_target_status(
            &target.name,
            TargetStatus::from_is_up(result.is_up),
            result.timestamp,
        )
        .await
    {
        error!("failed to update target status: {e}");
    }

    let observation = ctx
        .detector
        .observe(&target.name, result.is_up, result.timestamp)
        .await;

    let Observation::Changed {
        previous,
        transition,
    } = observation
    else {
        trace!("observation: {observation:?}");
        return false;
    };

    info!("{}: {:?}", target.name, transition);

    if let Err(e) = ctx.ledger.apply(&target.name, transition, Utc::now()).await {
        error!("failed to record incident: {e}");
    }

    let event = TransitionEvent {
        target: target.name.clone(),
        url: target.url.clone(),
        transition,
        previous_state: previous,
        new_state: TargetStatus::from_is_up(result.is_up),
        latency_ms: result.latency_ms,
        status_code: result.http_status,
        error_message: result.error_message.clone(),
        timestamp: result.timestamp,
    };

    // no subscribers is not an error
    if ctx.events.send(event).is_err() {
        debug!("no subscribers for transition event");
    }

    true
}

/// Publish the round snapshot and process every completed result
///
/// Cut-off targets are neither stored nor observed; their previous status
/// entry, if any, is carried over to the new snapshot.
pub async fn process_round(ctx: &MonitorContext, round: u64, outcome: RoundOutcome) -> RoundReport {
    let previous = ctx.status.snapshot().await;
    let mut entries: Vec<StatusEntry> = outcome
        .results
        .iter()
        .map(|(target, result)| StatusEntry::from_result(&target.url, result))
        .collect();
    entries.extend(
        previous
            .into_iter()
            .filter(|e| outcome.cut_off.iter().any(|t| t.name == e.target)),
    );
    ctx.status.replace(entries).await;

    let mut report = RoundReport {
        round,
        total: outcome.results.len() + outcome.cut_off.len(),
        timed_out: outcome.cut_off.len(),
        ..Default::default()
    };

    for (target, result) in &outcome.results {
        if result.is_up {
            report.up += 1;
        } else {
            report.down += 1;
        }

        if process_result(ctx, target, result).await {
            report.transitions += 1;
        }
    }

    debug!(
        "round {round}: {} up, {} down, {} transitions",
        report.up, report.down, report.transitions
    );
    report
}

/// Actor that owns the probe schedule
pub struct DispatcherActor {
    ctx: MonitorContext,

    round: ProbeRound,

    /// All configured targets, disabled ones are skipped per round
    targets: Vec<Target>,

    interval_duration: Duration,

    command_rx: mpsc::Receiver<DispatcherCommand>,

    rounds: u64,
}

impl DispatcherActor {
    pub fn new(
        ctx: MonitorContext,
        round: ProbeRound,
        targets: Vec<Target>,
        interval_duration: Duration,
        command_rx: mpsc::Receiver<DispatcherCommand>,
    ) -> Self {
        Self {
            ctx,
            round,
            targets,
            interval_duration,
            command_rx,
            rounds: 0,
        }
    }

    fn enabled_targets(&self) -> Vec<Target> {
        self.targets.iter().filter(|t| t.enabled).cloned().collect()
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        info!(
            "starting dispatcher for {} targets every {:?}",
            self.targets.len(),
            self.interval_duration
        );

        let mut ticker = interval(self.interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.rounds += 1;
                    let round_no = self.rounds;
                    let targets = self.enabled_targets();
                    let round = self.round.clone();
                    let ctx = self.ctx.clone();

                    // probing and persistence run off the actor loop so the
                    // next tick is never delayed
                    tokio::spawn(async move {
                        let outcome = round.run(&targets).await;
                        process_round(&ctx, round_no, outcome).await;
                    });
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        DispatcherCommand::RunNow { respond_to } => {
                            debug!("received RunNow command");
                            self.rounds += 1;
                            let round_no = self.rounds;
                            let targets = self.enabled_targets();
                            let round = self.round.clone();
                            let ctx = self.ctx.clone();

                            tokio::spawn(async move {
                                let outcome = round.run(&targets).await;
                                let report = process_round(&ctx, round_no, outcome).await;
                                let _ = respond_to.send(report);
                            });
                        }

                        DispatcherCommand::UpdateTargets { targets } => {
                            debug!("updating target list ({} targets)", targets.len());
                            self.targets = targets;
                        }

                        DispatcherCommand::Shutdown => {
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

        debug!("dispatcher actor stopped");
    }
}

/// Handle for controlling a DispatcherActor
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<DispatcherCommand>,
}

impl DispatcherHandle {
    /// Spawn a new dispatcher actor
    pub fn spawn(ctx: MonitorContext, config: DispatcherConfig, targets: Vec<Target>) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let prober = Prober::new(config.timeout)?;
        let round = ProbeRound::new(prober, config.workers, config.round_deadline);
        let actor = DispatcherActor::new(ctx, round, targets, config.interval, cmd_rx);

        tokio::spawn(actor.run());

        Ok(Self { sender: cmd_tx })
    }

    /// Run a round now and wait for its report
    pub async fn run_now(&self) -> Result<RoundReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(DispatcherCommand::RunNow { respond_to: tx })
            .await?;

        Ok(rx.await?)
    }

    pub async fn update_targets(&self, targets: Vec<Target>) -> Result<()> {
        self.sender
            .send(DispatcherCommand::UpdateTargets { targets })
            .await?;
        Ok(())
    }

    /// Shut down the dispatcher
    pub async fn shutdown(self) {
        let _ = self.sender.send(DispatcherCommand::Shutdown).await;
    }
}
