//! NotifierActor - Records and forwards transition events
//!
//! Subscribes to the transition broadcast. Every event yields a
//! `dashboard` notification log row; when a webhook is configured the event
//! is also posted there as JSON and the delivery outcome is logged as a
//! `webhook` row.

use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

use crate::config::Webhook;
use crate::monitors::Transition;
use crate::storage::{NotificationLog, StorageBackend};

use super::messages::{NotifierCommand, NotifierStats, TransitionEvent};

pub struct NotifierActor {
    store: Arc<dyn StorageBackend>,

    webhook: Option<Webhook>,

    client: Client,

    command_rx: mpsc::Receiver<NotifierCommand>,

    event_rx: broadcast::Receiver<TransitionEvent>,

    stats: NotifierStats,
}

/// Human readable line for an event
pub fn format_message(event: &TransitionEvent) -> String {
    match event.transition {
        Transition::WentDown => {
            let reason = match (&event.error_message, event.status_code) {
                (Some(err), _) => err.clone(),
                (None, code) => format!("status code {code}"),
            };
            format!("{} is down: {}", event.target, reason)
        }
        Transition::Recovered => format!(
            "{} is back up (status {}, {} ms)",
            event.target, event.status_code, event.latency_ms
        ),
    }
}

fn severity(transition: Transition) -> &'static str {
    match transition {
        Transition::WentDown => "error",
        Transition::Recovered => "success",
    }
}

impl NotifierActor {
    pub fn new(
        store: Arc<dyn StorageBackend>,
        webhook: Option<Webhook>,
        command_rx: mpsc::Receiver<NotifierCommand>,
        event_rx: broadcast::Receiver<TransitionEvent>,
    ) -> Self {
        Self {
            store,
            webhook,
            client: Client::new(),
            command_rx,
            event_rx,
            stats: NotifierStats::default(),
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting notifier actor");

        loop {
            tokio::select! {
                result = self.event_rx.recv() => {
                    match result {
                        Ok(event) => self.handle_event(event).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("notifier lagged, skipped {skipped} transition events");
                            self.stats.lagged += skipped;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("transition channel closed, shutting down");
                            break;
                        }
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        NotifierCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats.clone());
                        }

                        NotifierCommand::Shutdown => {
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

        debug!("notifier actor stopped");
    }

    #[instrument(skip(self, event), fields(target = %event.target))]
    async fn handle_event(&mut self, event: TransitionEvent) {
        self.stats.received += 1;

        let message = format_message(&event);
        info!("{message}");

        self.record("dashboard", &event, &message, "sent").await;

        let Some(webhook) = self.webhook.clone() else {
            return;
        };

        let status = if self.send_webhook(&webhook, &event, &message).await {
            "sent"
        } else {
            self.stats.webhook_failures += 1;
            "failed"
        };
        self.record("webhook", &event, &message, status).await;
    }

    async fn record(&mut self, kind: &str, event: &TransitionEvent, message: &str, status: &str) {
        let log = NotificationLog {
            target: event.target.clone(),
            kind: kind.to_string(),
            message: message.to_string(),
            severity: severity(event.transition).to_string(),
            sent_at: Utc::now(),
            status: status.to_string(),
        };

        match self.store.insert_notification(&log).await {
            Ok(_) => self.stats.recorded += 1,
            Err(e) => error!("failed to record notification: {e}"),
        }
    }

    async fn send_webhook(&self, webhook: &Webhook, event: &TransitionEvent, message: &str) -> bool {
        let payload = json!({
            "message": message,
            "event": event,
            "timestamp": Utc::now().to_rfc3339()
        });

        match self.client.post(&webhook.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("webhook delivered");
                true
            }
            Ok(response) => {
                error!("webhook failed with status: {}", response.status());
                false
            }
            Err(e) => {
                error!("failed to send webhook: {e}");
                false
            }
        }
    }
}

/// Handle for controlling a NotifierActor
#[derive(Clone)]
pub struct NotifierHandle {
    sender: mpsc::Sender<NotifierCommand>,
}

impl NotifierHandle {
    pub fn spawn(
        store: Arc<dyn StorageBackend>,
        webhook: Option<Webhook>,
        event_rx: broadcast::Receiver<TransitionEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let actor = NotifierActor::new(store, webhook, cmd_rx, event_rx);

        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    pub async fn stats(&self) -> Option<NotifierStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(NotifierCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(NotifierCommand::Shutdown).await;
    }
}
