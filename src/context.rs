//! Shared dependencies of the probe pipeline
//!
//! Everything the dispatcher needs to turn probe results into history is
//! bundled here and handed to it explicitly at spawn time.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::actors::messages::TransitionEvent;
use crate::monitors::{IncidentLedger, StatusBoard, TransitionDetector};
use crate::storage::{StorageBackend, StorageResult};

/// Capacity of the transition event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct MonitorContext {
    pub store: Arc<dyn StorageBackend>,
    pub detector: Arc<TransitionDetector>,
    pub ledger: IncidentLedger,
    pub status: StatusBoard,
    pub events: broadcast::Sender<TransitionEvent>,
}

impl MonitorContext {
    pub fn new(store: Arc<dyn StorageBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            ledger: IncidentLedger::new(store.clone()),
            store,
            detector: Arc::new(TransitionDetector::new()),
            status: StatusBoard::new(),
            events,
        }
    }

    /// Seed the transition detector from the latest persisted result of
    /// every target, returning how many targets were seeded
    pub async fn seed_from_store(&self) -> StorageResult<usize> {
        let latest = self.store.latest_probe_results().await?;
        self.detector.seed(&latest).await;
        info!("restored previous state for {} targets", latest.len());
        Ok(latest.len())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.events.subscribe()
    }
}
