//! Shared state handed to every route

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::actors::maintenance::MaintenanceHandle;
use crate::analytics::Analytics;
use crate::monitors::StatusBoard;
use crate::storage::StorageBackend;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn StorageBackend>,

    pub analytics: Analytics,

    /// Latest-round snapshot written by the dispatcher
    pub status: StatusBoard,

    pub maintenance: MaintenanceHandle,

    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(
        store: Arc<dyn StorageBackend>,
        status: StatusBoard,
        maintenance: MaintenanceHandle,
    ) -> Self {
        Self {
            analytics: Analytics::new(store.clone()),
            store,
            status,
            maintenance,
            started_at: Utc::now(),
        }
    }
}
