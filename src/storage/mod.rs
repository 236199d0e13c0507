//! Storage backends for uptime history
//!
//! This module provides a trait-based abstraction over the result store:
//! targets, probe results, incidents, daily summaries, and the notification
//! and audit logs.
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` trait allows swapping implementations
//! - **Async**: All operations are async for compatibility with Tokio actors
//! - **Serializing**: The backend is the single point where concurrent
//!   writers (overlapping probe rounds, maintenance, API) meet
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database with migrations
//! - **In-Memory** (fallback): No persistence, for testing or `backend: none`
//!
//! ## Usage
//!
//! ```no_run
//! use watchdog::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./watchdog.db").await?;
//!     println!("{}", backend.get_stats().await?);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, QueryRange, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use schema::{
    AuditEntry, DailySummary, Incident, LatencyBucket, NotificationLog, ProbeResult, Target,
    TargetStatus,
};
