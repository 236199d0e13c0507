//! Actor-based monitoring system
//!
//! Each actor runs as an independent async task and is driven through a
//! cloneable handle over Tokio channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │  watchdog (main) │
//!                  └────────┬─────────┘
//!                           │ spawns
//!          ┌────────────────┼─────────────────────┐
//!          │                │                     │
//!  ┌───────▼────────┐       │          ┌──────────▼──────────┐
//!  │ Dispatcher     │       │          │ Maintenance         │
//!  │ (probe rounds) │       │          │ (aggregate/cleanup) │
//!  └───────┬────────┘       │          └──────────┬──────────┘
//!          │ results        │                     │
//!          ▼                │                     ▼
//!   store → detector → ledger           ┌──────────────────┐
//!          │                            │  StorageBackend  │
//!          ▼                            └──────────────────┘
//!  ┌────────────────────┐
//!  │ Broadcast Channel  │ (transition events)
//!  └────────┬───────────┘
//!           │ subscribe
//!   ┌───────▼───────┐
//!   │ Notifier      │
//!   └───────────────┘
//! ```
//!
//! ## Actor Types
//!
//! - **DispatcherActor**: Probes every enabled target once per interval
//! - **NotifierActor**: Records transition events and forwards them to a webhook
//! - **MaintenanceActor**: Daily summaries and retention cleanup
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each actor has an mpsc command channel for control messages
//! 2. **Events**: Transitions are published on a broadcast channel
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod dispatcher;
pub mod maintenance;
pub mod messages;
pub mod notifier;
