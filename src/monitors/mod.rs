//! Building blocks of the probe-to-incident pipeline
//!
//! - [`probe::Prober`]: one HTTP GET, always yields a result
//! - [`transition::TransitionDetector`]: per-target up/down state machine
//! - [`incidents::IncidentLedger`]: opens and closes incidents on transitions
//! - [`status::StatusBoard`]: latest round snapshot for dashboards

pub mod incidents;
pub mod probe;
pub mod status;
pub mod transition;

pub use incidents::{IncidentLedger, IncidentStats};
pub use probe::Prober;
pub use status::{StatusBoard, StatusEntry};
pub use transition::{Observation, Transition, TransitionDetector};
