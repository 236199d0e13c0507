//! Up/down transition detection
//!
//! Every target moves through a tiny state machine:
//!
//! ```text
//! Unknown ──(any)──▶ Up | Down      baseline, no event
//! Up ──(down)──▶ Down               WentDown
//! Down ──(up)──▶ Up                 Recovered
//! ```
//!
//! The detector remembers the last observation per target for the lifetime
//! of the process and can be seeded from persisted results at startup so a
//! restart does not swallow the first transition.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::storage::schema::{ProbeResult, TargetStatus};

/// A change of state worth acting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    WentDown,
    Recovered,
}

/// Outcome of feeding one probe result to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First observation of this target, recorded without an event
    Baseline,

    /// Same state as before
    Unchanged,

    /// The state flipped
    Changed {
        previous: TargetStatus,
        transition: Transition,
    },

    /// Older than the last recorded observation, ignored
    Stale,
}

impl Observation {
    pub fn transition(&self) -> Option<Transition> {
        match self {
            Observation::Changed { transition, .. } => Some(*transition),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LastSeen {
    is_up: bool,
    at: DateTime<Utc>,
}

/// Per-target state memory guarded by a single lock
#[derive(Debug, Default)]
pub struct TransitionDetector {
    states: Mutex<HashMap<String, LastSeen>>,
}

impl TransitionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the most recent persisted state of each target
    ///
    /// Seeded targets start in `Up`/`Down` instead of `Unknown`, so the
    /// first live probe after a restart can already emit a transition.
    pub async fn seed(&self, latest: &[ProbeResult]) {
        let mut states = self.states.lock().await;
        for result in latest {
            states.insert(
                result.target.clone(),
                LastSeen {
                    is_up: result.is_up,
                    at: result.timestamp,
                },
            );
        }
        debug!("seeded transition detector with {} targets", latest.len());
    }

    /// Record an observation and report what changed
    pub async fn observe(&self, target: &str, is_up: bool, at: DateTime<Utc>) -> Observation {
        let mut states = self.states.lock().await;

        let Some(last) = states.get_mut(target) else {
            states.insert(target.to_string(), LastSeen { is_up, at });
            trace!("{target}: baseline state {}", TargetStatus::from_is_up(is_up));
            return Observation::Baseline;
        };

        if at < last.at {
            debug!("{target}: ignoring stale observation from {at}");
            return Observation::Stale;
        }

        let previous = last.is_up;
        *last = LastSeen { is_up, at };

        match (previous, is_up) {
            (true, false) => Observation::Changed {
                previous: TargetStatus::Up,
                transition: Transition::WentDown,
            },
            (false, true) => Observation::Changed {
                previous: TargetStatus::Down,
                transition: Transition::Recovered,
            },
            _ => Observation::Unchanged,
        }
    }

    /// Current state of a target as far as the detector knows
    pub async fn state_of(&self, target: &str) -> TargetStatus {
        self.states
            .lock()
            .await
            .get(target)
            .map(|last| TargetStatus::from_is_up(last.is_up))
            .unwrap_or(TargetStatus::Unknown)
    }
}
