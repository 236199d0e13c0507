//! Transition detection feeding the incident ledger

use crate::helpers::{at, memory_store, with_targets};
use assert_matches::assert_matches;
use watchdog::monitors::{IncidentLedger, Observation, Transition, TransitionDetector};
use watchdog::storage::{QueryRange, StorageBackend, TargetStatus};

/// Drive detector and ledger the way the dispatcher does, with a fixed clock
async fn feed(
    detector: &TransitionDetector,
    ledger: &IncidentLedger,
    target: &str,
    samples: &[(bool, chrono::DateTime<chrono::Utc>)],
) -> Vec<Transition> {
    let mut transitions = vec![];
    for (is_up, when) in samples {
        if let Some(transition) = detector.observe(target, *is_up, *when).await.transition() {
            ledger.apply(target, transition, *when).await.unwrap();
            transitions.push(transition);
        }
    }
    transitions
}

#[tokio::test]
async fn test_up_down_up_creates_and_closes_one_incident() {
    let store = memory_store();
    with_targets(&store, &["api"]).await;
    let detector = TransitionDetector::new();
    let ledger = IncidentLedger::new(store.clone());

    let transitions = feed(
        &detector,
        &ledger,
        "api",
        &[
            (true, at(2, 10, 0, 0)),
            (false, at(2, 10, 1, 0)),
            (true, at(2, 10, 2, 30)),
        ],
    )
    .await;
    assert_eq!(transitions, vec![Transition::WentDown, Transition::Recovered]);

    let incidents = store
        .query_incidents(QueryRange::new("api", at(2, 0, 0, 0), at(3, 0, 0, 0)))
        .await
        .unwrap();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].start_time, at(2, 10, 1, 0));
    assert_eq!(incidents[0].end_time, Some(at(2, 10, 2, 30)));
    assert_eq!(incidents[0].duration_seconds, 90);

    let actions: Vec<String> = store
        .recent_audit_entries(10)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert!(actions.contains(&"incident_started".to_string()));
    assert!(actions.contains(&"incident_closed".to_string()));
}

#[tokio::test]
async fn test_consecutive_downs_emit_one_event() {
    let store = memory_store();
    let detector = TransitionDetector::new();
    let ledger = IncidentLedger::new(store.clone());

    let transitions = feed(
        &detector,
        &ledger,
        "api",
        &[
            (true, at(2, 10, 0, 0)),
            (false, at(2, 10, 1, 0)),
            (false, at(2, 10, 2, 0)),
            (false, at(2, 10, 3, 0)),
        ],
    )
    .await;

    assert_eq!(transitions, vec![Transition::WentDown]);
    assert_eq!(detector.state_of("api").await, TargetStatus::Down);
    assert!(ledger.ongoing("api").await.unwrap().is_some());
}

#[tokio::test]
async fn test_first_observation_down_opens_nothing() {
    let store = memory_store();
    let detector = TransitionDetector::new();
    let ledger = IncidentLedger::new(store.clone());

    let transitions = feed(&detector, &ledger, "api", &[(false, at(2, 10, 0, 0))]).await;

    assert!(transitions.is_empty());
    assert!(ledger.ongoing("api").await.unwrap().is_none());
}

#[tokio::test]
async fn test_stale_observation_is_ignored() {
    let detector = TransitionDetector::new();
    detector.observe("api", true, at(2, 10, 5, 0)).await;

    let late = detector.observe("api", false, at(2, 10, 0, 0)).await;
    assert_matches!(late, Observation::Stale);
    assert_eq!(detector.state_of("api").await, TargetStatus::Up);
}

#[tokio::test]
async fn test_concurrent_opens_keep_one_incident() {
    let store = memory_store();
    let ledger = IncidentLedger::new(store.clone());

    let mut tasks = vec![];
    for i in 0..10 {
        let ledger = ledger.clone();
        tasks.push(tokio::spawn(async move {
            ledger.open("api", at(2, 10, 0, i)).await.unwrap()
        }));
    }

    let mut opened = 0;
    for task in tasks {
        if task.await.unwrap().is_some() {
            opened += 1;
        }
    }
    assert_eq!(opened, 1);

    let incidents = store
        .query_incidents(QueryRange::new("api", at(2, 0, 0, 0), at(3, 0, 0, 0)))
        .await
        .unwrap();
    assert_eq!(incidents.len(), 1);
}

#[tokio::test]
async fn test_stats_over_window() {
    let store = memory_store();
    let ledger = IncidentLedger::new(store.clone());

    ledger.open("api", at(2, 1, 0, 0)).await.unwrap();
    ledger.close("api", at(2, 1, 1, 0)).await.unwrap();
    ledger.open("api", at(2, 5, 0, 0)).await.unwrap();
    ledger.close("api", at(2, 5, 3, 0)).await.unwrap();

    let stats = ledger
        .stats("api", at(2, 0, 0, 0), at(3, 0, 0, 0))
        .await
        .unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.total_downtime_seconds, 240);
    assert_eq!(stats.mttr_seconds, Some(120.0));
    assert_eq!(stats.longest_seconds, Some(180));
}
