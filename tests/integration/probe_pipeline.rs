//! End-to-end probe rounds against a mock HTTP server

use crate::helpers::{memory_store, probe_round};
use assert_matches::assert_matches;
use std::time::Duration;
use watchdog::actors::dispatcher::{ProbeRound, process_round};
use watchdog::context::MonitorContext;
use watchdog::monitors::{Prober, Transition};
use watchdog::storage::{QueryRange, StorageBackend, Target, TargetStatus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn respond_with(server: &MockServer, status: u16) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_outage_opens_and_recovery_closes_one_incident() {
    let server = MockServer::start().await;
    let store = memory_store();
    let target = Target::new("api", format!("{}/health", server.uri()));
    store.insert_target(&target).await.unwrap();

    let ctx = MonitorContext::new(store.clone());
    let mut events = ctx.subscribe();
    let round = probe_round();
    let targets = vec![target];

    // baseline
    respond_with(&server, 200).await;
    let report = process_round(&ctx, 1, round.run(&targets).await).await;
    assert_eq!(report.up, 1);
    assert_eq!(report.transitions, 0);
    assert!(events.try_recv().is_err());

    // two failing rounds: only the first one is a transition
    respond_with(&server, 503).await;
    let report = process_round(&ctx, 2, round.run(&targets).await).await;
    assert_eq!(report.transitions, 1);
    let report = process_round(&ctx, 3, round.run(&targets).await).await;
    assert_eq!(report.transitions, 0);

    let event = events.try_recv().unwrap();
    assert_eq!(event.transition, Transition::WentDown);
    assert_eq!(event.previous_state, TargetStatus::Up);
    assert_eq!(event.status_code, 503);
    assert!(events.try_recv().is_err());

    assert!(store.ongoing_incident("api").await.unwrap().is_some());
    assert_eq!(
        store.get_target("api").await.unwrap().unwrap().status,
        TargetStatus::Down
    );

    respond_with(&server, 200).await;
    let report = process_round(&ctx, 4, round.run(&targets).await).await;
    assert_eq!(report.transitions, 1);
    assert_eq!(events.try_recv().unwrap().transition, Transition::Recovered);

    assert!(store.ongoing_incident("api").await.unwrap().is_none());
    let now = chrono::Utc::now();
    let incidents = store
        .query_incidents(QueryRange::new("api", now - chrono::Duration::hours(1), now))
        .await
        .unwrap();
    assert_eq!(incidents.len(), 1);
    assert!(!incidents[0].is_open());
    assert!(incidents[0].duration_seconds >= 0);

    // every round persisted one result
    let window = QueryRange::new(
        "api",
        now - chrono::Duration::hours(1),
        now + chrono::Duration::seconds(1),
    );
    let results = store.query_probe_results(window).await.unwrap();
    assert_eq!(results.len(), 4);
}

#[tokio::test]
async fn test_hung_target_does_not_stall_the_round() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let targets = vec![
        Target::new("slow", format!("{}/slow", server.uri())),
        Target::new("fast", format!("{}/fast", server.uri())),
    ];
    let prober = Prober::new(Duration::from_secs(10)).unwrap();
    let round = ProbeRound::new(prober, 2, Duration::from_millis(500));

    let started = std::time::Instant::now();
    let outcome = round.run(&targets).await;
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(outcome.results.len(), 1);
    let (fast, result) = &outcome.results[0];
    assert_eq!(fast.name, "fast");
    assert!(result.is_up);

    assert_eq!(outcome.cut_off.len(), 1);
    assert_eq!(outcome.cut_off[0].name, "slow");
}

#[tokio::test]
async fn test_unreachable_target_is_recorded_down() {
    let store = memory_store();
    let ctx = MonitorContext::new(store.clone());
    // nothing listens on port 9 of the loopback in test environments
    let targets = vec![Target::new("gone", "http://127.0.0.1:9/")];

    let report = process_round(&ctx, 1, probe_round().run(&targets).await).await;
    assert_eq!(report.down, 1);

    let latest = store.latest_probe_results().await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_matches!(latest[0].http_status, 0);
    assert!(latest[0].error_message.is_some());
}

#[tokio::test]
async fn test_restart_seeds_previous_state() {
    let server = MockServer::start().await;
    let store = memory_store();
    let target = Target::new("api", format!("{}/health", server.uri()));
    store.insert_target(&target).await.unwrap();
    let targets = vec![target];

    respond_with(&server, 200).await;
    let first = MonitorContext::new(store.clone());
    process_round(&first, 1, probe_round().run(&targets).await).await;

    // a fresh context seeded from the store sees the outage as a transition
    let second = MonitorContext::new(store.clone());
    assert_eq!(second.seed_from_store().await.unwrap(), 1);
    let mut events = second.subscribe();

    respond_with(&server, 500).await;
    let report = process_round(&second, 1, probe_round().run(&targets).await).await;
    assert_eq!(report.transitions, 1);
    assert_eq!(events.try_recv().unwrap().transition, Transition::WentDown);
}
