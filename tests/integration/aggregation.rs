//! Daily summaries and retention cleanup

use std::sync::Arc;

use crate::helpers::{FaultyBackend, at, day, down, memory_store, up, with_targets};
use pretty_assertions::assert_eq;
use watchdog::analytics::Analytics;
use watchdog::storage::{
    NotificationLog, ProbeResult, QueryRange, StorageBackend, StorageError, Target,
};

async fn hundred_checks(store: &Arc<dyn StorageBackend>, target: &str) {
    for i in 0..100u32 {
        let when = at(2, i / 60, i % 60, 0);
        let result = if i < 95 {
            up(target, when, 100 + u64::from(i))
        } else {
            down(target, when)
        };
        store.insert_probe_result(&result).await.unwrap();
    }
}

#[tokio::test]
async fn test_ninety_five_of_hundred_is_95_percent() {
    let store = memory_store();
    with_targets(&store, &["api"]).await;
    hundred_checks(&store, "api").await;

    let analytics = Analytics::new(store.clone());
    let summary = analytics
        .generate_daily_summary("api", day(2))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.total_checks, 100);
    assert_eq!(summary.successful_checks, 95);
    assert_eq!(summary.failed_checks, 5);
    assert_eq!(summary.uptime_percentage, 95.0);
    assert_eq!(summary.min_latency_ms, 5);
    assert_eq!(summary.max_latency_ms, 194);

    let stored = store.get_daily_summary("api", day(2)).await.unwrap();
    assert_eq!(stored, Some(summary));
}

#[tokio::test]
async fn test_up_but_not_2xx_is_not_successful() {
    let store = memory_store();
    with_targets(&store, &["api"]).await;

    let mut redirect = up("api", at(2, 8, 0, 0), 30);
    redirect.http_status = 301;
    store.insert_probe_result(&redirect).await.unwrap();
    store
        .insert_probe_result(&up("api", at(2, 9, 0, 0), 30))
        .await
        .unwrap();

    let summary = Analytics::new(store.clone())
        .generate_daily_summary("api", day(2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.uptime_percentage, 50.0);
}

#[tokio::test]
async fn test_day_without_results_writes_no_row() {
    let store = memory_store();
    with_targets(&store, &["api", "quiet"]).await;
    hundred_checks(&store, "api").await;

    let analytics = Analytics::new(store.clone());
    assert!(
        analytics
            .generate_daily_summary("quiet", day(2))
            .await
            .unwrap()
            .is_none()
    );
    assert!(store.get_daily_summary("quiet", day(2)).await.unwrap().is_none());

    let report = analytics.generate_daily_summaries_for_all(day(2)).await.unwrap();
    assert_eq!(report.targets, 2);
    assert_eq!(report.generated, 1);
    assert_eq!(report.skipped, 1);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_rerun_overwrites_summary() {
    let store = memory_store();
    with_targets(&store, &["api"]).await;
    store
        .insert_probe_result(&up("api", at(2, 1, 0, 0), 10))
        .await
        .unwrap();

    let analytics = Analytics::new(store.clone());
    analytics.generate_daily_summary("api", day(2)).await.unwrap();

    // a late result arrives, the rerun replaces the row
    store
        .insert_probe_result(&down("api", at(2, 2, 0, 0)))
        .await
        .unwrap();
    analytics.generate_daily_summary("api", day(2)).await.unwrap();
    analytics.generate_daily_summary("api", day(2)).await.unwrap();

    let rows = store
        .query_daily_summaries("api", day(1), day(3))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total_checks, 2);
    assert_eq!(rows[0].uptime_percentage, 50.0);
}

#[tokio::test]
async fn test_incident_downtime_lands_in_summary() {
    let store = memory_store();
    with_targets(&store, &["api"]).await;
    store
        .insert_probe_result(&up("api", at(2, 12, 0, 0), 10))
        .await
        .unwrap();

    // starts the previous evening, only the part inside the day counts
    store.open_incident("api", at(1, 23, 30, 0)).await.unwrap();
    store.close_incident("api", at(2, 0, 45, 0)).await.unwrap();
    store.open_incident("api", at(2, 6, 0, 0)).await.unwrap();
    store.close_incident("api", at(2, 6, 10, 0)).await.unwrap();

    let summary = Analytics::new(store.clone())
        .generate_daily_summary("api", day(2))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.downtime_minutes, 55);
    assert_eq!(summary.incident_count, 1);
}

#[tokio::test]
async fn test_one_failing_target_does_not_stop_aggregation() {
    let backend = FaultyBackend {
        broken_target: Some("broken".to_string()),
        ..Default::default()
    };
    let store: Arc<dyn StorageBackend> = Arc::new(backend);
    with_targets(&store, &["api", "broken", "web"]).await;
    for name in ["api", "broken", "web"] {
        store
            .insert_probe_result(&up(name, at(2, 3, 0, 0), 10))
            .await
            .unwrap();
    }

    let report = Analytics::new(store.clone())
        .generate_daily_summaries_for_all(day(2))
        .await
        .unwrap();

    assert_eq!(report.generated, 2);
    assert_eq!(report.failed, vec!["broken".to_string()]);
    assert!(store.get_daily_summary("web", day(2)).await.unwrap().is_some());
}

async fn seed_history(store: &Arc<dyn StorageBackend>) {
    store
        .insert_target(&Target::new("api", "https://api.test"))
        .await
        .unwrap();

    let results: Vec<ProbeResult> = vec![
        up("api", at(9, 23, 59, 59), 10),
        up("api", at(10, 0, 0, 0), 10),
        up("api", at(10, 11, 0, 0), 10),
    ];
    for result in &results {
        store.insert_probe_result(result).await.unwrap();
    }

    store.open_incident("api", at(9, 20, 0, 0)).await.unwrap();
    store.close_incident("api", at(9, 21, 0, 0)).await.unwrap();

    store
        .insert_notification(&NotificationLog {
            target: "api".to_string(),
            kind: "dashboard".to_string(),
            message: "api is down".to_string(),
            severity: "error".to_string(),
            sent_at: at(9, 20, 0, 0),
            status: "sent".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_zero_retention_keeps_today() {
    let store = memory_store();
    seed_history(&store).await;

    let report = Analytics::new(store.clone())
        .cleanup_old_data_at(0, at(10, 12, 0, 0))
        .await
        .unwrap();

    assert_eq!(report.cutoff, at(10, 0, 0, 0));
    assert_eq!(report.probe_results, 1);
    assert_eq!(report.incidents, 1);
    assert_eq!(report.notifications, 1);

    let remaining = store
        .query_probe_results(QueryRange::new("api", at(1, 0, 0, 0), at(11, 0, 0, 0)))
        .await
        .unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].timestamp, at(10, 0, 0, 0));
}

#[tokio::test]
async fn test_cleanup_never_touches_open_incidents() {
    let store = memory_store();
    with_targets(&store, &["api"]).await;
    store.open_incident("api", at(1, 0, 0, 0)).await.unwrap();

    Analytics::new(store.clone())
        .cleanup_old_data_at(1, at(20, 0, 0, 0))
        .await
        .unwrap();

    assert!(store.ongoing_incident("api").await.unwrap().is_some());
}

#[tokio::test]
async fn test_cleanup_stops_at_first_failure() {
    let backend = FaultyBackend {
        fail_incident_cleanup: true,
        ..Default::default()
    };
    let store: Arc<dyn StorageBackend> = Arc::new(backend);
    seed_history(&store).await;

    let result = Analytics::new(store.clone())
        .cleanup_old_data_at(0, at(10, 12, 0, 0))
        .await;
    assert!(matches!(result, Err(StorageError::QueryFailed(_))));

    // probe results ran before the failure, notifications after it
    let remaining = store
        .query_probe_results(QueryRange::new("api", at(1, 0, 0, 0), at(11, 0, 0, 0)))
        .await
        .unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(store.recent_notifications(10).await.unwrap().len(), 1);
}
