//! History surviving a restart of the SQLite store

use std::sync::Arc;

use crate::helpers::{at, down, up};
use tempfile::tempdir;
use watchdog::context::MonitorContext;
use watchdog::monitors::{IncidentLedger, Observation};
use watchdog::storage::{QueryRange, StorageBackend, Target, TargetStatus, sqlite::SqliteBackend};

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("watchdog.db");

    {
        let store = SqliteBackend::new(&db_path).await.unwrap();
        store
            .insert_target(&Target::new("api", "https://api.test"))
            .await
            .unwrap();
        store
            .insert_probe_result(&up("api", at(2, 10, 0, 0), 40))
            .await
            .unwrap();
        store
            .insert_probe_result(&down("api", at(2, 10, 1, 0)))
            .await
            .unwrap();
        store.open_incident("api", at(2, 10, 1, 0)).await.unwrap();
        store.close().await.unwrap();
    }

    // migrations are re-applied on open without error
    let store: Arc<dyn StorageBackend> = Arc::new(SqliteBackend::new(&db_path).await.unwrap());

    let ongoing = store.ongoing_incident("api").await.unwrap().unwrap();
    assert_eq!(ongoing.start_time, at(2, 10, 1, 0));

    let ctx = MonitorContext::new(store.clone());
    assert_eq!(ctx.seed_from_store().await.unwrap(), 1);
    assert_eq!(ctx.detector.state_of("api").await, TargetStatus::Down);

    // recovery right after restart is a real transition, not a baseline
    let observation = ctx.detector.observe("api", true, at(2, 10, 2, 0)).await;
    assert!(matches!(observation, Observation::Changed { .. }));

    // a second open attempt keeps the existing incident
    assert!(store.open_incident("api", at(2, 10, 3, 0)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_opens_on_disk_keep_one_incident() {
    let dir = tempdir().unwrap();
    let store: Arc<dyn StorageBackend> = Arc::new(
        SqliteBackend::new(&dir.path().join("watchdog.db"))
            .await
            .unwrap(),
    );
    store
        .insert_target(&Target::new("api", "https://api.test"))
        .await
        .unwrap();
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
    assert!(store.ongoing_incident("api").await.unwrap().is_some());
}
