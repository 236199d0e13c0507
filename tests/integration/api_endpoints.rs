//! Integration tests for the admin API over a real socket

use std::net::SocketAddr;
use std::sync::Arc;

use crate::helpers::{memory_store, up, with_targets};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use watchdog::actors::maintenance::MaintenanceHandle;
use watchdog::analytics::Analytics;
use watchdog::api::{ApiConfig, ApiState, spawn_api_server};
use watchdog::config::MaintenanceConfig;
use watchdog::monitors::{StatusBoard, StatusEntry};
use watchdog::storage::StorageBackend;

const TOKEN: &str = "test-token";

async fn spawn_test_api(store: Arc<dyn StorageBackend>, status: StatusBoard) -> SocketAddr {
    let maintenance = MaintenanceHandle::spawn(
        Analytics::new(store.clone()),
        MaintenanceConfig::default(),
        30,
    );
    let state = ApiState::new(store, status, maintenance);

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        auth_token: Some(TOKEN.to_string()),
        enable_cors: true,
    };

    spawn_api_server(config, state).await.unwrap()
}

async fn get_json(addr: SocketAddr, path: &str) -> (u16, Value) {
    let response = reqwest::Client::new()
        .get(format!("http://{addr}{path}"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_status_reflects_board() {
    let store = memory_store();
    let status = StatusBoard::new();
    let now = Utc::now();
    status
        .replace(vec![
            StatusEntry::from_result("https://b.test", &up("b", now, 20)),
            StatusEntry::from_result("https://a.test", &up("a", now, 10)),
        ])
        .await;

    let addr = spawn_test_api(store, status).await;
    let (code, body) = get_json(addr, "/api/v1/status").await;

    assert_eq!(code, 200);
    assert_eq!(body["total"], 2);
    assert_eq!(body["up"], 2);
    assert_eq!(body["targets"][0]["target"], "a");
    assert_eq!(body["targets"][0]["status"], "up");
}

#[tokio::test]
async fn test_target_history_endpoints() {
    let store = memory_store();
    with_targets(&store, &["api"]).await;
    let now = Utc::now();
    store
        .insert_probe_result(&up("api", now - Duration::minutes(5), 42))
        .await
        .unwrap();
    store
        .open_incident("api", now - Duration::minutes(30))
        .await
        .unwrap();
    store
        .close_incident("api", now - Duration::minutes(20))
        .await
        .unwrap();

    let addr = spawn_test_api(store, StatusBoard::new()).await;

    let (code, body) = get_json(addr, "/api/v1/targets/api/incidents?days=1").await;
    assert_eq!(code, 200);
    assert_eq!(body["count"], 1);
    assert_eq!(body["incidents"][0]["duration_seconds"], 600);

    let (code, body) = get_json(addr, "/api/v1/targets/api/metrics").await;
    assert_eq!(code, 200);
    assert_eq!(body["period_days"], 7);
    assert_eq!(body["total_checks"], 1);
    assert_eq!(body["uptime_percentage"], 100.0);
    assert_eq!(body["incident_count"], 1);

    let (code, body) = get_json(addr, "/api/v1/targets/missing/metrics").await;
    assert_eq!(code, 404);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_manual_aggregation_then_summaries() {
    let store = memory_store();
    with_targets(&store, &["api"]).await;
    let yesterday = Utc::now().date_naive() - Duration::days(1);
    let noon = yesterday.and_hms_opt(12, 0, 0).unwrap().and_utc();
    store.insert_probe_result(&up("api", noon, 15)).await.unwrap();

    let addr = spawn_test_api(store, StatusBoard::new()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/v1/admin/aggregate"))
        .bearer_auth(TOKEN)
        .json(&json!({ "date": yesterday }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["generated"], 1);

    let (code, body) = get_json(addr, "/api/v1/targets/api/summaries?days=3").await;
    assert_eq!(code, 200);
    assert_eq!(body["count"], 1);
    assert_eq!(body["summaries"][0]["uptime_percentage"], 100.0);

    let (code, body) = get_json(addr, "/api/v1/admin/maintenance").await;
    assert_eq!(code, 200);
    assert_eq!(body["running"], true);
    assert!(body["last_aggregation"].is_string());
}

#[tokio::test]
async fn test_malformed_aggregate_body_is_rejected() {
    let store = memory_store();
    let addr = spawn_test_api(store, StatusBoard::new()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/admin/aggregate"))
        .bearer_auth(TOKEN)
        .json(&json!({ "date": "yesterday" }))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_health_without_token() {
    let addr = spawn_test_api(memory_store(), StatusBoard::new()).await;

    let response = reqwest::get(format!("http://{addr}/api/v1/health"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let response = reqwest::get(format!("http://{addr}/api/v1/status"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}
