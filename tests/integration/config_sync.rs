//! Config file reconciliation into the store

use crate::helpers::memory_store;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use watchdog::actors::dispatcher::{DispatcherConfig, DispatcherHandle};
use watchdog::config::read_config_file;
use watchdog::context::MonitorContext;
use watchdog::sync::{export_targets, sync_config_to_store};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_file(sites: &[(&str, &str)]) -> NamedTempFile {
    let sites: Vec<_> = sites
        .iter()
        .map(|(name, url)| serde_json::json!({ "name": name, "url": url }))
        .collect();
    let body = serde_json::json!({
        "settings": { "check_interval_seconds": 30 },
        "sites": sites,
        "storage": { "backend": "none" }
    });

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(body.to_string().as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_edit_config_then_resync() {
    let store = memory_store();

    let file = config_file(&[("api", "https://api.test"), ("web", "https://web.test")]);
    let config = read_config_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.settings.check_interval_seconds, 30);

    let first = sync_config_to_store(&config, store.as_ref()).await.unwrap();
    assert_eq!(first.added, 2);

    // the file is edited while running: web removed, api moved
    let file = config_file(&[("api", "https://api-v2.test")]);
    let config = read_config_file(file.path().to_str().unwrap()).unwrap();
    let second = sync_config_to_store(&config, store.as_ref()).await.unwrap();

    assert_eq!(second.added, 0);
    assert_eq!(second.updated, 1);
    assert_eq!(second.orphaned, vec!["web".to_string()]);

    let exported = export_targets(store.as_ref()).await.unwrap();
    assert_eq!(exported.len(), 2);
    assert_eq!(exported[0].name, "api");
    assert_eq!(exported[0].url, "https://api-v2.test");

    // removed targets keep their row but are disabled
    let web = store.get_target("web").await.unwrap().unwrap();
    assert!(!web.enabled);
    assert!(web.last_checked.is_none());
    assert!(store.get_target("api").await.unwrap().unwrap().enabled);
}

#[tokio::test]
async fn test_removed_site_is_no_longer_checked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/web"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = memory_store();
    let api = format!("{}/api", server.uri());
    let web = format!("{}/web", server.uri());

    let file = config_file(&[("api", &api), ("web", &web)]);
    let config = read_config_file(file.path().to_str().unwrap()).unwrap();
    sync_config_to_store(&config, store.as_ref()).await.unwrap();

    let file = config_file(&[("api", &api)]);
    let config = read_config_file(file.path().to_str().unwrap()).unwrap();
    let report = sync_config_to_store(&config, store.as_ref()).await.unwrap();
    assert_eq!(report.orphaned, vec!["web".to_string()]);

    let dispatcher_config = DispatcherConfig {
        interval: Duration::from_secs(3600),
        timeout: Duration::from_secs(5),
        workers: 2,
        round_deadline: Duration::from_secs(5),
    };
    let ctx = MonitorContext::new(store.clone());
    let handle =
        DispatcherHandle::spawn(ctx, dispatcher_config, store.list_targets().await.unwrap())
            .unwrap();

    let round = handle.run_now().await.unwrap();
    assert_eq!(round.total, 1);
    assert_eq!(round.up, 1);

    handle.shutdown().await;
    // the /web mock verifies it was never hit when the server drops
}

#[test]
fn test_missing_config_file_is_an_error() {
    assert!(read_config_file("/definitely/not/here.json").is_err());
}
