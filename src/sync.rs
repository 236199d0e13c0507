//! Reconciliation of configured sites into stored targets
//!
//! Targets are matched by name. Missing ones are created, changed URLs are
//! updated, and targets that only exist in the store are orphaned: disabled
//! so rounds skip them, but never deleted, so their history survives a config
//! edit. An orphan that comes back into the config is enabled again.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::config::{Config, SiteConfig};
use crate::storage::{AuditEntry, StorageBackend, StorageResult, Target};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub timestamp: DateTime<Utc>,
    pub total: usize,
    pub added: usize,
    pub updated: usize,
    pub restored: usize,
    /// Every stored target missing from the config, newly orphaned or not
    pub orphaned: Vec<String>,
    pub errors: Vec<String>,
}

/// Bring the stored targets in line with `config.sites`
///
/// Per-target failures are collected in the report; only a failure to list
/// the stored targets aborts the sync.
#[instrument(skip_all, fields(sites = config.sites.len()))]
pub async fn sync_config_to_store(
    config: &Config,
    store: &dyn StorageBackend,
) -> StorageResult<SyncReport> {
    let mut stored: BTreeMap<String, Target> = store
        .list_targets()
        .await?
        .into_iter()
        .map(|t| (t.name.clone(), t))
        .collect();

    let mut report = SyncReport {
        timestamp: Utc::now(),
        total: config.sites.len(),
        added: 0,
        updated: 0,
        restored: 0,
        orphaned: vec![],
        errors: vec![],
    };

    for site in &config.sites {
        let existing = stored.remove(&site.name);
        if let Some(existing) = existing.as_ref().filter(|t| !t.enabled) {
            match store.set_target_enabled(&site.name, true).await {
                Ok(()) => {
                    report.restored += 1;
                    info!("target {} is back in config, enabling", site.name);
                    audit(store, "target_restored", &site.name, json!({ "url": existing.url })).await;
                }
                Err(e) => {
                    let msg = format!("failed to enable target {}: {e}", site.name);
                    error!("{msg}");
                    report.errors.push(msg);
                }
            }
        }

        match existing {
            Some(existing) if existing.url != site.url => {
                match store.update_target_url(&site.name, &site.url).await {
                    Ok(()) => {
                        report.updated += 1;
                        info!("updated target {}: {} -> {}", site.name, existing.url, site.url);
                        audit(
                            store,
                            "target_updated",
                            &site.name,
                            json!({ "old_url": existing.url, "new_url": site.url }),
                        )
                        .await;
                    }
                    Err(e) => {
                        let msg = format!("failed to update target {}: {e}", site.name);
                        error!("{msg}");
                        report.errors.push(msg);
                    }
                }
            }
            Some(_) => {}
            None => match store.insert_target(&Target::new(&site.name, &site.url)).await {
                Ok(()) => {
                    report.added += 1;
                    info!("added new target: {}", site.name);
                    audit(store, "target_created", &site.name, json!({ "url": site.url })).await;
                }
                Err(e) => {
                    let msg = format!("failed to create target {}: {e}", site.name);
                    error!("{msg}");
                    report.errors.push(msg);
                }
            },
        }
    }

    for orphan in stored.into_values() {
        if orphan.enabled {
            warn!(
                "target in store but not in config, disabling: {} ({})",
                orphan.name, orphan.url
            );
            match store.set_target_enabled(&orphan.name, false).await {
                Ok(()) => {
                    audit(store, "target_orphaned", &orphan.name, json!({ "url": orphan.url }))
                        .await;
                }
                Err(e) => {
                    let msg = format!("failed to disable target {}: {e}", orphan.name);
                    error!("{msg}");
                    report.errors.push(msg);
                }
            }
        }
        report.orphaned.push(orphan.name);
    }

    info!(
        "sync result: added={}, updated={}, restored={}, orphaned={}, errors={}",
        report.added,
        report.updated,
        report.restored,
        report.orphaned.len(),
        report.errors.len()
    );
    Ok(report)
}

/// Stored targets in config file form
pub async fn export_targets(store: &dyn StorageBackend) -> StorageResult<Vec<SiteConfig>> {
    Ok(store
        .list_targets()
        .await?
        .into_iter()
        .map(|t| SiteConfig {
            name: t.name,
            url: t.url,
        })
        .collect())
}

async fn audit(store: &dyn StorageBackend, action: &str, name: &str, value: serde_json::Value) {
    let entry = AuditEntry::system(action, "target", name, value);
    if let Err(e) = store.insert_audit_entry(&entry).await {
        error!("failed to create audit entry: {e}");
    }
}
