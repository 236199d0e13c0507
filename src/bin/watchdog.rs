use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};
use watchdog::{
    actors::{
        dispatcher::{DispatcherConfig, DispatcherHandle},
        maintenance::MaintenanceHandle,
        notifier::NotifierHandle,
    },
    analytics::Analytics,
    config::{Config, StorageConfig, read_config_file},
    context::MonitorContext,
    storage::{StorageBackend, memory::MemoryBackend},
    sync::sync_config_to_store,
    util::get_config_path,
};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short, default_value_t = get_config_path())]
    file: String,

    /// Run a single probe round, print the report and exit
    #[arg(long)]
    once: bool,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("watchdog", LevelFilter::TRACE),
        ("tower_http", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)
        .with_context(|| format!("failed to load config from {}", args.file))?;

    let store = open_store(&config.storage).await?;

    let report = sync_config_to_store(&config, store.as_ref()).await?;
    if !report.errors.is_empty() {
        warn!("initial sync finished with {} errors", report.errors.len());
    }

    let ctx = MonitorContext::new(store.clone());
    if let Err(e) = ctx.seed_from_store().await {
        warn!("could not restore previous target state: {e}");
    }

    let targets = store.list_targets().await?;
    let dispatcher = DispatcherHandle::spawn(
        ctx.clone(),
        DispatcherConfig::from(&config.settings),
        targets,
    )?;

    if args.once {
        let report = dispatcher.run_now().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        dispatcher.shutdown().await;
        store.close().await?;
        return Ok(());
    }

    let webhook = config.notifications.as_ref().and_then(|n| n.webhook.clone());
    let notifier = NotifierHandle::spawn(store.clone(), webhook, ctx.subscribe());

    let maintenance = MaintenanceHandle::spawn(
        Analytics::new(store.clone()),
        config.maintenance.clone(),
        config.storage.retention_days(),
    );

    #[cfg(feature = "api")]
    start_api(&config, &ctx, maintenance.clone()).await?;

    let sync_task = tokio::spawn(periodic_sync(
        args.file.clone(),
        config.settings.sync_interval_seconds,
        store.clone(),
        dispatcher.clone(),
    ));

    info!(
        "watchdog running: {} sites, probing every {}s",
        config.sites.len(),
        config.settings.check_interval_seconds
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    sync_task.abort();
    dispatcher.shutdown().await;
    notifier.shutdown().await;
    maintenance.shutdown().await;

    if let Err(e) = store.close().await {
        error!("failed to close store: {e}");
    }

    Ok(())
}

async fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match config {
        StorageConfig::None => {
            info!("using in-memory storage, history is lost on exit");
            Ok(Arc::new(MemoryBackend::new()))
        }

        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path, .. } => {
            let backend = watchdog::storage::sqlite::SqliteBackend::new(path).await?;
            Ok(Arc::new(backend))
        }

        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("sqlite storage requested but the storage-sqlite feature is disabled")
        }
    }
}

#[cfg(feature = "api")]
async fn start_api(
    config: &Config,
    ctx: &MonitorContext,
    maintenance: MaintenanceHandle,
) -> anyhow::Result<()> {
    use watchdog::api::{ApiConfig, ApiState, spawn_api_server};
    use watchdog::util::{get_api_token, get_bind_addr};

    let env_addr = get_bind_addr();
    if config.api.is_none() && env_addr.is_none() {
        debug!("admin API disabled");
        return Ok(());
    }

    let mut api_config = ApiConfig::default();
    if let Some(settings) = &config.api {
        api_config.bind_addr = settings.bind_addr;
        api_config.auth_token = settings.auth_token.clone();
    }
    if let Some(addr) = env_addr {
        api_config.bind_addr = addr;
    }
    if let Some(token) = get_api_token() {
        api_config.auth_token = Some(token);
    }
    if api_config.auth_token.is_none() {
        warn!("admin API has no auth token configured");
    }

    let state = ApiState::new(ctx.store.clone(), ctx.status.clone(), maintenance);
    spawn_api_server(api_config, state).await?;
    Ok(())
}

/// Re-read the config file and reconcile targets on a fixed interval
async fn periodic_sync(
    path: String,
    every_seconds: u64,
    store: Arc<dyn StorageBackend>,
    dispatcher: DispatcherHandle,
) {
    let mut ticker = interval(Duration::from_secs(every_seconds.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // the first tick completes immediately and startup already synced
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let config: Config = match read_config_file(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("skipping sync, config unreadable: {e}");
                continue;
            }
        };

        if let Err(e) = sync_config_to_store(&config, store.as_ref()).await {
            error!("config sync failed: {e}");
            continue;
        }

        match store.list_targets().await {
            Ok(targets) => {
                if let Err(e) = dispatcher.update_targets(targets).await {
                    error!("dispatcher unavailable: {e}");
                    return;
                }
            }
            Err(e) => error!("failed to reload targets: {e}"),
        }
    }
}
