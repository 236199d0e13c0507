use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::NaiveTime;
use tracing::trace;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default for most deployments)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,

        /// Retention period in days (history older than this is deleted)
        #[serde(default = "default_retention_days")]
        retention_days: u32,
    },
}

impl StorageConfig {
    /// Retention horizon used by the cleanup job
    pub fn retention_days(&self) -> u32 {
        match self {
            StorageConfig::None => default_retention_days(),
            StorageConfig::Sqlite { retention_days, .. } => *retention_days,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./watchdog.db")
}

fn default_retention_days() -> u32 {
    30
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    /// Storage configuration (defaults to SQLite at `./watchdog.db`)
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    pub api: Option<ApiSettings>,

    pub notifications: Option<NotificationConfig>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Settings {
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    /// Hard deadline for a whole round, defaults to `timeout_seconds + 5`
    pub round_deadline_seconds: Option<u64>,

    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,
}

impl Settings {
    pub fn round_deadline_seconds(&self) -> u64 {
        self.round_deadline_seconds
            .unwrap_or(self.timeout_seconds + 5)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
            timeout_seconds: default_timeout(),
            max_concurrent_probes: default_max_concurrent_probes(),
            round_deadline_seconds: None,
            sync_interval_seconds: default_sync_interval(),
        }
    }
}

fn default_check_interval() -> u64 {
    20
}

fn default_timeout() -> u64 {
    10
}

fn default_max_concurrent_probes() -> usize {
    16
}

fn default_sync_interval() -> u64 {
    300
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
}

/// Daily jobs run by the maintenance actor, times are `HH:MM` in UTC
#[derive(Debug, Clone, serde::Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_aggregation_time", with = "hh_mm")]
    pub aggregation_time: NaiveTime,

    #[serde(default = "default_cleanup_time", with = "hh_mm")]
    pub cleanup_time: NaiveTime,

    #[serde(default = "default_true")]
    pub daily_aggregation: bool,

    #[serde(default = "default_true")]
    pub data_cleanup: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            aggregation_time: default_aggregation_time(),
            cleanup_time: default_cleanup_time(),
            daily_aggregation: true,
            data_cleanup: true,
        }
    }
}

fn default_aggregation_time() -> NaiveTime {
    NaiveTime::from_hms_opt(1, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_cleanup_time() -> NaiveTime {
    NaiveTime::from_hms_opt(3, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    pub auth_token: Option<String>,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct NotificationConfig {
    /// Generic webhook receiving every transition event as JSON
    pub webhook: Option<Webhook>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
}

mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M").map_err(serde::de::Error::custom)
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    parse_config(&file_content)
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
