//! Single HTTP probe
//!
//! A probe issues one GET against a target and always yields a
//! [`ProbeResult`]; transport and HTTP failures are encoded in the result,
//! never returned as errors.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::redirect::Policy;
use tracing::{instrument, trace, warn};

use crate::storage::schema::ProbeResult;

/// Shared HTTP client for probing targets
#[derive(Clone)]
pub struct Prober {
    /// HTTP client (reused across probes for connection pooling)
    client: reqwest::Client,

    timeout: Duration,
}

impl Prober {
    /// Build a prober whose requests give up after `timeout`
    ///
    /// Redirects are not followed so 3xx codes are observed as-is.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .user_agent(concat!("watchdog/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe `url` on behalf of target `name`
    ///
    /// Latency is measured until the response headers arrive (or the
    /// request fails); the body is never read.
    #[instrument(skip(self), fields(target = %name))]
    pub async fn probe(&self, name: &str, url: &str) -> ProbeResult {
        trace!("probing {url}");

        let timestamp = Utc::now();
        let start = Instant::now();
        let response = self.client.get(url).send().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match response {
            Ok(response) => {
                let status = response.status();
                let http_status = status.as_u16();
                let is_up = (200..400).contains(&http_status);

                ProbeResult {
                    target: name.to_string(),
                    timestamp,
                    http_status,
                    is_up,
                    latency_ms,
                    error_message: (!is_up).then(|| format!("unexpected status code: {status}")),
                }
            }
            Err(e) => {
                warn!("probe of {url} failed: {e}");
                ProbeResult {
                    target: name.to_string(),
                    timestamp,
                    http_status: 0,
                    is_up: false,
                    latency_ms,
                    error_message: Some(describe_error(&e)),
                }
            }
        }
    }
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}
