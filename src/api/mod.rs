//! Admin HTTP API
//!
//! Read-only views over the result store plus manual maintenance controls.
//!
//! ## Endpoints
//!
//! - `GET  /api/v1/health` - Liveness and store health (never authenticated)
//! - `GET  /api/v1/status` - Latest round per target
//! - `GET  /api/v1/stats` - Store statistics
//! - `GET  /api/v1/targets` - Stored targets
//! - `GET  /api/v1/targets/{name}/incidents?days=N`
//! - `GET  /api/v1/targets/{name}/metrics?days=N`
//! - `GET  /api/v1/targets/{name}/summaries?days=N`
//! - `GET  /api/v1/targets/{name}/latency?days=N`
//! - `POST /api/v1/admin/aggregate` - body `{ "date": "YYYY-MM-DD" }`
//! - `POST /api/v1/admin/cleanup`
//! - `GET  /api/v1/admin/maintenance`

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{HealthResponse, StatusResponse};

use std::net::{Ipv4Addr, SocketAddr};

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,

    /// Bearer token required on everything but the health check
    pub auth_token: Option<String>,

    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            auth_token: None,
            enable_cors: true,
        }
    }
}

/// Build the full router
pub fn router(state: ApiState, config: &ApiConfig) -> Router {
    let mut protected = Router::new()
        .route("/api/v1/status", get(routes::status::current_status))
        .route("/api/v1/stats", get(routes::status::store_stats))
        .route("/api/v1/targets", get(routes::targets::list_targets))
        .route(
            "/api/v1/targets/:name/incidents",
            get(routes::targets::get_incidents),
        )
        .route(
            "/api/v1/targets/:name/metrics",
            get(routes::targets::get_metrics),
        )
        .route(
            "/api/v1/targets/:name/summaries",
            get(routes::targets::get_summaries),
        )
        .route(
            "/api/v1/targets/:name/latency",
            get(routes::targets::get_latency),
        )
        .route("/api/v1/admin/aggregate", post(routes::admin::aggregate))
        .route("/api/v1/admin/cleanup", post(routes::admin::cleanup))
        .route(
            "/api/v1/admin/maintenance",
            get(routes::admin::maintenance_status),
        );

    if let Some(token) = config.auth_token.clone() {
        protected = protected.route_layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth_middleware,
        ));
    }

    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server in a background task and return its local address
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
