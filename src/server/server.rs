use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::http_layers::{
    log_requests, rate_limit, require_basic_auth, spawn_cleanup, BasicAuth, IpRateLimiter,
};
use super::metrics::metrics_handler;
use super::state::{GuardedMcpDispatcher, ServerState};
use super::ServerConfig;
use crate::mcp::mcp_post_handler;

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

impl ServerState {
    pub fn new(config: ServerConfig, dispatcher: GuardedMcpDispatcher) -> Result<ServerState> {
        let basic_auth = match &config.basic_auth {
            Some(credentials) => Some(Arc::new(
                BasicAuth::parse(credentials).context("Invalid basic auth credentials")?,
            )),
            None => None,
        };
        Ok(ServerState {
            rate_limiter: Arc::new(IpRateLimiter::new(config.rate_limit_per_minute)),
            config,
            start_time: Instant::now(),
            dispatcher,
            basic_auth,
        })
    }
}

pub fn make_app(state: ServerState) -> Router {
    let config = state.config.clone();

    // Health probes bypass rate limiting and auth
    let health_routes: Router = Router::new()
        .route("/health", get(health))
        .route("/mcp/health", get(health));

    let mcp_routes: Router = Router::new()
        .route("/mcp", post(mcp_post_handler))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(middleware::from_fn_with_state(
            state.basic_auth.clone(),
            require_basic_auth,
        ))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit,
        ))
        .with_state(state.clone());

    let mut app: Router = health_routes.merge(mcp_routes);

    app = app.layer(middleware::from_fn_with_state(config.clone(), log_requests));
    if config.trace {
        app = app.layer(TraceLayer::new_for_http());
    }

    app
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

async fn run_metrics_server(host: String, port: u16) {
    let address = format!("{}:{}", host, port);
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind metrics server on {}: {}", address, e);
            return;
        }
    };
    info!("Metrics available at http://{}/metrics", address);
    if let Err(e) = axum::serve(listener, make_metrics_app()).await {
        error!("Metrics server stopped: {}", e);
    }
}

/// Serves the MCP app on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    config: ServerConfig,
    dispatcher: GuardedMcpDispatcher,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = ServerState::new(config.clone(), dispatcher)?;
    let cleanup = spawn_cleanup(state.rate_limiter.clone());
    let app = make_app(state);

    let metrics = config.metrics_enabled.then(|| {
        tokio::spawn(run_metrics_server(
            config.host.clone(),
            config.metrics_port,
        ))
    });

    info!(
        "MCP endpoint listening on http://{}/mcp ({} requests/min per client{})",
        listener.local_addr()?,
        config.rate_limit_per_minute,
        if config.basic_auth.is_some() {
            ", basic auth"
        } else {
            ""
        }
    );

    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await;

    cleanup.abort();
    if let Some(metrics) = metrics {
        metrics.abort();
    }

    Ok(result?)
}

pub async fn run_server<F>(
    config: ServerConfig,
    dispatcher: GuardedMcpDispatcher,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    serve(listener, config, dispatcher, shutdown).await
}
