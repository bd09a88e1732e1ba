use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

use crate::mcp::McpDispatcher;

use super::http_layers::{BasicAuth, IpRateLimiter};
use super::ServerConfig;

pub type GuardedMcpDispatcher = Arc<McpDispatcher>;
pub type GuardedRateLimiter = Arc<IpRateLimiter>;
pub type OptionalBasicAuth = Option<Arc<BasicAuth>>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub dispatcher: GuardedMcpDispatcher,
    pub rate_limiter: GuardedRateLimiter,
    pub basic_auth: OptionalBasicAuth,
}

impl FromRef<ServerState> for GuardedMcpDispatcher {
    fn from_ref(input: &ServerState) -> Self {
        input.dispatcher.clone()
    }
}

impl FromRef<ServerState> for GuardedRateLimiter {
    fn from_ref(input: &ServerState) -> Self {
        input.rate_limiter.clone()
    }
}

impl FromRef<ServerState> for OptionalBasicAuth {
    fn from_ref(input: &ServerState) -> Self {
        input.basic_auth.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
