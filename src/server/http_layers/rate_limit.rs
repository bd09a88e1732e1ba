//! Per-IP rate limiting
//!
//! Fixed one minute windows keyed by the client address. Requests over the
//! limit get `429 Too Many Requests` with a `Retry-After` header.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::server::metrics::record_rate_limit_hit;
use crate::server::state::GuardedRateLimiter;

const WINDOW: Duration = Duration::from_secs(60);
const STALE_AFTER: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct WindowState {
    count: u32,
    window_start: Instant,
}

impl WindowState {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }

    fn reset_if_expired(&mut self) {
        if self.window_start.elapsed() >= WINDOW {
            self.count = 0;
            self.window_start = Instant::now();
        }
    }
}

pub struct IpRateLimiter {
    per_minute: u32,
    states: Mutex<HashMap<IpAddr, WindowState>>,
}

impl IpRateLimiter {
    pub fn new(per_minute: u32) -> Self {
        Self {
            per_minute,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Check if a request is allowed and record it if so.
    /// Returns `Err(retry_after_secs)` when the client is over its limit.
    pub fn check_and_record(&self, ip: IpAddr) -> Result<(), u64> {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let state = states.entry(ip).or_insert_with(WindowState::new);

        state.reset_if_expired();

        if state.count >= self.per_minute {
            let elapsed = state.window_start.elapsed().as_secs();
            let retry_after = WINDOW.as_secs().saturating_sub(elapsed);
            return Err(retry_after.max(1));
        }

        state.count += 1;
        Ok(())
    }

    /// Drops clients that have been quiet for a while.
    pub fn cleanup_stale_entries(&self) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.retain(|_, state| state.window_start.elapsed() < STALE_AFTER);
    }

    fn tracked_clients(&self) -> usize {
        self.states.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn client_ip(request: &Request<Body>) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit(
    State(limiter): State<GuardedRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&request);
    match limiter.check_and_record(ip) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let path = request.uri().path().to_string();
            warn!(
                "Rate limit exceeded for {} on {} (retry after {}s)",
                ip, path, retry_after
            );
            record_rate_limit_hit(&path);
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.to_string())],
                "Too many requests",
            )
                .into_response()
        }
    }
}

/// Periodically forgets idle clients.
pub fn spawn_cleanup(limiter: GuardedRateLimiter) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STALE_AFTER);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            limiter.cleanup_stale_entries();
            tracing::debug!(
                "Rate limiter tracking {} clients",
                limiter.tracked_clients()
            );
        }
    })
}
