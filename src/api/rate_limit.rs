//! Best-effort fixed-window rate limiting keyed by client address.
//!
//! Runs before every handler, independent of path. A request from a peer that
//! has exhausted its window is rejected with 429 and never reaches the
//! handler. Requests without a resolvable peer address share one bucket.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

use super::{ApiError, AppState};
use crate::config::RateLimitConfig;

#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    buckets: Arc<Mutex<HashMap<String, Window>>>,
}

struct Window {
    started: Instant,
    count: u32,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_seconds),
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Records one request for `client` and reports whether it is allowed.
    pub fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());

        // Drop stale windows so the map does not grow without bound.
        if buckets.len() > 10_000 {
            let window = self.window;
            buckets.retain(|_, w| now.duration_since(w.started) < window);
        }

        let window = buckets.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        window.count += 1;
        window.count <= self.max_requests
    }
}

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| client_key(info.0.ip()));

    if !state.rate_limiter.check(&client) {
        warn!("Rate limit exceeded for {client}");
        return ApiError::RateLimited.into_response();
    }

    next.run(request).await
}

fn client_key(ip: IpAddr) -> String {
    ip.to_string()
}
