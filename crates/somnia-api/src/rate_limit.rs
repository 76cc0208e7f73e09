//! Fixed-window rate limiter middleware.
//!
//! Each client (keyed by peer IP) may make `max_requests` requests per
//! window. The window starts with the client's first request and resets
//! once it has elapsed. Every response carries `x-ratelimit-limit` and
//! `x-ratelimit-window` headers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use somnia_core::config::RateLimitConfig;

/// Clients tracked before expired windows are swept.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    started: Instant,
    count: u64,
}

/// Shared state for the rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u64,
    window: Duration,
    clients: Arc<Mutex<HashMap<String, ClientWindow>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Try to acquire a permit for `client`. Returns true if allowed.
    pub fn try_acquire(&self, client: &str) -> bool {
        self.try_acquire_at(client, Instant::now())
    }

    fn try_acquire_at(&self, client: &str, now: Instant) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        if clients.len() >= SWEEP_THRESHOLD {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.started) <= window);
        }

        let entry = clients.entry(client.to_string()).or_insert(ClientWindow {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) > self.window {
            *entry = ClientWindow {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }

    fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.max_requests));
        headers.insert(
            "x-ratelimit-window",
            HeaderValue::from(self.window.as_secs()),
        );
    }
}

fn client_key(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Axum middleware that enforces the rate limit.
pub async fn rate_limit_middleware(
    axum::extract::Extension(limiter): axum::extract::Extension<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_key(&req);

    let mut response = if limiter.try_acquire(&client) {
        next.run(req).await
    } else {
        warn!(
            client = %client,
            limit = limiter.max_requests,
            window_secs = limiter.window.as_secs(),
            "Rate limit exceeded"
        );
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "too_many_requests",
                "message": "Rate limit exceeded"
            })),
        )
            .into_response()
    };

    limiter.apply_headers(response.headers_mut());
    response
}
