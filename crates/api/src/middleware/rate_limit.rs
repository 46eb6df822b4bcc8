//! Fixed-window request budget per client IP.
//!
//! Each peer address gets `max_requests` per window; the window starts at
//! the client's first request and resets once it has elapsed. Requests whose
//! peer address is unknown (no `ConnectInfo`) are not limited.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::config::ClientRateLimitConfig;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Tracked clients above which expired windows are pruned.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    started: Instant,
    count: u32,
}

/// Counts requests per client address.
#[derive(Debug)]
pub struct ClientRateLimiter {
    config: ClientRateLimitConfig,
    windows: Mutex<HashMap<IpAddr, ClientWindow>>,
}

impl ClientRateLimiter {
    pub fn new(config: ClientRateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request from `client` and report whether it is allowed.
    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        let window = self.config.window;
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(client).or_insert(ClientWindow {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= window {
            *entry = ClientWindow {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.config.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

/// Middleware rejecting clients that exceeded their budget with 429.
pub async fn limit_by_client(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> AppResult<Response> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Some(ip) = peer {
        if !state.limiter.check(ip) {
            tracing::warn!(client = %ip, "Client exceeded request budget");
            return Err(AppError::TooManyRequests);
        }
    }

    Ok(next.run(request).await)
}
