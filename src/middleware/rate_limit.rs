// ABOUTME: Fixed-window request limiter for POST requests keyed by client IP
// ABOUTME: Pluggable counter store with an in-memory DashMap implementation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

//! # Rate limiting
//!
//! Every POST is counted against the caller's IP for a fixed window. Once
//! the window's budget is spent the request is answered with `429` before it
//! reaches a handler. In development the counter still runs but nothing is
//! rejected.
//!
//! The default store lives in process memory, so each replica counts on its
//! own. Deployments that need a shared budget implement [`RateLimitStore`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::environment::RateLimitConfig;
use crate::constants;

/// Result of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Requests counted in the current window, this one included
    pub count: u32,
    /// Budget for the window
    pub limit: u32,
    /// Time until the window resets
    pub reset_after: Duration,
}

impl RateLimitDecision {
    /// True when this request fits in the budget
    #[must_use]
    pub const fn allowed(&self) -> bool {
        self.count <= self.limit
    }

    /// Requests left in the window
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }
}

/// Counter backend
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one request for `key` and report the window's state
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision;

    /// Drop windows that have already expired; stores with native expiry keep the default
    fn purge_expired(&self, _window: Duration) {}
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Process-local fixed-window counters
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    windows: DashMap<String, Window>,
}

impl InMemoryRateLimitStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        entry.count = entry.count.saturating_add(1);

        RateLimitDecision {
            count: entry.count,
            limit,
            reset_after: window.saturating_sub(now.duration_since(entry.started)),
        }
    }

    fn purge_expired(&self, window: Duration) {
        let now = Instant::now();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < window);
    }
}

/// State shared by the middleware
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
    enforce: bool,
}

impl RateLimiter {
    /// Create a limiter; with `enforce == false` requests are counted but never rejected
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig, enforce: bool) -> Self {
        Self {
            store,
            config,
            enforce,
        }
    }
}

/// Client key: `x-real-ip`, else the socket address, else `no-ip`
#[must_use]
pub fn client_key(request: &Request) -> String {
    request
        .headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(ToOwned::to_owned)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| constants::rate_limit::UNKNOWN_CLIENT.to_owned())
}

/// axum middleware counting POST requests
pub async fn limit_post_requests(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::POST {
        return next.run(request).await;
    }

    let key = client_key(&request);
    let decision = limiter
        .store
        .hit(&key, limiter.config.max_requests, limiter.config.window)
        .await;

    if !decision.allowed() {
        if limiter.enforce {
            warn!(client = %key, count = decision.count, "Rate limit exceeded");
            let mut response = (StatusCode::TOO_MANY_REQUESTS, "Too many requests").into_response();
            insert_limit_headers(&mut response, &decision);
            if let Ok(value) = HeaderValue::from_str(&decision.reset_after.as_secs().max(1).to_string()) {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
            return response;
        }
        debug!(client = %key, count = decision.count, "Rate limit exceeded (not enforced)");
    }

    let mut response = next.run(request).await;
    insert_limit_headers(&mut response, &decision);
    response
}

fn insert_limit_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(decision.remaining()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn window_counts_then_resets() {
        let store = InMemoryRateLimitStore::new();
        let window = Duration::from_millis(50);

        assert!(store.hit("1.2.3.4", 2, window).await.allowed());
        assert!(store.hit("1.2.3.4", 2, window).await.allowed());
        let third = store.hit("1.2.3.4", 2, window).await;
        assert!(!third.allowed());
        assert_eq!(third.remaining(), 0);

        assert!(store.hit("5.6.7.8", 2, window).await.allowed());

        tokio::time::sleep(Duration::from_millis(60)).await;
        store.purge_expired(window);
        assert_eq!(store.tracked_clients(), 0);
        assert!(store.hit("1.2.3.4", 2, window).await.allowed());
    }
}
