//! Fixed-window per-client rate limiting for the magic-link endpoint.
//!
//! Counters live in memory and reset when the window rolls over. Clients are
//! keyed by IP: the first `x-forwarded-for` hop when present (we expect to sit
//! behind a reverse proxy), otherwise the peer address.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, header::HeaderName},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::{
    net::SocketAddr,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use crate::{AppState, errors::Error};

const HEADER_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const HEADER_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const HEADER_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const MAX_TRACKED_CLIENTS: usize = 10_000;

struct WindowState {
    started: Instant,
    count: u32,
}

/// The outcome of a rate-limit check, carrying what the response headers need.
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

/// Fixed-window request counter keyed by client identity.
pub struct RateLimiter {
    windows: DashMap<String, WindowState>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
        }
    }

    /// Count a request for `key` and decide whether it may proceed
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();

        if self.windows.len() >= MAX_TRACKED_CLIENTS {
            let window = self.window;
            self.windows.retain(|_, state| now.duration_since(state.started) < window);
        }

        let mut entry = self.windows.entry(key.to_string()).or_insert_with(|| WindowState {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        let allowed = entry.count < self.max_requests;
        if allowed {
            entry.count += 1;
        }

        RateLimitDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.count),
            reset_after: self.window.saturating_sub(now.duration_since(entry.started)),
        }
    }
}

/// Pick the identity a request is rate limited under
fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        && let Some(first_hop) = forwarded.split(',').next()
    {
        let first_hop = first_hop.trim();
        if !first_hop.is_empty() {
            return first_hop.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn apply_headers(response: &mut Response, decision: &RateLimitDecision) {
    let reset_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        + decision.reset_after.as_secs();

    let headers = response.headers_mut();
    headers.insert(HEADER_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(HEADER_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(HEADER_RESET, HeaderValue::from(reset_epoch));
}

/// Middleware guarding the magic-link endpoint
pub async fn magic_link_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = client_key(&request);
    let decision = state.magic_link_limiter.check(&key);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::info!(client = %key, "magic-link request rate limited");
        Error::RateLimited {
            retry_after: Some(decision.reset_after),
        }
        .into_response()
    };

    apply_headers(&mut response, &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_enforced_per_key() {
        let limiter = RateLimiter::new(Duration::from_secs(3600), 2);

        let first = limiter.check("1.2.3.4");
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        let second = limiter.check("1.2.3.4");
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = limiter.check("1.2.3.4");
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);

        // Distinct clients get their own window
        assert!(limiter.check("5.6.7.8").allowed);
    }

    #[test]
    fn test_window_rollover_resets_count() {
        let limiter = RateLimiter::new(Duration::ZERO, 1);

        assert!(limiter.check("1.2.3.4").allowed);
        // The zero-length window has already rolled over
        assert!(limiter.check("1.2.3.4").allowed);
    }

    #[test]
    fn test_decision_reports_limit() {
        let limiter = RateLimiter::new(Duration::from_secs(3600), 5);
        let decision = limiter.check("1.2.3.4");
        assert_eq!(decision.limit, 5);
        assert!(decision.reset_after <= Duration::from_secs(3600));
    }
}
