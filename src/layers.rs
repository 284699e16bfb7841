// src/layers.rs
//! Request logging and per-client rate limiting.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

/// Windows are swept once the table grows past this many clients.
const SWEEP_THRESHOLD: usize = 10_000;

/// Address shown in the request log: the first `X-Forwarded-For` entry, then
/// `X-Real-IP`, then the socket peer. Clients can write these headers, so
/// this is for display only.
pub fn client_ip(req: &Request) -> String {
    let headers = req.headers();
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_str(headers, "x-real-ip").map(str::trim).filter(|v| !v.is_empty()))
        .map(str::to_owned)
        .or_else(|| peer_ip(req))
        .unwrap_or_else(|| "unknown".into())
}

/// Address the rate limiter counts against. One proxy hop is trusted, so
/// only the entry that proxy appended (the last one) is believed; without
/// a forwarded header the socket peer is used.
pub fn rate_limit_key(req: &Request) -> String {
    header_str(req.headers(), "x-forwarded-for")
        .and_then(|v| v.rsplit(',').map(str::trim).find(|v| !v.is_empty()))
        .map(str::to_owned)
        .or_else(|| peer_ip(req))
        .unwrap_or_else(|| "unknown".into())
}

fn peer_ip(req: &Request) -> Option<String> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let client = client_ip(&req);
    let res = next.run(req).await;
    info!("[REQ] {method} {path} → {client} | {}", res.status().as_u16());
    res
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    started: Instant,
    hits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub remaining: u32,
    pub reset: Duration,
}

/// Fixed-window counter keyed by client address.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, Window>>>,
    max: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max,
            window,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.max == 0
    }

    pub fn check(&self, client: &str, now: Instant) -> Verdict {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        if windows.len() > SWEEP_THRESHOLD {
            let span = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < span);
        }

        let entry = windows.entry(client.to_owned()).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                hits: 0,
            };
        }
        entry.hits = entry.hits.saturating_add(1);

        Verdict {
            allowed: entry.hits <= self.max,
            remaining: self.max.saturating_sub(entry.hits),
            reset: self.window.saturating_sub(now.duration_since(entry.started)),
        }
    }

    fn annotate(&self, headers: &mut HeaderMap, verdict: &Verdict) {
        // round the reset up so clients never retry a moment too early
        let reset = verdict.reset.as_secs() + u64::from(verdict.reset.subsec_nanos() > 0);
        for (name, value) in [
            ("ratelimit-limit", u64::from(self.max)),
            ("ratelimit-remaining", u64::from(verdict.remaining)),
            ("ratelimit-reset", reset),
        ] {
            headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
        }
    }
}

pub async fn rate_limit(State(limiter): State<RateLimiter>, req: Request, next: Next) -> Response {
    if limiter.is_disabled() {
        return next.run(req).await;
    }
    let client = rate_limit_key(&req);
    let verdict = limiter.check(&client, Instant::now());
    let mut res = if verdict.allowed {
        next.run(req).await
    } else {
        warn!("rate limit exceeded for {client}");
        (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests, please try again later.",
        )
            .into_response()
    };
    limiter.annotate(res.headers_mut(), &verdict);
    res
}
