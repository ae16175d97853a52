// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-bucket rate limiting
//!
//! Buckets are keyed `(client_ip, endpoint)`. Policy lives in a JSON file
//! next to the main config and is hot-reloaded on mtime change, so limits
//! can be tuned without restarting the Viewer. The off-the-shelf limiters
//! hide bucket internals; this layer must surface remaining tokens and
//! reset times in response headers, so the bucket is explicit.

use crate::SharedState;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};
use tracing::{info, warn};

/// Per-endpoint bucket parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BucketPolicy {
    pub max_requests: u32,
    pub window_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst_size: Option<u32>,
}

impl BucketPolicy {
    fn capacity(&self) -> f64 {
        f64::from(self.burst_size.unwrap_or(self.max_requests))
    }

    fn refill_per_sec(&self) -> f64 {
        f64::from(self.max_requests) / self.window_seconds.max(1) as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicySettings {
    pub enable_rate_limiting: bool,
    pub whitelist_localhost: bool,
    pub log_violations: bool,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self { enable_rate_limiting: true, whitelist_localhost: true, log_violations: true }
    }
}

/// The JSON policy document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitPolicy {
    pub default: BucketPolicy,
    pub endpoints: HashMap<String, BucketPolicy>,
    pub settings: PolicySettings,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            default: BucketPolicy { max_requests: 600, window_seconds: 60, burst_size: None },
            endpoints: HashMap::new(),
            settings: PolicySettings::default(),
        }
    }
}

impl RateLimitPolicy {
    pub fn for_endpoint(&self, endpoint: &str) -> &BucketPolicy {
        self.endpoints.get(endpoint).unwrap_or(&self.default)
    }
}

struct Bucket {
    tokens: f64,
    refilled: Instant,
}

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allowed { limit: u32, remaining: u32, reset_epoch: u64 },
    Limited { limit: u32, retry_after_secs: u64, reset_epoch: u64 },
}

struct LimiterState {
    policy: RateLimitPolicy,
    policy_mtime: Option<SystemTime>,
    last_reload_check: Instant,
    buckets: HashMap<(IpAddr, String), Bucket>,
}

/// Process-wide limiter.
pub struct RateLimiter {
    enabled: bool,
    policy_path: Option<PathBuf>,
    state: Mutex<LimiterState>,
}

const RELOAD_CHECK_EVERY: Duration = Duration::from_secs(2);

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy, policy_path: Option<PathBuf>) -> Self {
        Self {
            enabled: true,
            policy_path,
            state: Mutex::new(LimiterState {
                policy,
                policy_mtime: None,
                last_reload_check: Instant::now(),
                buckets: HashMap::new(),
            }),
        }
    }

    /// Build from the main config: the separate JSON policy file wins when
    /// present; `security.*` keys seed the default bucket otherwise.
    pub fn from_config(config: &rn_core::Config) -> Self {
        let policy_path = rn_core::Config::rate_limit_path().ok();
        let mut policy = RateLimitPolicy::default();
        policy.default.max_requests = config.security.rate_limit_per_minute;
        policy.default.window_seconds = 60;
        if let Some(path) = &policy_path {
            if let Some(loaded) = load_policy(path) {
                policy = loaded;
            }
        }
        let mut limiter = Self::new(policy, policy_path);
        limiter.enabled = config.security.enable_rate_limit;
        limiter
    }

    /// Admission check for one request.
    pub fn check(&self, ip: IpAddr, endpoint: &str) -> Decision {
        let mut state = self.state.lock();
        self.maybe_reload(&mut state);

        let policy = state.policy.for_endpoint(endpoint).clone();
        let settings = state.policy.settings.clone();

        if !self.enabled || !settings.enable_rate_limiting {
            return allowed_unlimited(&policy);
        }
        if settings.whitelist_localhost && ip.is_loopback() {
            return allowed_unlimited(&policy);
        }

        let now = Instant::now();
        let bucket = state
            .buckets
            .entry((ip, endpoint.to_string()))
            .or_insert_with(|| Bucket { tokens: policy.capacity(), refilled: now });

        // Refill for elapsed time, clamped to capacity
        let elapsed = now.duration_since(bucket.refilled).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * policy.refill_per_sec()).min(policy.capacity());
        bucket.refilled = now;

        let reset_epoch = epoch_now()
            + ((policy.capacity() - bucket.tokens) / policy.refill_per_sec()).ceil() as u64;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Decision::Allowed {
                limit: policy.max_requests,
                remaining: bucket.tokens.floor() as u32,
                reset_epoch,
            }
        } else {
            let retry_after_secs =
                ((1.0 - bucket.tokens) / policy.refill_per_sec()).ceil().max(1.0) as u64;
            if settings.log_violations {
                warn!(%ip, endpoint, "rate limit exceeded");
            }
            Decision::Limited { limit: policy.max_requests, retry_after_secs, reset_epoch }
        }
    }

    fn maybe_reload(&self, state: &mut LimiterState) {
        let Some(path) = &self.policy_path else {
            return;
        };
        if state.last_reload_check.elapsed() < RELOAD_CHECK_EVERY {
            return;
        }
        state.last_reload_check = Instant::now();

        let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        if mtime == state.policy_mtime {
            return;
        }
        state.policy_mtime = mtime;
        if let Some(policy) = load_policy(path) {
            info!(path = %path.display(), "rate-limit policy reloaded");
            state.policy = policy;
            state.buckets.clear();
        }
    }
}

fn allowed_unlimited(policy: &BucketPolicy) -> Decision {
    Decision::Allowed {
        limit: policy.max_requests,
        remaining: policy.max_requests,
        reset_epoch: epoch_now(),
    }
}

fn load_policy(path: &std::path::Path) -> Option<RateLimitPolicy> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(policy) => Some(policy),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed rate-limit policy");
            None
        }
    }
}

fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Axum middleware applying the limiter to every request.
pub async fn middleware(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    let endpoint = request.uri().path().to_string();
    match state.limiter.check(addr.ip(), &endpoint) {
        Decision::Allowed { limit, remaining, reset_epoch } => {
            let mut response = next.run(request).await;
            set_headers(&mut response, limit, remaining, reset_epoch);
            response
        }
        Decision::Limited { limit, retry_after_secs, reset_epoch } => {
            let body = axum::Json(serde_json::json!({
                "detail": "rate limit exceeded",
                "code": "RATE_LIMITED",
            }));
            let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            set_headers(&mut response, limit, 0, reset_epoch);
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
            response
        }
    }
}

fn set_headers(response: &mut Response, limit: u32, remaining: u32, reset_epoch: u64) {
    let headers = response.headers_mut();
    for (name, value) in [
        ("X-RateLimit-Limit", limit.to_string()),
        ("X-RateLimit-Remaining", remaining.to_string()),
        ("X-RateLimit-Reset", reset_epoch.to_string()),
    ] {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

#[cfg(test)]
#[path = "ratelimit_tests.rs"]
mod tests;
