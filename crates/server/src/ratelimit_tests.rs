// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn policy(max_requests: u32, burst: Option<u32>) -> RateLimitPolicy {
    RateLimitPolicy {
        default: BucketPolicy { max_requests, window_seconds: 60, burst_size: burst },
        endpoints: HashMap::new(),
        settings: PolicySettings {
            enable_rate_limiting: true,
            whitelist_localhost: false,
            log_violations: false,
        },
    }
}

fn remote_ip() -> IpAddr {
    "203.0.113.7".parse().unwrap()
}

#[test]
fn allows_until_bucket_is_drained() {
    let limiter = RateLimiter::new(policy(3, None), None);
    let ip = remote_ip();

    for i in 0..3 {
        match limiter.check(ip, "/api/runs") {
            Decision::Allowed { remaining, limit, .. } => {
                assert_eq!(limit, 3);
                assert_eq!(remaining, 2 - i);
            }
            other => panic!("request {} unexpectedly limited: {:?}", i, other),
        }
    }
    match limiter.check(ip, "/api/runs") {
        Decision::Limited { retry_after_secs, .. } => assert!(retry_after_secs >= 1),
        other => panic!("expected limited, got {:?}", other),
    }
}

#[test]
fn buckets_are_per_ip_and_endpoint() {
    let limiter = RateLimiter::new(policy(1, None), None);
    let a = remote_ip();
    let b: IpAddr = "203.0.113.8".parse().unwrap();

    assert!(matches!(limiter.check(a, "/api/runs"), Decision::Allowed { .. }));
    assert!(matches!(limiter.check(a, "/api/runs"), Decision::Limited { .. }));
    // Different ip: fresh bucket
    assert!(matches!(limiter.check(b, "/api/runs"), Decision::Allowed { .. }));
    // Different endpoint: fresh bucket
    assert!(matches!(limiter.check(a, "/api/paths"), Decision::Allowed { .. }));
}

#[test]
fn localhost_whitelist_bypasses_limits() {
    let mut p = policy(1, None);
    p.settings.whitelist_localhost = true;
    let limiter = RateLimiter::new(p, None);
    let localhost: IpAddr = "127.0.0.1".parse().unwrap();

    for _ in 0..10 {
        assert!(matches!(
            limiter.check(localhost, "/api/runs"),
            Decision::Allowed { .. }
        ));
    }
}

#[test]
fn disabled_limiter_always_allows() {
    let mut p = policy(1, None);
    p.settings.enable_rate_limiting = false;
    let limiter = RateLimiter::new(p, None);

    for _ in 0..10 {
        assert!(matches!(
            limiter.check(remote_ip(), "/api/runs"),
            Decision::Allowed { .. }
        ));
    }
}

#[test]
fn burst_size_overrides_capacity() {
    let limiter = RateLimiter::new(policy(100, Some(2)), None);
    let ip = remote_ip();

    assert!(matches!(limiter.check(ip, "/e"), Decision::Allowed { .. }));
    assert!(matches!(limiter.check(ip, "/e"), Decision::Allowed { .. }));
    assert!(matches!(limiter.check(ip, "/e"), Decision::Limited { .. }));
}

#[test]
fn per_endpoint_policy_wins_over_default() {
    let mut p = policy(100, None);
    p.endpoints.insert(
        "/api/remote/connect".to_string(),
        BucketPolicy { max_requests: 1, window_seconds: 60, burst_size: None },
    );
    let limiter = RateLimiter::new(p, None);
    let ip = remote_ip();

    assert!(matches!(limiter.check(ip, "/api/remote/connect"), Decision::Allowed { .. }));
    assert!(matches!(limiter.check(ip, "/api/remote/connect"), Decision::Limited { .. }));
    // The default policy still applies elsewhere
    assert!(matches!(limiter.check(ip, "/api/runs"), Decision::Allowed { .. }));
}

#[test]
fn policy_file_hot_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rate_limit.json");
    std::fs::write(
        &path,
        serde_json::to_vec(&policy(1, None)).unwrap(),
    )
    .unwrap();

    let limiter = RateLimiter::new(policy(1, None), Some(path.clone()));
    let ip = remote_ip();
    assert!(matches!(limiter.check(ip, "/e"), Decision::Allowed { .. }));
    assert!(matches!(limiter.check(ip, "/e"), Decision::Limited { .. }));

    // Raise the limit on disk; force the mtime check window to elapse
    std::fs::write(&path, serde_json::to_vec(&policy(100, None)).unwrap()).unwrap();
    {
        let mut state = limiter.state.lock();
        state.last_reload_check = Instant::now() - RELOAD_CHECK_EVERY - Duration::from_secs(1);
    }
    assert!(matches!(limiter.check(ip, "/e"), Decision::Allowed { .. }));
}

#[test]
fn policy_document_round_trips_schema() {
    let json = r#"{
        "default": {"max_requests": 600, "window_seconds": 60},
        "endpoints": {
            "/api/remote/connect": {"max_requests": 10, "window_seconds": 60, "burst_size": 3}
        },
        "settings": {"enable_rate_limiting": true, "whitelist_localhost": true, "log_violations": false}
    }"#;
    let policy: RateLimitPolicy = serde_json::from_str(json).unwrap();
    assert_eq!(policy.for_endpoint("/api/remote/connect").max_requests, 10);
    assert_eq!(policy.for_endpoint("/api/anything").max_requests, 600);
    assert!(!policy.settings.log_violations);
}
