//! Sliding-window admission control for write endpoints.
//!
//! Each key (`action:ip:identity`) owns an ordered sequence of admission
//! timestamps.  A check evicts entries older than the window from the front
//! (insertion order is monotonic, so a linear scan from the oldest end
//! suffices), rejects when the remainder has reached the limit, and appends
//! the new admission otherwise.  Rejection leaves the sequence untouched.
//!
//! State is in-memory and process-wide: budgets reset on restart, and
//! horizontally scaled deployments each enforce their own budget.

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use tokio::sync::Mutex;

use crate::config::RateBudget;

#[derive(Clone, Default)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate whether a new event under `key` is admissible, and record it
    /// if so.  Returns `false` without side effects when the budget is
    /// exhausted.
    pub async fn check(&self, key: &str, budget: RateBudget) -> bool {
        self.check_at(key, budget, Instant::now()).await
    }

    async fn check_at(&self, key: &str, budget: RateBudget, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(key.to_string()).or_default();

        while let Some(oldest) = bucket.front() {
            if now.duration_since(*oldest) > budget.window {
                bucket.pop_front();
            } else {
                break;
            }
        }

        if bucket.len() >= budget.limit {
            return false;
        }

        bucket.push_back(now);
        true
    }

    /// Drop buckets whose newest admission is older than `max_idle`.
    pub async fn purge_stale(&self, max_idle: Duration) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        buckets.retain(|_, bucket| {
            bucket
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < max_idle)
        });
    }
}

/// Build the limiter key for one action by one caller.
///
/// The tail of the caller's credential distinguishes authenticated users
/// sharing an IP while keeping key cardinality bounded; anonymous callers
/// share a per-IP `"guest"` bucket.
pub fn limiter_key(action: &str, ip: IpAddr, credential: Option<&str>) -> String {
    let identity = match credential {
        Some(cred) => credential_tail(cred),
        None => "guest",
    };
    format!("{action}:{ip}:{identity}")
}

/// Last 16 characters of the credential (the whole credential when shorter).
fn credential_tail(credential: &str) -> &str {
    let len = credential.chars().count();
    let skip = len.saturating_sub(16);
    match credential.char_indices().nth(skip) {
        Some((byte_idx, _)) => &credential[byte_idx..],
        None => credential,
    }
}

/// Try X-Forwarded-For first, then X-Real-IP, then the peer address.
pub fn extract_client_ip(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            if let Ok(ip) = value.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }

    peer.ip()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET: RateBudget = RateBudget::new(2, 60);

    #[tokio::test]
    async fn test_window_admits_rejects_then_recovers() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();

        assert!(limiter.check_at("like:1.2.3.4:guest", BUDGET, t0).await);
        assert!(
            limiter
                .check_at("like:1.2.3.4:guest", BUDGET, t0 + Duration::from_secs(1))
                .await
        );
        // Third call inside the window: over budget.
        assert!(
            !limiter
                .check_at("like:1.2.3.4:guest", BUDGET, t0 + Duration::from_secs(2))
                .await
        );
        // After the window elapses the oldest admissions age out.
        assert!(
            limiter
                .check_at("like:1.2.3.4:guest", BUDGET, t0 + Duration::from_secs(61))
                .await
        );
    }

    #[tokio::test]
    async fn test_rejection_has_no_side_effect() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();

        assert!(limiter.check_at("k", BUDGET, t0).await);
        assert!(limiter.check_at("k", BUDGET, t0).await);
        for i in 0..10 {
            // Rejections must not extend the window.
            assert!(
                !limiter
                    .check_at("k", BUDGET, t0 + Duration::from_secs(3 + i))
                    .await
            );
        }
        assert!(
            limiter
                .check_at("k", BUDGET, t0 + Duration::from_secs(62))
                .await
        );
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();

        assert!(limiter.check_at("like:10.0.0.1:guest", BUDGET, t0).await);
        assert!(limiter.check_at("like:10.0.0.1:guest", BUDGET, t0).await);
        assert!(!limiter.check_at("like:10.0.0.1:guest", BUDGET, t0).await);

        assert!(limiter.check_at("like:10.0.0.2:guest", BUDGET, t0).await);
        assert!(limiter.check_at("comment:10.0.0.1:guest", BUDGET, t0).await);
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("k", BUDGET).await);

        limiter.purge_stale(Duration::ZERO).await;

        let buckets = limiter.buckets.lock().await;
        assert!(buckets.is_empty());
    }

    #[test]
    fn test_limiter_key_shapes() {
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(limiter_key("like", ip, None), "like:10.0.0.1:guest");
        assert_eq!(
            limiter_key("like", ip, Some("Bearer abcdefghijklmnopqrstuvwxyz")),
            "like:10.0.0.1:klmnopqrstuvwxyz"
        );
        assert_eq!(limiter_key("like", ip, Some("short")), "like:10.0.0.1:short");
    }

    #[test]
    fn test_extract_client_ip_prefers_forwarded_headers() {
        let peer: SocketAddr = "127.0.0.1:9999".parse().unwrap();

        let headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers, peer), peer.ip());

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(
            extract_client_ip(&headers, peer),
            "203.0.113.9".parse::<IpAddr>().unwrap()
        );

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.4".parse().unwrap());
        assert_eq!(
            extract_client_ip(&headers, peer),
            "198.51.100.4".parse::<IpAddr>().unwrap()
        );
    }
}
