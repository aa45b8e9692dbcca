//! Sliding-window request rate limiting.
//!
//! Keeps an ordered timestamp bucket per client identity and rejects a
//! request when the trailing window already holds the maximum. A pure
//! in-memory check: nothing persists across restarts and no entry for a
//! rejected request is appended, so a blocked client is not pinned
//! above the limit forever.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_REQUESTS: usize = 30;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Client identity used when no forwarded header or peer address is
/// available, or when the header value is malformed.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    buckets: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Check and record a request from `client`.
    ///
    /// Prunes entries older than the window, then either rejects (at or
    /// above the maximum) or appends the current timestamp and admits.
    pub fn is_limited(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            // A poisoned bucket map only means another check panicked
            // mid-update; the timestamps themselves are still usable.
            Err(poisoned) => poisoned.into_inner(),
        };
        let bucket = buckets.entry(client.to_string()).or_default();

        while let Some(front) = bucket.front() {
            if now.duration_since(*front) > self.window {
                bucket.pop_front();
            } else {
                break;
            }
        }

        if bucket.len() >= self.max_requests {
            return true;
        }

        bucket.push_back(now);
        false
    }
}

/// Derive a client identity from the first `X-Forwarded-For` value when
/// present, else the direct peer address, else the sentinel.
pub fn client_key(forwarded_for: Option<&str>, peer: Option<std::net::IpAddr>) -> String {
    if let Some(header) = forwarded_for {
        if let Some(first) = header.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    match peer {
        Some(addr) => addr.to_string(),
        None => UNKNOWN_CLIENT.to_string(),
    }
}
