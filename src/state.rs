//! Shared per-process state.
//!
//! Counters and rate-limit buckets are the only mutable shared state in
//! the service. Both live here behind their own mutexes, injected into
//! the router so tests get a fresh state per instance. Everything
//! resets on process restart; nothing is persisted.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::limiter::RateLimiter;
use crate::provider::OpenRouterClient;

/// Process-wide request counters, reset only on restart.
#[derive(Debug, Default)]
pub struct Counters {
    pub free_calls: u64,
    pub pro_calls: u64,
    pub fallback_uses: u64,
    pub blocked_rate: u64,
}

/// Snapshot returned by `GET /metrics`. Never includes prompt content.
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub free_calls: u64,
    pub pro_calls: u64,
    pub fallback_uses: u64,
    pub blocked_rate: u64,
    pub since: String,
}

#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub limiter: RateLimiter,
    pub provider: OpenRouterClient,
    counters: Mutex<Counters>,
    since: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window);
        let provider = OpenRouterClient::new(&config)?;
        Ok(Self {
            config,
            limiter,
            provider,
            counters: Mutex::new(Counters::default()),
            since: Utc::now(),
        })
    }

    /// Apply a counter update atomically. Lock poisoning is tolerated:
    /// counters are plain integers and stay valid across a panic.
    pub fn bump(&self, update: impl FnOnce(&mut Counters)) {
        let mut counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        update(&mut counters);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        MetricsSnapshot {
            free_calls: counters.free_calls,
            pro_calls: counters.pro_calls,
            fallback_uses: counters.fallback_uses,
            blocked_rate: counters.blocked_rate,
            since: self.since.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bumps_accumulate_without_loss() {
        let state = AppState::new(Config::default()).unwrap();
        for _ in 0..5 {
            state.bump(|c| c.free_calls += 1);
        }
        state.bump(|c| c.blocked_rate += 1);
        let snapshot = state.metrics();
        assert_eq!(snapshot.free_calls, 5);
        assert_eq!(snapshot.blocked_rate, 1);
        assert_eq!(snapshot.pro_calls, 0);
    }
}
