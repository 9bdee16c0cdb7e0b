//! Per-key token-bucket rate limiting.
//!
//! Built independently of the windowed counters: buckets refill
//! continuously in proportion to elapsed time instead of resetting at
//! window boundaries. Each key is its own bucket — no fairness or
//! priority across keys. Key derivation (API key vs client address) is
//! the caller's concern.
//!
//! A denial is a normal control-flow outcome, not an error.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const SHARD_COUNT: usize = 16;

/// Anything that can answer allow/deny for a key. The concrete
/// `RateLimiter` implements this; `LoggedLimiter` wraps any impl.
pub trait Limiter: Send + Sync {
    fn try_consume(&self, key: &str) -> bool;
}

#[derive(Debug, Clone)]
struct RateBucket {
    tokens:      f64,
    last_refill: DateTime<Utc>,
}

impl RateBucket {
    fn full(burst: f64, now: DateTime<Utc>) -> Self {
        Self { tokens: burst, last_refill: now }
    }

    /// Lazy refill, proportional to elapsed time. Tokens never exceed
    /// the burst capacity and never go negative.
    fn refill(&mut self, now: DateTime<Utc>, burst: f64, rate_per_second: f64) {
        let elapsed_ms = (now - self.last_refill).num_milliseconds();
        if elapsed_ms > 0 {
            let gained = (elapsed_ms as f64 / 1000.0) * rate_per_second;
            self.tokens = (self.tokens + gained).min(burst);
            self.last_refill = now;
        }
    }
}

pub struct RateLimiter {
    shards:            Vec<Mutex<HashMap<String, RateBucket>>>,
    burst:             f64,
    refill_per_second: f64,
    enabled:           bool,
    clock:             Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(burst: f64, refill_per_second: f64, enabled: bool, clock: Arc<dyn Clock>) -> Self {
        let shards = (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect();
        Self { shards, burst, refill_per_second, enabled, clock }
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, RateBucket>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Evict buckets that have been idle long enough to refill
    /// completely — an untouched full bucket is indistinguishable from
    /// a fresh one, so dropping it loses nothing.
    pub fn sweep_idle(&self) -> usize {
        let now = self.clock.now();
        let mut evicted = 0;
        for shard in &self.shards {
            let mut shard = shard.lock();
            let before = shard.len();
            shard.retain(|_, bucket| {
                let mut probe = bucket.clone();
                probe.refill(now, self.burst, self.refill_per_second);
                probe.tokens < self.burst
            });
            evicted += before - shard.len();
        }
        if evicted > 0 {
            log::debug!("rate limiter sweep evicted {evicted} idle buckets");
        }
        evicted
    }

    /// Number of live buckets across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Limiter for RateLimiter {
    fn try_consume(&self, key: &str) -> bool {
        if !self.enabled {
            return true;
        }
        let now = self.clock.now();
        let mut shard = self.shard(key).lock();
        let bucket = shard
            .entry(key.to_string())
            .or_insert_with(|| RateBucket::full(self.burst, now));
        bucket.refill(now, self.burst, self.refill_per_second);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
