//! Keyed rolling-window counters.
//!
//! RULE: This store owns its map exclusively — no other component
//! mutates counters directly. Counters reset *lazily*: the first access
//! after the window lapses zeroes the entry and re-anchors the window.
//! Nothing sweeps proactively except CleanupSweeper, and that is memory
//! reclamation only — correctness never depends on it.
//!
//! Concurrency: the map is split into shards, each behind its own
//! mutex. A key's read-reset-apply sequence runs entirely under its
//! shard lock, so per-key updates are linearizable and a race across a
//! window boundary resolves to "reset then apply" for exactly one of
//! the racers. No ordering is guaranteed across distinct keys.

use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const SHARD_COUNT: usize = 16;

/// Point-in-time view of one counter, returned by increment/peek.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSnapshot {
    pub count: u64,
    pub sum:   f64,
}

#[derive(Debug, Clone)]
struct WindowedCounter {
    count:        u64,
    accumulated:  f64,
    window_start: DateTime<Utc>,
}

impl WindowedCounter {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self { count: 0, accumulated: 0.0, window_start: now }
    }

    /// Lazy reset: zero and re-anchor if the window has lapsed.
    fn roll(&mut self, now: DateTime<Utc>, window: Duration) {
        if now > self.window_start + window {
            self.count = 0;
            self.accumulated = 0.0;
            self.window_start = now;
        }
    }

    fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot { count: self.count, sum: self.accumulated }
    }
}

pub struct WindowedCounterStore {
    shards: Vec<Mutex<HashMap<String, WindowedCounter>>>,
    window: Duration,
    clock:  Arc<dyn Clock>,
}

impl WindowedCounterStore {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        let shards = (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect();
        Self { shards, window, clock }
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, WindowedCounter>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Add one event of `amount` to `key`, returning the post-increment
    /// count and sum for the current window.
    pub fn increment(&self, key: &str, amount: f64) -> WindowSnapshot {
        let now = self.clock.now();
        let mut shard = self.shard(key).lock();
        let counter = shard
            .entry(key.to_string())
            .or_insert_with(|| WindowedCounter::fresh(now));
        counter.roll(now, self.window);
        counter.count += 1;
        counter.accumulated += amount;
        counter.snapshot()
    }

    /// Read `key` without adding an event. Still applies the lazy reset,
    /// so an expired counter reads as zero. Unknown keys read as zero
    /// without allocating an entry.
    pub fn peek(&self, key: &str) -> WindowSnapshot {
        let now = self.clock.now();
        let mut shard = self.shard(key).lock();
        match shard.get_mut(key) {
            Some(counter) => {
                counter.roll(now, self.window);
                counter.snapshot()
            }
            None => WindowSnapshot { count: 0, sum: 0.0 },
        }
    }

    /// Evict counters whose window has lapsed. Called by CleanupSweeper;
    /// locks one shard at a time so request-path increments on other
    /// shards are never stalled.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut evicted = 0;
        for shard in &self.shards {
            let mut shard = shard.lock();
            let before = shard.len();
            shard.retain(|_, counter| now <= counter.window_start + self.window);
            evicted += before - shard.len();
        }
        if evicted > 0 {
            log::debug!("counter sweep evicted {evicted} expired entries");
        }
        evicted
    }

    /// Number of live counters across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
