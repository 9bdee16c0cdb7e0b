//! Cleanup sweeper: background eviction across all three stores, and a
//! clean start/stop lifecycle.

use chrono::Duration;
use creditguard_core::clock::ManualClock;
use creditguard_core::config::OtpConfig;
use creditguard_core::counter::WindowedCounterStore;
use creditguard_core::notify::LogDispatcher;
use creditguard_core::otp::{OtpChannel, OtpVerifier};
use creditguard_core::rate_limiter::{Limiter, RateLimiter};
use creditguard_core::sweeper::{CleanupSweeper, SweepTargets};
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Populate every store with state that should expire, jump the clock,
/// and let the background sweeper reclaim it all.
#[test]
fn sweeper_evicts_across_all_stores() {
    let clock = Arc::new(ManualClock::epoch());
    let counters = Arc::new(WindowedCounterStore::new(Duration::minutes(60), clock.clone()));
    let limiter = Arc::new(RateLimiter::new(5.0, 10.0, true, clock.clone()));
    let otp = Arc::new(OtpVerifier::new(
        OtpConfig::default(),
        Arc::new(LogDispatcher),
        clock.clone(),
    ));

    counters.increment("acct-1", 10.0);
    limiter.try_consume("client-1");
    otp.generate("user-1", OtpChannel::Sms).unwrap();

    // Far enough for the counter window, the bucket refill, and the
    // OTP ttl to all lapse.
    clock.advance(Duration::hours(2));

    let mut sweeper = CleanupSweeper::start(
        StdDuration::from_millis(20),
        SweepTargets {
            counters: counters.clone(),
            limiter: limiter.clone(),
            otp: otp.clone(),
            clock: clock.clone(),
        },
    );

    // Give the background thread a few intervals to run.
    let deadline = std::time::Instant::now() + StdDuration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if counters.is_empty() && limiter.is_empty() && otp.record_count() == 0 {
            break;
        }
        std::thread::sleep(StdDuration::from_millis(10));
    }

    assert!(counters.is_empty(), "expired counter not evicted");
    assert!(limiter.is_empty(), "idle bucket not evicted");
    assert_eq!(otp.record_count(), 0, "expired otp record not retired");

    sweeper.stop();
}

/// stop() is prompt and idempotent, and Drop after stop is harmless.
#[test]
fn sweeper_stops_cleanly() {
    let clock = Arc::new(ManualClock::epoch());
    let counters = Arc::new(WindowedCounterStore::new(Duration::minutes(60), clock.clone()));
    let limiter = Arc::new(RateLimiter::new(5.0, 10.0, true, clock.clone()));
    let otp = Arc::new(OtpVerifier::new(
        OtpConfig::default(),
        Arc::new(LogDispatcher),
        clock.clone(),
    ));

    let mut sweeper = CleanupSweeper::start(
        // A long interval: stop must not wait it out.
        StdDuration::from_secs(3600),
        SweepTargets { counters, limiter, otp, clock },
    );
    let started = std::time::Instant::now();
    sweeper.stop();
    sweeper.stop();
    assert!(
        started.elapsed() < StdDuration::from_secs(5),
        "stop should interrupt the sleeping sweeper"
    );
}
