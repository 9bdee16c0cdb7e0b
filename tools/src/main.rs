//! guard-runner: headless driver for the abuse-detection core.
//!
//! Feeds a deterministic synthetic event stream through the rate
//! limiter and risk scorer, then prints a summary of what was flagged.
//!
//! Usage:
//!   guard-runner --seed 42 --events 1000 --subjects 50 --db guard.db

use anyhow::Result;
use chrono::Duration;
use creditguard_core::{
    audit::{LoggedLimiter, LoggedScorer},
    case_tracker::SuspiciousCaseTracker,
    clock::{Clock, ManualClock},
    config::GuardConfig,
    counter::WindowedCounterStore,
    event::{EventKind, RiskLevel, ScoreEvent},
    notify::LogDispatcher,
    otp::{OtpChannel, OtpVerifier},
    rate_limiter::{Limiter, RateLimiter},
    rules::RuleEngine,
    scorer::{RiskScorer, Scorer},
    store::GuardStore,
};
use rand::Rng;
use rand_pcg::Pcg64;
use std::env;
use std::sync::Arc;

const KINDS: [EventKind; 4] = [
    EventKind::Transaction,
    EventKind::CreditApplication,
    EventKind::CustomerInfoUpdate,
    EventKind::Login,
];

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let events = parse_arg(&args, "--events", 1000u64);
    let subjects = parse_arg(&args, "--subjects", 50u64).max(1);
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");

    let config = GuardConfig::default();
    config.validate()?;

    let clock = Arc::new(ManualClock::epoch());
    let store = Arc::new(if db == ":memory:" {
        GuardStore::in_memory()?
    } else {
        GuardStore::open(db)?
    });
    store.migrate()?;

    let counters = Arc::new(WindowedCounterStore::new(
        Duration::minutes(config.fraud.time_window_minutes),
        clock.clone(),
    ));
    let tracker = Arc::new(SuspiciousCaseTracker::new(store.clone(), clock.clone()));
    let scorer = LoggedScorer::new(RiskScorer::new(
        config.fraud.clone(),
        counters,
        RuleEngine::with_standard_rules(),
        tracker.clone(),
    ));
    let limiter = LoggedLimiter::new(RateLimiter::new(
        config.rate_limit.burst,
        config.rate_limit.refill_per_second,
        config.rate_limit.enabled,
        clock.clone(),
    ));
    let otp = OtpVerifier::new(config.otp.clone(), Arc::new(LogDispatcher), clock.clone());

    let mut rng = Pcg64::new(seed as u128, 0xa02bdbf7bb3c0a7);
    let mut throttled = 0u64;
    let mut scored = 0u64;
    let mut high = 0u64;

    for _ in 0..events {
        // A fraction of a second between arrivals, so buckets refill
        // and windows roll realistically over a long run.
        clock.advance(Duration::milliseconds(rng.gen_range(20..500)));

        let subject = format!("c-{:04}", rng.gen_range(0..subjects));
        let kind = KINDS[rng.gen_range(0..KINDS.len())];
        let amount = match kind {
            EventKind::Transaction | EventKind::CreditApplication => {
                // Mostly small, with a heavy tail that trips the
                // amount thresholds now and then.
                let base: f64 = rng.gen_range(10.0..2_000.0);
                if rng.gen_bool(0.02) {
                    Some(base * rng.gen_range(30.0..80.0))
                } else {
                    Some(base)
                }
            }
            _ => None,
        };

        if !limiter.try_consume(&subject) {
            throttled += 1;
            continue;
        }

        let event = ScoreEvent {
            subject_id: subject,
            kind,
            amount,
            ip_address: Some(format!("10.0.{}.{}", rng.gen_range(0..8), rng.gen_range(1..255))),
            user_agent: Some("guard-runner/0.1".to_string()),
            occurred_at: clock.now(),
        };
        let assessment = scorer.score(&event)?;
        scored += 1;
        if assessment.level == RiskLevel::High {
            high += 1;
        }
    }

    // Exercise the OTP path once so a full run touches every subsystem.
    let code = otp.generate("demo-user", OtpChannel::Sms)?;
    let verified = otp.verify("demo-user", &code, OtpChannel::Sms)?;

    let metrics = tracker.metrics()?;
    println!("guard-runner seed={seed} events={events}");
    println!("  scored:    {scored} ({high} high risk)");
    println!("  throttled: {throttled}");
    println!(
        "  cases:     {} pending, {} reported, {} confirmed, {} false positive",
        metrics.pending_review, metrics.reported, metrics.confirmed_fraud, metrics.false_positive
    );
    println!("  otp demo:  generated + verified = {verified}");

    Ok(())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
