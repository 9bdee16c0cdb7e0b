//! Risk scorer: threshold checks, frequency windows, rule aggregation,
//! the last-fired-wins reason, the case-worthy band, and the kill
//! switch.

use chrono::Duration;
use creditguard_core::case_tracker::SuspiciousCaseTracker;
use creditguard_core::clock::{Clock, ManualClock};
use creditguard_core::config::FraudConfig;
use creditguard_core::counter::WindowedCounterStore;
use creditguard_core::event::{EventKind, RiskLevel, ScoreEvent};
use creditguard_core::rules::{
    FraudRule, IpWatchlistRule, RuleContext, RuleEngine, RuleHit, StructuringRule,
};
use creditguard_core::scorer::{RiskScorer, Scorer};
use creditguard_core::store::GuardStore;
use std::sync::Arc;

struct Fixture {
    clock:   Arc<ManualClock>,
    scorer:  RiskScorer,
    tracker: Arc<SuspiciousCaseTracker>,
}

fn build(config: FraudConfig, rules: RuleEngine) -> Fixture {
    let clock = Arc::new(ManualClock::epoch());
    let store = Arc::new(GuardStore::in_memory().unwrap());
    store.migrate().unwrap();
    let tracker = Arc::new(SuspiciousCaseTracker::new(store, clock.clone()));
    let counters = Arc::new(WindowedCounterStore::new(
        Duration::minutes(config.time_window_minutes),
        clock.clone(),
    ));
    let scorer = RiskScorer::new(config, counters, rules, tracker.clone());
    Fixture { clock, scorer, tracker }
}

fn txn(fix: &Fixture, subject: &str, amount: f64) -> ScoreEvent {
    ScoreEvent {
        subject_id: subject.to_string(),
        kind: EventKind::Transaction,
        amount: Some(amount),
        ip_address: None,
        user_agent: None,
        occurred_at: fix.clock.now(),
    }
}

/// amount=60000 over a 50000 threshold: case-worthy on the spot, with
/// the HIGH_AMOUNT reason.
#[test]
fn high_amount_event_opens_a_case() {
    let fix = build(FraudConfig::default(), RuleEngine::new());

    let assessment = fix.scorer.score(&txn(&fix, "c-1", 60_000.0)).unwrap();
    assert!(assessment.score >= 30, "got {}", assessment.score);
    assert!(
        assessment.reason.contains("HIGH_AMOUNT"),
        "reason was '{}'",
        assessment.reason
    );

    let cases = fix.tracker.by_customer("c-1").unwrap();
    assert_eq!(cases.len(), 1);
    assert!(cases[0].description.contains("HIGH_AMOUNT"));
}

/// A single high-amount event scores 30: case-worthy yet still LOW.
/// The 30–39 band deliberately opens cases below the MEDIUM level.
#[test]
fn case_worthy_band_sits_below_medium_level() {
    let fix = build(FraudConfig::default(), RuleEngine::new());

    let assessment = fix.scorer.score(&txn(&fix, "c-1", 60_000.0)).unwrap();
    assert_eq!(assessment.score, 30);
    assert_eq!(assessment.level, RiskLevel::Low);

    let cases = fix.tracker.by_customer("c-1").unwrap();
    assert_eq!(cases.len(), 1, "LOW but case-worthy must still flag");
    assert_eq!(cases[0].risk_level, RiskLevel::Low);
}

/// The amount between the medium and high thresholds adds +15.
#[test]
fn medium_amount_scores_fifteen() {
    let fix = build(FraudConfig::default(), RuleEngine::new());

    let assessment = fix.scorer.score(&txn(&fix, "c-1", 20_000.0)).unwrap();
    assert_eq!(assessment.score, 15);
    assert_eq!(assessment.level, RiskLevel::Low);
    assert!(fix.tracker.by_customer("c-1").unwrap().is_empty(), "15 is not case-worthy");
}

/// The 6th event inside the window crosses frequency_threshold=5 and
/// picks up the +25 FREQUENT_EVENTS increment.
#[test]
fn sixth_event_in_window_adds_frequency_risk() {
    let fix = build(FraudConfig::default(), RuleEngine::new());

    for _ in 0..5 {
        let assessment = fix.scorer.score(&txn(&fix, "c-1", 100.0)).unwrap();
        assert_eq!(assessment.score, 0, "first five small events are clean");
    }
    let sixth = fix.scorer.score(&txn(&fix, "c-1", 100.0)).unwrap();
    assert_eq!(sixth.score, 25);
    assert!(sixth.reason.contains("FREQUENT_EVENTS"), "reason was '{}'", sixth.reason);
}

/// Frequency is judged per rolling window: once the window lapses the
/// subject starts clean.
#[test]
fn frequency_resets_with_the_window() {
    let fix = build(FraudConfig::default(), RuleEngine::new());

    for _ in 0..6 {
        fix.scorer.score(&txn(&fix, "c-1", 100.0)).unwrap();
    }
    fix.clock.advance(Duration::minutes(61));

    let assessment = fix.scorer.score(&txn(&fix, "c-1", 100.0)).unwrap();
    assert_eq!(assessment.score, 0, "new window should start clean");
}

/// Accumulated sum at 2× the high threshold adds +20, and — firing
/// after the amount check — takes over the reason. Last fired wins;
/// this pins the inherited behavior, it is not a severity ranking.
#[test]
fn accumulated_total_overwrites_reason_last() {
    let fix = build(FraudConfig::default(), RuleEngine::new());

    let first = fix.scorer.score(&txn(&fix, "c-1", 60_000.0)).unwrap();
    assert!(first.reason.contains("HIGH_AMOUNT"));

    // Second 60k event: window sum 120k ≥ 2×50k.
    let second = fix.scorer.score(&txn(&fix, "c-1", 60_000.0)).unwrap();
    assert_eq!(second.score, 30 + 20);
    assert_eq!(second.level, RiskLevel::Medium);
    assert!(
        second.reason.contains("HIGH_TOTAL_AMOUNT"),
        "last-fired check must own the reason, got '{}'",
        second.reason
    );
}

/// Counters are keyed per (kind, subject): the same subject's logins
/// and transactions accrue separately.
#[test]
fn event_kinds_count_separately() {
    let fix = build(FraudConfig::default(), RuleEngine::new());

    for _ in 0..6 {
        fix.scorer.score(&txn(&fix, "c-1", 100.0)).unwrap();
    }
    let login = ScoreEvent {
        subject_id: "c-1".to_string(),
        kind: EventKind::Login,
        amount: None,
        ip_address: None,
        user_agent: None,
        occurred_at: fix.clock.now(),
    };
    let assessment = fix.scorer.score(&login).unwrap();
    assert_eq!(assessment.score, 0, "login window is separate from transactions");
}

/// Structuring: a deposit just under the reporting threshold triggers
/// the rule but stays below the case-worthy bar on its own.
#[test]
fn structuring_rule_contributes_increment() {
    let mut rules = RuleEngine::new();
    rules.register(Box::new(StructuringRule::default()));
    let fix = build(FraudConfig::default(), rules);

    let assessment = fix.scorer.score(&txn(&fix, "c-1", 9_500.0)).unwrap();
    assert_eq!(assessment.score, 20);
    assert!(assessment.reason.contains("STRUCTURING"), "reason was '{}'", assessment.reason);
    assert!(fix.tracker.by_customer("c-1").unwrap().is_empty());
}

/// A watchlisted source address pushes an otherwise clean event over
/// the case-worthy bar.
#[test]
fn watchlisted_ip_flags_event() {
    let mut rules = RuleEngine::new();
    rules.register(Box::new(IpWatchlistRule::new(["203.0.113.9".to_string()])));
    let fix = build(FraudConfig::default(), rules);

    let mut event = txn(&fix, "c-1", 50.0);
    event.ip_address = Some("203.0.113.9".to_string());

    let assessment = fix.scorer.score(&event).unwrap();
    assert_eq!(assessment.score, 40);
    assert_eq!(assessment.level, RiskLevel::Medium);
    assert!(assessment.reason.contains("WATCHLISTED_IP"));

    let cases = fix.tracker.by_customer("c-1").unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].detection_rule, "ip_watchlist");
}

/// Rules registered later overwrite the reason of earlier ones while
/// every triggered increment still lands in the score.
#[test]
fn later_rule_owns_the_reason() {
    struct FixedRule {
        name:      &'static str,
        increment: i64,
    }
    impl FraudRule for FixedRule {
        fn name(&self) -> &'static str {
            self.name
        }
        fn evaluate(&self, _ctx: &RuleContext<'_>) -> Option<RuleHit> {
            Some(RuleHit {
                risk_increment: self.increment,
                reason: format!("{} fired", self.name),
            })
        }
    }

    let mut rules = RuleEngine::new();
    rules.register(Box::new(FixedRule { name: "first", increment: 10 }));
    rules.register(Box::new(FixedRule { name: "second", increment: 5 }));
    let fix = build(FraudConfig::default(), rules);

    let assessment = fix.scorer.score(&txn(&fix, "c-1", 100.0)).unwrap();
    assert_eq!(assessment.score, 15, "both increments count");
    assert_eq!(assessment.reason, "second fired");
}

/// Kill switch: disabled scoring reports LOW/0, writes no counter and
/// opens no case.
#[test]
fn disabled_scorer_is_permissive() {
    let config = FraudConfig { enabled: false, ..FraudConfig::default() };
    let fix = build(config, RuleEngine::with_standard_rules());

    let assessment = fix.scorer.score(&txn(&fix, "c-1", 1_000_000.0)).unwrap();
    assert_eq!(assessment.score, 0);
    assert_eq!(assessment.level, RiskLevel::Low);
    assert_eq!(assessment.reason, "DISABLED");
    assert!(fix.tracker.by_customer("c-1").unwrap().is_empty());
}

/// Scores accumulate without clamping; stacked checks can exceed 100.
#[test]
fn score_is_not_clamped() {
    let mut rules = RuleEngine::new();
    rules.register(Box::new(IpWatchlistRule::new(["203.0.113.9".to_string()])));
    let fix = build(FraudConfig::default(), rules);

    // Prime frequency and accumulated-total risk.
    for _ in 0..5 {
        fix.scorer.score(&txn(&fix, "c-1", 60_000.0)).unwrap();
    }
    let mut event = txn(&fix, "c-1", 60_000.0);
    event.ip_address = Some("203.0.113.9".to_string());

    let assessment = fix.scorer.score(&event).unwrap();
    // HIGH_AMOUNT 30 + FREQUENT 25 + HIGH_TOTAL 20 + watchlist 40.
    assert_eq!(assessment.score, 115);
    assert_eq!(assessment.level, RiskLevel::High);
}
