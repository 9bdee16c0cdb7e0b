//! Per-event risk scoring.
//!
//! One pass per event:
//!   1. Increment the subject's windowed counter (count + amount sum).
//!   2. Fixed threshold checks (amount, frequency, accumulated sum).
//!   3. Registered fraud rules, in registration order.
//!   4. Map the accumulated score to a level.
//!   5. Flag a case when the score clears the case-worthy threshold.
//!
//! The `reason` field is overwritten by whichever check fires *last* in
//! evaluation order. That is the inherited production behavior and is
//! pinned by tests — changing it to highest-severity-wins is a product
//! decision, not a refactor.

use crate::case_tracker::SuspiciousCaseTracker;
use crate::config::FraudConfig;
use crate::counter::WindowedCounterStore;
use crate::error::GuardResult;
use crate::event::{RiskAssessment, RiskLevel, ScoreEvent};
use crate::rules::{RuleContext, RuleEngine};
use std::sync::Arc;

// ── Constants ────────────────────────────────────────────────────────────────

const HIGH_AMOUNT_INCREMENT: i64 = 30;
const MEDIUM_AMOUNT_INCREMENT: i64 = 15;
const FREQUENCY_INCREMENT: i64 = 25;
const HIGH_TOTAL_INCREMENT: i64 = 20;

const HIGH_LEVEL_SCORE: i64 = 70;
const MEDIUM_LEVEL_SCORE: i64 = 40;

/// Scoring seam for decorators (see audit.rs) and test doubles.
pub trait Scorer: Send + Sync {
    fn score(&self, event: &ScoreEvent) -> GuardResult<RiskAssessment>;
}

pub struct RiskScorer {
    config:   FraudConfig,
    counters: Arc<WindowedCounterStore>,
    rules:    RuleEngine,
    tracker:  Arc<SuspiciousCaseTracker>,
}

impl RiskScorer {
    pub fn new(
        config: FraudConfig,
        counters: Arc<WindowedCounterStore>,
        rules: RuleEngine,
        tracker: Arc<SuspiciousCaseTracker>,
    ) -> Self {
        Self { config, counters, rules, tracker }
    }

    /// Counter key: one rolling window per (kind, subject) pair.
    fn counter_key(event: &ScoreEvent) -> String {
        format!("{}:{}", event.kind.as_str(), event.subject_id)
    }
}

impl Scorer for RiskScorer {
    fn score(&self, event: &ScoreEvent) -> GuardResult<RiskAssessment> {
        // Kill switch: disabled fraud detection reports every event as
        // not suspicious and leaves no trace — no counter write, no case.
        if !self.config.enabled {
            return Ok(RiskAssessment {
                level: RiskLevel::Low,
                score: 0,
                reason: "DISABLED".to_string(),
            });
        }

        let amount = event.amount.unwrap_or(0.0);

        // 1. Window bookkeeping happens exactly once per event; rules
        //    receive the post-increment numbers as parameters.
        let window = self.counters.increment(&Self::counter_key(event), amount);

        let mut score: i64 = 0;
        let mut reason = String::from("NONE");
        let mut detection_rule = "none";

        // 2. Fixed threshold checks. Later checks overwrite `reason`.
        if amount >= self.config.high_amount_threshold {
            score += HIGH_AMOUNT_INCREMENT;
            reason = format!("HIGH_AMOUNT: {amount:.2}");
            detection_rule = "high_amount";
        } else if amount >= self.config.medium_amount_threshold {
            score += MEDIUM_AMOUNT_INCREMENT;
            reason = format!("MEDIUM_AMOUNT: {amount:.2}");
            detection_rule = "medium_amount";
        }

        if window.count > self.config.frequency_threshold {
            score += FREQUENCY_INCREMENT;
            reason = format!(
                "FREQUENT_EVENTS: {} events in {}m window",
                window.count, self.config.time_window_minutes
            );
            detection_rule = "frequency";
        }

        if window.sum >= 2.0 * self.config.high_amount_threshold {
            score += HIGH_TOTAL_INCREMENT;
            reason = format!("HIGH_TOTAL_AMOUNT: {:.2} accumulated", window.sum);
            detection_rule = "high_total";
        }

        // 3. Pluggable rules, registration order.
        let outcome = self.rules.evaluate(&RuleContext {
            subject_id: &event.subject_id,
            kind: event.kind,
            amount: event.amount,
            ip_address: event.ip_address.as_deref(),
            user_agent: event.user_agent.as_deref(),
            recent_event_count: window.count,
            recent_event_sum: window.sum,
        });
        score += outcome.risk_increment;
        if let Some((rule_name, rule_reason)) = outcome.last_hit {
            reason = rule_reason;
            detection_rule = rule_name;
        }

        // 4. Level bands. Score is not clamped first.
        let level = if score >= HIGH_LEVEL_SCORE {
            RiskLevel::High
        } else if score >= MEDIUM_LEVEL_SCORE {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        // 5. Case-worthy is a separate, lower bar than the level bands:
        //    a Low assessment in the 30–39 band still opens a case.
        if score >= self.config.case_worthy_score_threshold {
            self.tracker.flag(event, score, level, detection_rule, &reason)?;
        }

        Ok(RiskAssessment { level, score, reason })
    }
}
