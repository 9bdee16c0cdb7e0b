//! Pluggable fraud detection rules.
//!
//! RULE: Rules are pure functions of the event snapshot plus static
//! lookups. They never persist anything and never read the windowed
//! counters themselves — the scorer reads the window once and passes
//! the counts in, so every rule sees the same numbers.

use crate::event::EventKind;
use crate::types::SubjectId;
use std::collections::HashSet;

/// Everything a rule may inspect for one event.
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub subject_id:         &'a SubjectId,
    pub kind:               EventKind,
    pub amount:             Option<f64>,
    pub ip_address:         Option<&'a str>,
    pub user_agent:         Option<&'a str>,
    /// Post-increment event count for this subject's current window.
    pub recent_event_count: u64,
    /// Post-increment amount sum for this subject's current window.
    pub recent_event_sum:   f64,
}

/// A triggered rule's contribution.
#[derive(Debug, Clone)]
pub struct RuleHit {
    pub risk_increment: i64,
    pub reason:         String,
}

pub trait FraudRule: Send + Sync {
    /// Stable name, recorded as the case's detection_rule when this
    /// rule is the last to fire.
    fn name(&self) -> &'static str;

    /// Returns Some when the rule triggers on this event.
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RuleHit>;
}

/// Aggregate of one engine pass over all registered rules.
#[derive(Debug, Clone, Default)]
pub struct RuleOutcome {
    pub risk_increment: i64,
    /// (rule name, reason) of the last rule that fired, if any.
    /// Last-fired-wins matches the scorer's fixed checks.
    pub last_hit:       Option<(&'static str, String)>,
    pub triggered:      usize,
}

/// Evaluates registered rules in registration order.
#[derive(Default)]
pub struct RuleEngine {
    rules: Vec<Box<dyn FraudRule>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The default rule set. Callers wanting a different mix register
    /// their own rules on an empty engine.
    pub fn with_standard_rules() -> Self {
        let mut engine = Self::new();
        engine.register(Box::new(StructuringRule::default()));
        engine.register(Box::new(IpWatchlistRule::default()));
        engine.register(Box::new(ScriptedClientRule::default()));
        engine
    }

    /// Rules run in registration order; order decides which reason wins.
    pub fn register(&mut self, rule: Box<dyn FraudRule>) {
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        for rule in &self.rules {
            if let Some(hit) = rule.evaluate(ctx) {
                log::debug!(
                    "rule {} fired on subject {} (+{}): {}",
                    rule.name(),
                    ctx.subject_id,
                    hit.risk_increment,
                    hit.reason
                );
                outcome.risk_increment += hit.risk_increment;
                outcome.last_hit = Some((rule.name(), hit.reason));
                outcome.triggered += 1;
            }
        }
        outcome
    }
}

// ── Standard rules ───────────────────────────────────────────────────────────

/// Amounts parked just under the currency reporting threshold — the
/// classic structuring signal, applied to a single event.
pub struct StructuringRule {
    pub reporting_threshold: f64,
    pub margin:              f64,
    pub risk_increment:      i64,
}

impl Default for StructuringRule {
    fn default() -> Self {
        Self {
            reporting_threshold: 10_000.0,
            margin: 1_000.0,
            risk_increment: 20,
        }
    }
}

impl FraudRule for StructuringRule {
    fn name(&self) -> &'static str {
        "structuring"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RuleHit> {
        let amount = ctx.amount?;
        let floor = self.reporting_threshold - self.margin;
        if amount >= floor && amount < self.reporting_threshold {
            Some(RuleHit {
                risk_increment: self.risk_increment,
                reason: format!(
                    "STRUCTURING: amount {:.2} just under reporting threshold {:.0}",
                    amount, self.reporting_threshold
                ),
            })
        } else {
            None
        }
    }
}

/// Source address on a static deny list.
pub struct IpWatchlistRule {
    watchlist:          HashSet<String>,
    pub risk_increment: i64,
}

impl IpWatchlistRule {
    pub fn new(addresses: impl IntoIterator<Item = String>) -> Self {
        Self {
            watchlist: addresses.into_iter().collect(),
            risk_increment: 40,
        }
    }
}

impl Default for IpWatchlistRule {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FraudRule for IpWatchlistRule {
    fn name(&self) -> &'static str {
        "ip_watchlist"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RuleHit> {
        let ip = ctx.ip_address?;
        if self.watchlist.contains(ip) {
            Some(RuleHit {
                risk_increment: self.risk_increment,
                reason: format!("WATCHLISTED_IP: {ip}"),
            })
        } else {
            None
        }
    }
}

/// User agents that look like automation rather than a browser or the
/// mobile app. Substring match against known tool signatures.
pub struct ScriptedClientRule {
    signatures:         Vec<String>,
    pub risk_increment: i64,
}

impl ScriptedClientRule {
    pub fn new(signatures: Vec<String>) -> Self {
        Self { signatures, risk_increment: 10 }
    }
}

impl Default for ScriptedClientRule {
    fn default() -> Self {
        Self::new(
            ["curl", "python-requests", "httpclient", "bot", "scrapy"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

impl FraudRule for ScriptedClientRule {
    fn name(&self) -> &'static str {
        "scripted_client"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RuleHit> {
        let agent = ctx.user_agent?.to_ascii_lowercase();
        let matched = self.signatures.iter().find(|sig| agent.contains(sig.as_str()))?;
        Some(RuleHit {
            risk_increment: self.risk_increment,
            reason: format!("SCRIPTED_CLIENT: user agent matched '{matched}'"),
        })
    }
}
