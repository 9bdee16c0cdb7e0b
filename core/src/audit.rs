//! Logging decorators for the scoring and limiting seams.
//!
//! Call-boundary composition instead of interception: wrap the real
//! implementation in a decorator that implements the same trait, and
//! hand callers the wrapped value. Nothing in the inner types knows it
//! is being observed.

use crate::error::GuardResult;
use crate::event::{RiskAssessment, RiskLevel, ScoreEvent};
use crate::rate_limiter::Limiter;
use crate::scorer::Scorer;

pub struct LoggedScorer<S: Scorer> {
    inner: S,
}

impl<S: Scorer> LoggedScorer<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: Scorer> Scorer for LoggedScorer<S> {
    fn score(&self, event: &ScoreEvent) -> GuardResult<RiskAssessment> {
        let assessment = self.inner.score(event)?;
        match assessment.level {
            RiskLevel::High => log::warn!(
                "scored subject={} kind={} -> {} ({}): {}",
                event.subject_id,
                event.kind.as_str(),
                assessment.score,
                assessment.level.as_str(),
                assessment.reason
            ),
            _ => log::info!(
                "scored subject={} kind={} -> {} ({})",
                event.subject_id,
                event.kind.as_str(),
                assessment.score,
                assessment.level.as_str()
            ),
        }
        Ok(assessment)
    }
}

pub struct LoggedLimiter<L: Limiter> {
    inner: L,
}

impl<L: Limiter> LoggedLimiter<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<L: Limiter> Limiter for LoggedLimiter<L> {
    fn try_consume(&self, key: &str) -> bool {
        let allowed = self.inner.try_consume(key);
        if !allowed {
            log::warn!("rate limit denied key={key}");
        }
        allowed
    }
}
