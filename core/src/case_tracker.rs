//! Suspicious case lifecycle.
//!
//! Cases are an append-only audit trail: created PENDING_REVIEW by the
//! scorer, status-transitioned exactly once by an analyst, never
//! deleted. The tracker owns all mutation; the scorer only requests
//! creation, and persistence is behind the injected `CaseStore`.

use crate::clock::Clock;
use crate::error::{GuardError, GuardResult};
use crate::event::{EventKind, RiskLevel, ScoreEvent};
use crate::types::{CaseId, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ── Data model ───────────────────────────────────────────────────────────────

/// Review state. PendingReview is the only non-terminal state; each of
/// the other three is terminal once entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    PendingReview,
    Reported,
    ConfirmedFraud,
    FalsePositive,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::PendingReview => "pending_review",
            CaseStatus::Reported => "reported",
            CaseStatus::ConfirmedFraud => "confirmed_fraud",
            CaseStatus::FalsePositive => "false_positive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_review" => Some(CaseStatus::PendingReview),
            "reported" => Some(CaseStatus::Reported),
            "confirmed_fraud" => Some(CaseStatus::ConfirmedFraud),
            "false_positive" => Some(CaseStatus::FalsePositive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousCase {
    pub id:               CaseId,
    pub subject_id:       SubjectId,
    pub kind:             EventKind,
    pub amount:           Option<f64>,
    pub risk_score:       i64,
    pub risk_level:       RiskLevel,
    pub detection_rule:   String,
    pub description:      String,
    pub status:           CaseStatus,
    pub ip_address:       Option<String>,
    pub user_agent:       Option<String>,
    pub detected_at:      DateTime<Utc>,
    pub resolved_at:      Option<DateTime<Utc>>,
    pub resolved_by:      Option<String>,
    pub resolution_notes: Option<String>,
}

/// Status rollup across all cases, computed in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseMetrics {
    pub pending_review:  i64,
    pub reported:        i64,
    pub confirmed_fraud: i64,
    pub false_positive:  i64,
}

// ── Persistence boundary ─────────────────────────────────────────────────────

/// Injected persistence for cases. The shipped implementation is the
/// SQLite `GuardStore`; the surrounding system may substitute its own.
pub trait CaseStore: Send + Sync {
    fn insert_case(&self, case: &SuspiciousCase) -> GuardResult<()>;
    fn get_case(&self, case_id: &str) -> GuardResult<Option<SuspiciousCase>>;
    fn update_case_status(
        &self,
        case_id: &str,
        status: CaseStatus,
        notes: Option<&str>,
        resolved_at: Option<DateTime<Utc>>,
        resolved_by: Option<&str>,
    ) -> GuardResult<()>;
    fn cases_for_customer(&self, subject_id: &str) -> GuardResult<Vec<SuspiciousCase>>;
    fn cases_at_level(&self, level: RiskLevel) -> GuardResult<Vec<SuspiciousCase>>;
    fn cases_above_amount(&self, threshold: f64) -> GuardResult<Vec<SuspiciousCase>>;
    fn case_status_counts(&self) -> GuardResult<CaseMetrics>;
}

// ── Tracker ──────────────────────────────────────────────────────────────────

const ASSESS_HIGH_CASE_LIMIT: i64 = 2; // more than this many HIGH cases → HIGH
const ASSESS_MEDIUM_CASE_LIMIT: i64 = 3; // more than this many MEDIUM cases → MEDIUM

pub struct SuspiciousCaseTracker {
    store: Arc<dyn CaseStore>,
    clock: Arc<dyn Clock>,
}

impl SuspiciousCaseTracker {
    pub fn new(store: Arc<dyn CaseStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Open a new PENDING_REVIEW case for a flagged event. Every flagged
    /// event gets its own case — there is deliberately no dedup, so a
    /// burst from one subject leaves a full audit trail.
    pub fn flag(
        &self,
        event: &ScoreEvent,
        score: i64,
        level: RiskLevel,
        detection_rule: &str,
        reason: &str,
    ) -> GuardResult<CaseId> {
        let case = SuspiciousCase {
            id: uuid::Uuid::new_v4().to_string(),
            subject_id: event.subject_id.clone(),
            kind: event.kind,
            amount: event.amount,
            risk_score: score,
            risk_level: level,
            detection_rule: detection_rule.to_string(),
            description: reason.to_string(),
            status: CaseStatus::PendingReview,
            ip_address: event.ip_address.clone(),
            user_agent: event.user_agent.clone(),
            detected_at: self.clock.now(),
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
        };
        self.store.insert_case(&case)?;
        log::warn!(
            "case {} opened: subject={} kind={} score={} level={} rule={}",
            case.id,
            case.subject_id,
            case.kind.as_str(),
            score,
            level.as_str(),
            detection_rule
        );
        Ok(case.id)
    }

    /// Escalate a pending case to REPORTED (e.g. a SAR was filed).
    /// Rejected with InvalidState for any other starting status.
    pub fn report(&self, case_id: &str, notes: &str) -> GuardResult<()> {
        let case = self.require_pending(case_id)?;
        self.store
            .update_case_status(&case.id, CaseStatus::Reported, Some(notes), None, None)?;
        log::info!("case {case_id} reported");
        Ok(())
    }

    /// Close a pending case as CONFIRMED_FRAUD or FALSE_POSITIVE.
    /// Rejected with InvalidState for any other starting status.
    pub fn resolve(
        &self,
        case_id: &str,
        notes: &str,
        resolved_by: &str,
        is_false_positive: bool,
    ) -> GuardResult<()> {
        let case = self.require_pending(case_id)?;
        let status = if is_false_positive {
            CaseStatus::FalsePositive
        } else {
            CaseStatus::ConfirmedFraud
        };
        self.store.update_case_status(
            &case.id,
            status,
            Some(notes),
            Some(self.clock.now()),
            Some(resolved_by),
        )?;
        log::info!("case {case_id} resolved as {} by {resolved_by}", status.as_str());
        Ok(())
    }

    fn require_pending(&self, case_id: &str) -> GuardResult<SuspiciousCase> {
        let case = self
            .store
            .get_case(case_id)?
            .ok_or_else(|| GuardError::NotFound { entity: "case", id: case_id.to_string() })?;
        if case.status != CaseStatus::PendingReview {
            return Err(GuardError::InvalidState {
                case_id: case_id.to_string(),
                actual: case.status.as_str().to_string(),
            });
        }
        Ok(case)
    }

    // ── Read queries ─────────────────────────────────────────────────

    /// No ordering guarantee; callers sort by detected_at if they care.
    pub fn by_customer(&self, subject_id: &str) -> GuardResult<Vec<SuspiciousCase>> {
        self.store.cases_for_customer(subject_id)
    }

    pub fn by_risk_level(&self, level: RiskLevel) -> GuardResult<Vec<SuspiciousCase>> {
        self.store.cases_at_level(level)
    }

    pub fn by_amount_above(&self, threshold: f64) -> GuardResult<Vec<SuspiciousCase>> {
        self.store.cases_above_amount(threshold)
    }

    pub fn case(&self, case_id: &str) -> GuardResult<Option<SuspiciousCase>> {
        self.store.get_case(case_id)
    }

    pub fn metrics(&self) -> GuardResult<CaseMetrics> {
        self.store.case_status_counts()
    }

    /// Derived rollup over a customer's existing cases, independent of
    /// per-event scoring.
    pub fn assess_customer(&self, subject_id: &str) -> GuardResult<RiskLevel> {
        let cases = self.store.cases_for_customer(subject_id)?;
        let high = cases.iter().filter(|c| c.risk_level == RiskLevel::High).count() as i64;
        let medium = cases.iter().filter(|c| c.risk_level == RiskLevel::Medium).count() as i64;

        let level = if high > ASSESS_HIGH_CASE_LIMIT {
            RiskLevel::High
        } else if high > 0 || medium > ASSESS_MEDIUM_CASE_LIMIT {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        Ok(level)
    }
}
