//! Inbound event shapes and scoring outputs.
//!
//! RULE: These are transport-agnostic. The REST layer (outside this
//! crate) maps its request bodies onto `ScoreEvent` before calling in.

use crate::types::SubjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of activity is being scored.
/// Variants are added per integration — never removed or reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CreditApplication,
    CustomerInfoUpdate,
    Login,
    Transaction,
    ApiRequest,
}

impl EventKind {
    /// Stable string form, used in counter keys and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CreditApplication => "credit_application",
            EventKind::CustomerInfoUpdate => "customer_info_update",
            EventKind::Login => "login",
            EventKind::Transaction => "transaction",
            EventKind::ApiRequest => "api_request",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit_application" => Some(EventKind::CreditApplication),
            "customer_info_update" => Some(EventKind::CustomerInfoUpdate),
            "login" => Some(EventKind::Login),
            "transaction" => Some(EventKind::Transaction),
            "api_request" => Some(EventKind::ApiRequest),
            _ => None,
        }
    }
}

/// One inbound event to score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub subject_id:  SubjectId,
    pub kind:        EventKind,
    pub amount:      Option<f64>,
    pub ip_address:  Option<String>,
    pub user_agent:  Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Ordinal risk category. Ordering matters: Low < Medium < High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

/// The scorer's verdict for one event.
///
/// `score` is the raw accumulated integer — it is not clamped, so values
/// above 100 are possible when many checks fire on one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level:  RiskLevel,
    pub score:  i64,
    pub reason: String,
}
