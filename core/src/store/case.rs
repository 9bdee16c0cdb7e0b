//! Suspicious case database queries.

use super::GuardStore;
use crate::case_tracker::{CaseMetrics, CaseStatus, CaseStore, SuspiciousCase};
use crate::error::{GuardError, GuardResult};
use crate::event::{EventKind, RiskLevel};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

const CASE_COLUMNS: &str = "id, subject_id, kind, amount, risk_score, risk_level, \
     detection_rule, description, status, ip_address, user_agent, \
     detected_at, resolved_at, resolved_by, resolution_notes";

fn bad_column(index: usize, detail: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, detail.into())
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH)
}

fn case_from_row(row: &Row<'_>) -> rusqlite::Result<SuspiciousCase> {
    let kind_s: String = row.get(2)?;
    let level_s: String = row.get(5)?;
    let status_s: String = row.get(8)?;
    Ok(SuspiciousCase {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        kind: EventKind::parse(&kind_s)
            .ok_or_else(|| bad_column(2, format!("unknown event kind '{kind_s}'")))?,
        amount: row.get(3)?,
        risk_score: row.get(4)?,
        risk_level: RiskLevel::parse(&level_s)
            .ok_or_else(|| bad_column(5, format!("unknown risk level '{level_s}'")))?,
        detection_rule: row.get(6)?,
        description: row.get(7)?,
        status: CaseStatus::parse(&status_s)
            .ok_or_else(|| bad_column(8, format!("unknown case status '{status_s}'")))?,
        ip_address: row.get(9)?,
        user_agent: row.get(10)?,
        detected_at: millis_to_datetime(row.get(11)?),
        resolved_at: row.get::<_, Option<i64>>(12)?.map(millis_to_datetime),
        resolved_by: row.get(13)?,
        resolution_notes: row.get(14)?,
    })
}

impl GuardStore {
    fn select_cases(
        &self,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> GuardResult<Vec<SuspiciousCase>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {CASE_COLUMNS} FROM suspicious_case WHERE {filter}"))?;
        let rows = stmt.query_map(params, case_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

impl CaseStore for GuardStore {
    fn insert_case(&self, case: &SuspiciousCase) -> GuardResult<()> {
        self.conn.lock().execute(
            "INSERT INTO suspicious_case
                (id, subject_id, kind, amount, risk_score, risk_level,
                 detection_rule, description, status, ip_address, user_agent,
                 detected_at, resolved_at, resolved_by, resolution_notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                case.id,
                case.subject_id,
                case.kind.as_str(),
                case.amount,
                case.risk_score,
                case.risk_level.as_str(),
                case.detection_rule,
                case.description,
                case.status.as_str(),
                case.ip_address,
                case.user_agent,
                case.detected_at.timestamp_millis(),
                case.resolved_at.map(|t| t.timestamp_millis()),
                case.resolved_by,
                case.resolution_notes,
            ],
        )?;
        Ok(())
    }

    fn get_case(&self, case_id: &str) -> GuardResult<Option<SuspiciousCase>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {CASE_COLUMNS} FROM suspicious_case WHERE id=?1"))?;
        let mut rows = stmt.query_map(params![case_id], case_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn update_case_status(
        &self,
        case_id: &str,
        status: CaseStatus,
        notes: Option<&str>,
        resolved_at: Option<DateTime<Utc>>,
        resolved_by: Option<&str>,
    ) -> GuardResult<()> {
        let updated = self.conn.lock().execute(
            "UPDATE suspicious_case
             SET status=?1,
                 resolution_notes=COALESCE(?2, resolution_notes),
                 resolved_at=COALESCE(?3, resolved_at),
                 resolved_by=COALESCE(?4, resolved_by)
             WHERE id=?5",
            params![
                status.as_str(),
                notes,
                resolved_at.map(|t| t.timestamp_millis()),
                resolved_by,
                case_id,
            ],
        )?;
        if updated == 0 {
            return Err(GuardError::NotFound { entity: "case", id: case_id.to_string() });
        }
        Ok(())
    }

    fn cases_for_customer(&self, subject_id: &str) -> GuardResult<Vec<SuspiciousCase>> {
        self.select_cases("subject_id=?1", params![subject_id])
    }

    fn cases_at_level(&self, level: RiskLevel) -> GuardResult<Vec<SuspiciousCase>> {
        self.select_cases("risk_level=?1", params![level.as_str()])
    }

    fn cases_above_amount(&self, threshold: f64) -> GuardResult<Vec<SuspiciousCase>> {
        self.select_cases("amount IS NOT NULL AND amount > ?1", params![threshold])
    }

    fn case_status_counts(&self) -> GuardResult<CaseMetrics> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM suspicious_case GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut metrics = CaseMetrics::default();
        for row in rows {
            let (status, count) = row?;
            match CaseStatus::parse(&status) {
                Some(CaseStatus::PendingReview) => metrics.pending_review = count,
                Some(CaseStatus::Reported) => metrics.reported = count,
                Some(CaseStatus::ConfirmedFraud) => metrics.confirmed_fraud = count,
                Some(CaseStatus::FalsePositive) => metrics.false_positive = count,
                None => log::warn!("ignoring unknown case status '{status}' in metrics"),
            }
        }
        Ok(metrics)
    }
}
