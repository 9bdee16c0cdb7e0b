//! Notification dispatch boundary.
//!
//! Real SMS/email providers live outside this crate. The OTP verifier
//! only needs something that accepts a message; provider errors are
//! recovered locally (the OTP record stays valid, resend is an explicit
//! caller action).

use crate::error::GuardResult;

pub trait NotificationDispatcher: Send + Sync {
    fn send_sms(&self, to: &str, body: &str) -> GuardResult<()>;
    fn send_email(&self, to: &str, subject: &str, body: &str) -> GuardResult<()>;
}

/// Writes every notification to the log instead of sending it.
/// The default wiring for local runs and tests.
#[derive(Debug, Default)]
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn send_sms(&self, to: &str, body: &str) -> GuardResult<()> {
        log::info!("sms to {to}: {body}");
        Ok(())
    }

    fn send_email(&self, to: &str, subject: &str, body: &str) -> GuardResult<()> {
        log::info!("email to {to} [{subject}]: {body}");
        Ok(())
    }
}
