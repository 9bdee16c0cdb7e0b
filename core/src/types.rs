//! Shared primitive types used across the detection core.

/// A customer, account, or client identifier — whatever the caller keys
/// events by.
pub type SubjectId = String;

/// Stable identifier of a suspicious case (uuid v4 string).
pub type CaseId = String;

/// Identifier of the user an OTP belongs to.
pub type UserId = String;
