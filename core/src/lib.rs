//! creditguard-core — the real-time abuse-detection core of the credit
//! platform backend.
//!
//! What lives here: rule-based risk scoring over transactions and
//! profile events, the suspicious-case lifecycle, per-key token-bucket
//! rate limiting, and the OTP verification state machine. What doesn't:
//! REST wiring, customer persistence, payment-gateway calls — those sit
//! behind the collaborator traits (`CaseStore`,
//! `NotificationDispatcher`, `Clock`) and are injected by the host.
//!
//! RULES:
//!   - No blocking I/O on the scoring/limiting path; persistence and
//!     dispatch happen at the boundary traits.
//!   - Shared keyed state (counters, buckets, the active-OTP index) is
//!     sharded — never one global lock.
//!   - Throttle denials and OTP mismatches are normal `false` results,
//!     not errors.

pub mod audit;
pub mod case_tracker;
pub mod clock;
pub mod config;
pub mod counter;
pub mod error;
pub mod event;
pub mod notify;
pub mod otp;
pub mod rate_limiter;
pub mod rules;
pub mod scorer;
pub mod store;
pub mod sweeper;
pub mod types;
