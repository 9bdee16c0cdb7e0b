//! Runtime configuration for the detection core.
//!
//! Loaded once at startup from a JSON file; validation failures are
//! fatal (`GuardError::Configuration`), never deferred to the request
//! path. Every subsystem carries its own `enabled` kill switch — when
//! false, that subsystem short-circuits to a permissive pass-through.

use crate::error::{GuardError, GuardResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudConfig {
    /// Kill switch. Disabled scoring reports every event as not suspicious.
    pub enabled: bool,
    /// Single-event amount that alone marks an event high risk (+30).
    pub high_amount_threshold: f64,
    /// Single-event amount considered elevated (+15).
    pub medium_amount_threshold: f64,
    /// Events per window above which frequency risk fires (+25).
    pub frequency_threshold: u64,
    /// Rolling window applied to per-subject counters.
    pub time_window_minutes: i64,
    /// Scores at or above this open a suspicious case. Deliberately below
    /// the medium level band — a low-level event can still be case-worthy.
    pub case_worthy_score_threshold: i64,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            high_amount_threshold: 50_000.0,
            medium_amount_threshold: 10_000.0,
            frequency_threshold: 5,
            time_window_minutes: 60,
            case_worthy_score_threshold: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Kill switch. Disabled limiting allows everything.
    pub enabled: bool,
    /// Maximum tokens a bucket holds (burst capacity).
    pub burst: f64,
    /// Tokens added per second of elapsed time.
    pub refill_per_second: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            burst: 20.0,
            refill_per_second: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpConfig {
    /// Kill switch. Disabled verification passes every check.
    pub enabled: bool,
    /// Digits in a generated code.
    pub length: usize,
    /// Lifetime of an SMS/email code.
    pub ttl_minutes: i64,
    /// Advisory ceiling surfaced via `attempts_remaining`. Lockout itself
    /// is a caller-composed policy, not enforced here.
    pub max_attempts: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            length: 6,
            ttl_minutes: 5,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Seconds between cleanup passes. Defaults to one daily sweep.
    pub interval_seconds: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self { interval_seconds: 86_400 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default)]
    pub fraud: FraudConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

impl GuardConfig {
    /// Load and validate from a JSON file.
    /// In tests, use GuardConfig::default_test().
    pub fn load(path: &str) -> GuardResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: GuardConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot be meaningfully enforced.
    pub fn validate(&self) -> GuardResult<()> {
        fn bad(message: impl Into<String>) -> GuardError {
            GuardError::Configuration { message: message.into() }
        }

        if self.fraud.high_amount_threshold < 0.0 || self.fraud.medium_amount_threshold < 0.0 {
            return Err(bad("amount thresholds must be non-negative"));
        }
        if self.fraud.medium_amount_threshold > self.fraud.high_amount_threshold {
            return Err(bad(format!(
                "medium_amount_threshold ({}) exceeds high_amount_threshold ({})",
                self.fraud.medium_amount_threshold, self.fraud.high_amount_threshold
            )));
        }
        if self.fraud.time_window_minutes <= 0 {
            return Err(bad("time_window_minutes must be positive"));
        }
        if self.fraud.case_worthy_score_threshold < 0 {
            return Err(bad("case_worthy_score_threshold must be non-negative"));
        }
        if self.rate_limit.burst < 1.0 {
            return Err(bad("rate limit burst must be at least 1"));
        }
        if self.rate_limit.refill_per_second < 0.0 {
            return Err(bad("rate limit refill rate must be non-negative"));
        }
        if self.otp.length == 0 || self.otp.length > 10 {
            return Err(bad("otp length must be between 1 and 10 digits"));
        }
        if self.otp.ttl_minutes <= 0 {
            return Err(bad("otp ttl must be positive"));
        }
        if self.sweeper.interval_seconds == 0 {
            return Err(bad("sweeper interval must be positive"));
        }
        Ok(())
    }

    /// Config with small windows and limits for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            fraud: FraudConfig {
                enabled: true,
                high_amount_threshold: 50_000.0,
                medium_amount_threshold: 10_000.0,
                frequency_threshold: 5,
                time_window_minutes: 60,
                case_worthy_score_threshold: 30,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                burst: 20.0,
                refill_per_second: 10.0,
            },
            otp: OtpConfig {
                enabled: true,
                length: 6,
                ttl_minutes: 5,
                max_attempts: 3,
            },
            sweeper: SweeperConfig { interval_seconds: 1 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        GuardConfig::default().validate().unwrap();
    }

    #[test]
    fn inverted_amount_thresholds_rejected() {
        let mut config = GuardConfig::default_test();
        config.fraud.medium_amount_threshold = 60_000.0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, GuardError::Configuration { .. }));
    }

    #[test]
    fn negative_threshold_rejected() {
        let mut config = GuardConfig::default_test();
        config.fraud.high_amount_threshold = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_otp_length_rejected() {
        let mut config = GuardConfig::default_test();
        config.otp.length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_burst_rejected() {
        let mut config = GuardConfig::default_test();
        config.rate_limit.burst = 0.0;
        assert!(config.validate().is_err());
    }
}
