//! One-time password generation and verification.
//!
//! SMS/email codes are short-lived single-use records; authenticator-app
//! codes are derived from a stored long-lived secret and are valid for
//! any caller holding the current 30-second step, so they are exempt
//! from the single-use invariant.
//!
//! RULE: No lockout here. `attempt_count` is tracked and surfaced, and
//! the caller composes its own lockout policy on top — the same split
//! the failed-login counter uses elsewhere in the platform.
//!
//! The active-record index is in-memory and sharded like the counter
//! store; historical verified records are retained until the sweeper's
//! cleanup pass retires expired ones.

use crate::clock::Clock;
use crate::config::OtpConfig;
use crate::error::GuardResult;
use crate::notify::NotificationDispatcher;
use crate::types::UserId;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const SHARD_COUNT: usize = 16;

/// Seconds per authenticator time step (RFC 6238 convention).
const AUTHENTICATOR_STEP_SECONDS: i64 = 30;
/// Accept codes from this many steps either side of now.
const AUTHENTICATOR_STEP_TOLERANCE: i64 = 1;
/// Length of an enrollment secret, in characters.
const AUTHENTICATOR_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpChannel {
    Sms,
    Email,
    GoogleAuthenticator,
}

impl OtpChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpChannel::Sms => "sms",
            OtpChannel::Email => "email",
            OtpChannel::GoogleAuthenticator => "google_authenticator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sms" => Some(OtpChannel::Sms),
            "email" => Some(OtpChannel::Email),
            "google_authenticator" => Some(OtpChannel::GoogleAuthenticator),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    pub user_id:       UserId,
    pub code:          String,
    pub channel:       OtpChannel,
    pub created_at:    DateTime<Utc>,
    pub expires_at:    DateTime<Utc>,
    pub verified:      bool,
    pub attempt_count: i64,
}

pub struct OtpVerifier {
    config:     OtpConfig,
    /// Sharded (user, channel) → record history, newest last.
    records:    Vec<Mutex<HashMap<String, Vec<OtpRecord>>>>,
    /// Long-lived authenticator secrets, keyed by user.
    secrets:    RwLock<HashMap<UserId, String>>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock:      Arc<dyn Clock>,
}

impl OtpVerifier {
    pub fn new(
        config: OtpConfig,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let records = (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            config,
            records,
            secrets: RwLock::new(HashMap::new()),
            dispatcher,
            clock,
        }
    }

    fn shard(&self, index_key: &str) -> &Mutex<HashMap<String, Vec<OtpRecord>>> {
        let mut hasher = DefaultHasher::new();
        index_key.hash(&mut hasher);
        &self.records[(hasher.finish() as usize) % SHARD_COUNT]
    }

    fn index_key(user_id: &str, channel: OtpChannel) -> String {
        format!("{}:{}", channel.as_str(), user_id)
    }

    /// Issue a new code for SMS or email, persist it, and dispatch it.
    /// Dispatch failure is reported in the log but the record stays
    /// valid — resend is the caller's explicit action. Authenticator
    /// codes are device-generated; use `enroll_authenticator` instead.
    pub fn generate(&self, user_id: &str, channel: OtpChannel) -> GuardResult<String> {
        if channel == OtpChannel::GoogleAuthenticator {
            return Err(anyhow::anyhow!(
                "authenticator codes are device-generated; enroll a secret instead"
            )
            .into());
        }

        let now = self.clock.now();
        let code = random_numeric_code(self.config.length);
        let record = OtpRecord {
            user_id: user_id.to_string(),
            code: code.clone(),
            channel,
            created_at: now,
            expires_at: now + Duration::minutes(self.config.ttl_minutes),
            verified: false,
            attempt_count: 0,
        };

        let key = Self::index_key(user_id, channel);
        self.shard(&key).lock().entry(key).or_default().push(record);

        let body = format!(
            "Your verification code is {code}. It expires in {} minutes.",
            self.config.ttl_minutes
        );
        let dispatched = match channel {
            OtpChannel::Sms => self.dispatcher.send_sms(user_id, &body),
            OtpChannel::Email => self.dispatcher.send_email(user_id, "Verification code", &body),
            OtpChannel::GoogleAuthenticator => unreachable!("rejected above"),
        };
        if let Err(e) = dispatched {
            log::warn!("otp dispatch to {user_id} via {} failed: {e}", channel.as_str());
        }

        Ok(code)
    }

    /// Create (or rotate) a user's authenticator secret. The secret is
    /// returned once for QR provisioning and kept for verification.
    pub fn enroll_authenticator(&self, user_id: &str) -> GuardResult<String> {
        let secret: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(AUTHENTICATOR_SECRET_LENGTH)
            .map(char::from)
            .collect();
        self.secrets.write().insert(user_id.to_string(), secret.clone());
        log::info!("authenticator secret enrolled for {user_id}");
        Ok(secret)
    }

    /// Check a submitted code.
    ///
    /// SMS/email: matches against the latest unverified, unexpired
    /// record; a match marks it verified (single use), a mismatch bumps
    /// its attempt count. No active record means plain `false` with
    /// nothing touched.
    ///
    /// Authenticator: derives the expected code for the current step
    /// ±1 and never marks anything verified — the code is reusable
    /// within its step window.
    pub fn verify(&self, user_id: &str, code: &str, channel: OtpChannel) -> GuardResult<bool> {
        // Kill switch: verification is permissive, not broken.
        if !self.config.enabled {
            return Ok(true);
        }

        if channel == OtpChannel::GoogleAuthenticator {
            return Ok(self.verify_authenticator(user_id, code));
        }

        let now = self.clock.now();
        let key = Self::index_key(user_id, channel);
        let mut shard = self.shard(&key).lock();
        let Some(history) = shard.get_mut(&key) else {
            return Ok(false);
        };
        let Some(record) = history
            .iter_mut()
            .rev()
            .find(|r| !r.verified && r.expires_at > now)
        else {
            return Ok(false);
        };

        if record.code == code {
            record.verified = true;
            log::info!("otp verified for {user_id} via {}", channel.as_str());
            Ok(true)
        } else {
            record.attempt_count += 1;
            log::info!(
                "otp mismatch for {user_id} via {} (attempt {})",
                channel.as_str(),
                record.attempt_count
            );
            Ok(false)
        }
    }

    /// The current-step code for an enrolled user, as the device would
    /// show it. Used by enrollment confirmation screens ("enter the
    /// code your app displays now") and by tests; None if not enrolled.
    pub fn authenticator_code(&self, user_id: &str) -> Option<String> {
        let secrets = self.secrets.read();
        let secret = secrets.get(user_id)?;
        let step = self.clock.now().timestamp() / AUTHENTICATOR_STEP_SECONDS;
        Some(hotp_code(secret.as_bytes(), step as u64, self.config.length))
    }

    fn verify_authenticator(&self, user_id: &str, code: &str) -> bool {
        let secrets = self.secrets.read();
        let Some(secret) = secrets.get(user_id) else {
            return false;
        };
        let step = self.clock.now().timestamp() / AUTHENTICATOR_STEP_SECONDS;
        (-AUTHENTICATOR_STEP_TOLERANCE..=AUTHENTICATOR_STEP_TOLERANCE).any(|delta| {
            let candidate = step + delta;
            candidate >= 0
                && hotp_code(secret.as_bytes(), candidate as u64, self.config.length) == code
        })
    }

    /// Attempts left on the active record before the configured ceiling.
    /// None when there is no active record. Enforcement is the caller's.
    pub fn attempts_remaining(&self, user_id: &str, channel: OtpChannel) -> Option<i64> {
        let now = self.clock.now();
        let key = Self::index_key(user_id, channel);
        let shard = self.shard(&key).lock();
        let history = shard.get(&key)?;
        let record = history.iter().rev().find(|r| !r.verified && r.expires_at > now)?;
        Some((self.config.max_attempts - record.attempt_count).max(0))
    }

    /// Retire expired, never-verified records. Verified records are
    /// kept as the audit trail of successful challenges. Returns the
    /// number retired. Called by CleanupSweeper.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) -> usize {
        let mut retired = 0;
        for shard in &self.records {
            let mut shard = shard.lock();
            for history in shard.values_mut() {
                let before = history.len();
                history.retain(|r| r.verified || r.expires_at >= now);
                retired += before - history.len();
            }
            shard.retain(|_, history| !history.is_empty());
        }
        if retired > 0 {
            log::debug!("otp sweep retired {retired} expired records");
        }
        retired
    }

    /// Number of retained records across all users and channels.
    pub fn record_count(&self) -> usize {
        self.records
            .iter()
            .map(|s| s.lock().values().map(Vec::len).sum::<usize>())
            .sum()
    }
}

fn random_numeric_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}

// ── Authenticator code derivation ────────────────────────────────────────────

/// HOTP over the time-step counter: HMAC-SHA256, dynamic truncation,
/// modulo 10^digits, zero-padded.
fn hotp_code(secret: &[u8], counter: u64, digits: usize) -> String {
    let mac = hmac_sha256(secret, &counter.to_be_bytes());
    let offset = (mac[mac.len() - 1] & 0x0f) as usize;
    let binary = (u64::from(mac[offset] & 0x7f) << 24)
        | (u64::from(mac[offset + 1]) << 16)
        | (u64::from(mac[offset + 2]) << 8)
        | u64::from(mac[offset + 3]);
    // u64 so a 10-digit modulus cannot overflow.
    let modulus = 10u64.pow(digits as u32);
    format!("{:0width$}", binary % modulus, width = digits)
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    const BLOCK_SIZE: usize = 64;

    let mut padded_key = [0u8; BLOCK_SIZE];
    if key.len() > BLOCK_SIZE {
        let digest = Sha256::digest(key);
        padded_key[..digest.len()].copy_from_slice(&digest);
    } else {
        padded_key[..key.len()].copy_from_slice(key);
    }

    let mut inner = Sha256::new();
    inner.update(padded_key.map(|b| b ^ 0x36));
    inner.update(message);
    let inner_digest = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(padded_key.map(|b| b ^ 0x5c));
    outer.update(inner_digest);
    outer.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hotp_is_deterministic_and_padded() {
        let a = hotp_code(b"secret", 1, 6);
        let b = hotp_code(b"secret", 1, 6);
        assert_eq!(a, b);
        assert_eq!(a.len(), 6);
        assert!(a.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn hotp_differs_across_counters() {
        // Adjacent counters virtually never collide; pinning a few
        // keeps a truncation bug from silently returning a constant.
        let codes: Vec<String> = (0..5).map(|c| hotp_code(b"secret", c, 6)).collect();
        assert!(codes.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn hmac_handles_oversized_keys() {
        let long_key = [0xabu8; 100];
        let short = hmac_sha256(&Sha256::digest(long_key), b"msg");
        let long = hmac_sha256(&long_key, b"msg");
        assert_eq!(short, long);
    }
}
