//! Core types shared across OTP Gate components.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// When the attempt ceiling is enforced.
///
/// - `NextAccess`: the failed attempt that reaches the ceiling still answers
///   with a mismatch; the record is dropped on the following call.
/// - `Immediate`: the failed attempt that reaches the ceiling drops the
///   record and answers with too-many-attempts right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeilingPolicy {
    #[default]
    NextAccess,
    Immediate,
}

/// One outstanding OTP challenge, keyed by identity (normalized phone).
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeRecord {
    /// Key the record is stored under
    pub identity: String,

    /// The OTP value (never serialized)
    #[serde(skip_serializing)]
    pub secret: String,

    /// Optional second factor that must match on verify (normalized DOB)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_binding: Option<String>,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    /// Failed verifications so far
    pub attempt_count: u32,

    /// Ceiling for `attempt_count`
    pub max_attempts: u32,
}

impl ChallengeRecord {
    pub fn new(
        identity: String,
        secret: String,
        secondary_binding: Option<String>,
        now: DateTime<Utc>,
        expiry_window: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            identity,
            secret,
            secondary_binding,
            issued_at: now,
            expires_at: now + expiry_window,
            attempt_count: 0,
            max_attempts,
        }
    }

    /// Check if the record has passed its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Check if the attempt ceiling has been reached
    pub fn is_exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }

    /// A live record can still be matched against
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now) && !self.is_exhausted()
    }

    pub fn attempts_left(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt_count)
    }

    /// Whole seconds until a resend is allowed, or `None` if it already is.
    ///
    /// Rounds up so that waiting the returned number of seconds always
    /// clears the cooldown.
    pub fn cooldown_remaining(&self, now: DateTime<Utc>, cooldown: Duration) -> Option<u64> {
        // A caller that read the clock just before a newer issue sees no elapsed time
        let elapsed = (now - self.issued_at).max(Duration::zero());
        if elapsed >= cooldown {
            return None;
        }
        let remaining_ms = (cooldown - elapsed).num_milliseconds().max(0) as u64;
        Some(remaining_ms.div_ceil(1000))
    }

    /// Seconds left before expiry (0 once expired)
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}

/// Counter snapshot for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Records currently held (live or awaiting lazy removal)
    pub live_records: u64,

    /// OTPs issued since start
    pub issued: u64,

    /// Issues refused because of the resend cooldown
    pub cooldown_rejections: u64,

    /// Successful verifications
    pub verified: u64,

    /// Verifications that failed for any reason
    pub failed_verifications: u64,

    /// Records removed by the background sweeper
    pub swept: u64,
}

/// `error` object inside a failure envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Failure envelope: `{"success": false, "error": {...}, ...extras}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_left: Option<u32>,
}

impl ErrorEnvelope {
    pub fn new(code: &str, message: String) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
            retry_after_seconds: None,
            attempts_left: None,
        }
    }
}

/// Response to a successful OTP issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendCodeResponse {
    pub success: bool,
    pub message: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    pub expires_in_seconds: u64,
    /// Plaintext OTP, only present when secret exposure is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

/// Response to a successful OTP verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyCodeResponse {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(now: DateTime<Utc>) -> ChallengeRecord {
        ChallengeRecord::new(
            "9876543210".to_string(),
            "1234".to_string(),
            Some("2000-01-01".to_string()),
            now,
            Duration::seconds(300),
            5,
        )
    }

    #[test]
    fn test_record_expiry_is_strict() {
        let now = Utc::now();
        let rec = record(now);
        assert_eq!(rec.expires_at, now + Duration::seconds(300));
        assert!(!rec.is_expired_at(rec.expires_at));
        assert!(rec.is_expired_at(rec.expires_at + Duration::milliseconds(1)));
    }

    #[test]
    fn test_cooldown_rounds_up() {
        let now = Utc::now();
        let rec = record(now);
        let cooldown = Duration::seconds(30);
        assert_eq!(rec.cooldown_remaining(now, cooldown), Some(30));
        assert_eq!(
            rec.cooldown_remaining(now + Duration::milliseconds(100), cooldown),
            Some(30)
        );
        assert_eq!(rec.cooldown_remaining(now + Duration::seconds(29), cooldown), Some(1));
        assert_eq!(rec.cooldown_remaining(now + Duration::seconds(30), cooldown), None);
    }

    #[test]
    fn test_cooldown_never_exceeds_window_for_stale_now() {
        let now = Utc::now();
        let rec = record(now);
        let cooldown = Duration::seconds(30);
        assert_eq!(
            rec.cooldown_remaining(now - Duration::milliseconds(5), cooldown),
            Some(30)
        );
        assert_eq!(rec.cooldown_remaining(now - Duration::seconds(2), cooldown), Some(30));
    }

    #[test]
    fn test_remaining_secs() {
        let now = Utc::now();
        let rec = record(now);
        assert_eq!(rec.remaining_secs(now), 300);
        assert_eq!(rec.remaining_secs(now + Duration::seconds(100)), 200);
        assert_eq!(rec.remaining_secs(now + Duration::seconds(400)), 0);
    }

    #[test]
    fn test_secret_is_never_serialized() {
        let rec = record(Utc::now());
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("secret").is_none());
        assert_eq!(json["identity"], "9876543210");
        assert_eq!(json["secondary_binding"], "2000-01-01");
    }

    #[test]
    fn test_ceiling_policy_serde() {
        let policy: CeilingPolicy = serde_json::from_str("\"immediate\"").unwrap();
        assert_eq!(policy, CeilingPolicy::Immediate);
        assert_eq!(CeilingPolicy::default(), CeilingPolicy::NextAccess);
    }
}
