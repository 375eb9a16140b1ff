//! The OTP ledger: per-identity challenge records with lazy expiry.
//!
//! Records live in a fixed set of lock stripes keyed by identity hash. Every
//! operation takes exactly one stripe lock for its whole check-then-mutate
//! sequence, so two calls for the same identity never interleave while calls
//! for different identities rarely contend.

use chrono::{DateTime, Duration, Utc};
use constant_time_eq::constant_time_eq;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use otp_gate_common::constants::{
    DEFAULT_EXPIRY_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_RESEND_COOLDOWN_SECS, LEDGER_SHARDS,
};
use otp_gate_common::{CeilingPolicy, ChallengeRecord, LedgerError, LedgerSnapshot};

use super::clock::Clock;
use super::generator::OtpGenerator;
use crate::normalize::identity_fingerprint;

/// Timing and attempt rules applied to every record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    pub expiry_window: Duration,
    pub resend_cooldown: Duration,
    pub max_attempts: u32,
    pub ceiling: CeilingPolicy,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            expiry_window: Duration::seconds(DEFAULT_EXPIRY_SECS as i64),
            resend_cooldown: Duration::seconds(DEFAULT_RESEND_COOLDOWN_SECS as i64),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            ceiling: CeilingPolicy::NextAccess,
        }
    }
}

/// Runtime counters
#[derive(Default)]
struct LedgerStats {
    issued: AtomicU64,
    cooldown_rejections: AtomicU64,
    verified: AtomicU64,
    failed_verifications: AtomicU64,
    swept: AtomicU64,
}

type Shard = Mutex<HashMap<String, ChallengeRecord>>;

/// In-memory store of outstanding OTP challenges
pub struct Ledger {
    shards: Box<[Shard]>,
    policy: LedgerPolicy,
    generator: Arc<dyn OtpGenerator>,
    clock: Arc<dyn Clock>,
    stats: LedgerStats,
}

impl Ledger {
    pub fn new(
        policy: LedgerPolicy,
        generator: Arc<dyn OtpGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_shards(policy, generator, clock, LEDGER_SHARDS)
    }

    pub fn with_shards(
        policy: LedgerPolicy,
        generator: Arc<dyn OtpGenerator>,
        clock: Arc<dyn Clock>,
        shards: usize,
    ) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            policy,
            generator,
            clock,
            stats: LedgerStats::default(),
        }
    }

    fn shard(&self, identity: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        identity.hash(&mut hasher);
        let idx = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[idx]
    }

    /// Issue a new OTP for `identity` at the current time
    pub fn issue(
        &self,
        identity: &str,
        secondary_binding: Option<&str>,
    ) -> Result<ChallengeRecord, LedgerError> {
        self.issue_at(identity, secondary_binding, self.clock.now())
    }

    /// Issue a new OTP for `identity`, replacing any prior record.
    ///
    /// Refused with `ResendCooldown` while a live record issued less than
    /// `resend_cooldown` ago exists; the prior record is left untouched.
    /// Returns the new record including its plaintext secret.
    pub fn issue_at(
        &self,
        identity: &str,
        secondary_binding: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ChallengeRecord, LedgerError> {
        let mut records = self.shard(identity).lock();

        if let Some(existing) = records.get(identity) {
            if existing.is_live_at(now) {
                if let Some(wait) = existing.cooldown_remaining(now, self.policy.resend_cooldown) {
                    self.stats.cooldown_rejections.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        identity = %identity_fingerprint(identity),
                        retry_after_secs = wait,
                        "OTP resend refused during cooldown"
                    );
                    return Err(LedgerError::ResendCooldown {
                        retry_after_secs: wait,
                    });
                }
            }
        }

        let record = ChallengeRecord::new(
            identity.to_string(),
            self.generator.generate(),
            secondary_binding
                .filter(|b| !b.is_empty())
                .map(str::to_string),
            now,
            self.policy.expiry_window,
            self.policy.max_attempts,
        );

        let replaced = records
            .insert(identity.to_string(), record.clone())
            .is_some();
        self.stats.issued.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            identity = %identity_fingerprint(identity),
            replaced,
            expires_at = %record.expires_at,
            "Issued OTP challenge"
        );

        Ok(record)
    }

    /// Verify a candidate code at the current time
    pub fn verify(
        &self,
        identity: &str,
        candidate: &str,
        secondary_binding: Option<&str>,
    ) -> Result<(), LedgerError> {
        self.verify_at(identity, candidate, secondary_binding, self.clock.now())
    }

    /// Verify a candidate code for `identity`.
    ///
    /// Checks run in order: existence, expiry, attempt ceiling, secondary
    /// binding, code. A binding mismatch consumes no attempt. A correct code
    /// consumes the record.
    pub fn verify_at(
        &self,
        identity: &str,
        candidate: &str,
        secondary_binding: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut records = self.shard(identity).lock();

        let result = match records.get_mut(identity) {
            None => Err(LedgerError::NotFound),
            Some(record) => {
                let (remove, result) = self.judge(record, candidate, secondary_binding, now);
                if remove {
                    records.remove(identity);
                }
                result
            }
        };
        drop(records);

        match &result {
            Ok(()) => {
                self.stats.verified.fetch_add(1, Ordering::Relaxed);
                tracing::info!(identity = %identity_fingerprint(identity), "OTP verified");
            }
            Err(e) => {
                self.stats.failed_verifications.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    identity = %identity_fingerprint(identity),
                    code = e.code(),
                    "OTP verification failed"
                );
            }
        }

        result
    }

    /// Decide the outcome for an existing record. Returns whether the record
    /// must be removed along with the outcome.
    fn judge(
        &self,
        record: &mut ChallengeRecord,
        candidate: &str,
        secondary_binding: Option<&str>,
        now: DateTime<Utc>,
    ) -> (bool, Result<(), LedgerError>) {
        if record.is_expired_at(now) {
            return (true, Err(LedgerError::Expired));
        }

        if record.is_exhausted() {
            return (true, Err(LedgerError::TooManyAttempts));
        }

        if let Some(binding) = secondary_binding.filter(|b| !b.is_empty()) {
            if record.secondary_binding.as_deref() != Some(binding) {
                return (false, Err(LedgerError::BindingMismatch));
            }
        }

        if constant_time_eq(candidate.as_bytes(), record.secret.as_bytes()) {
            return (true, Ok(()));
        }

        record.attempt_count += 1;

        if record.is_exhausted() && self.policy.ceiling == CeilingPolicy::Immediate {
            tracing::warn!(
                identity = %identity_fingerprint(&record.identity),
                attempts = record.attempt_count,
                "OTP attempt ceiling reached"
            );
            return (true, Err(LedgerError::TooManyAttempts));
        }

        (
            false,
            Err(LedgerError::Mismatch {
                attempts_left: record.attempts_left(),
            }),
        )
    }

    /// Snapshot of the record held for `identity`, if any
    #[cfg(test)]
    pub fn get(&self, identity: &str) -> Option<ChallengeRecord> {
        self.shard(identity).lock().get(identity).cloned()
    }

    /// Number of records currently held, expired ones included
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.lock().is_empty())
    }

    /// Drop expired records at the current time
    pub fn sweep(&self) -> usize {
        self.sweep_at(self.clock.now())
    }

    /// Drop every record whose expiry has passed at `now`.
    ///
    /// Live records, including ones at their attempt ceiling, are left for
    /// `verify` to judge.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut records = shard.lock();
            let before = records.len();
            records.retain(|_, record| !record.is_expired_at(now));
            removed += before - records.len();
        }

        self.stats.swept.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Get statistics snapshot
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            live_records: self.len() as u64,
            issued: self.stats.issued.load(Ordering::Relaxed),
            cooldown_rejections: self.stats.cooldown_rejections.load(Ordering::Relaxed),
            verified: self.stats.verified.load(Ordering::Relaxed),
            failed_verifications: self.stats.failed_verifications.load(Ordering::Relaxed),
            swept: self.stats.swept.load(Ordering::Relaxed),
        }
    }
}
