//! Application state and shared resources.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::ledger::{Ledger, SystemClock, build_generator};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// OTP ledger
    pub ledger: Arc<Ledger>,

    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create new application state with a system-clock ledger
    pub fn new(config: AppConfig) -> Result<Self> {
        let generator = build_generator(
            config.otp.generator,
            &config.otp.canned_codes,
            config.otp.code_length,
        )
        .context("Invalid OTP generator configuration")?;

        let ledger = Arc::new(Ledger::new(
            config.otp.ledger_policy(),
            generator,
            Arc::new(SystemClock),
        ));

        tracing::info!(
            generator = ?config.otp.generator,
            expiry_secs = config.otp.expiry_secs,
            resend_cooldown_secs = config.otp.resend_cooldown_secs,
            max_attempts = config.otp.max_attempts,
            ceiling_policy = ?config.otp.ceiling_policy,
            expose_secret = config.otp.expose_secret,
            "OTP ledger initialized"
        );

        Ok(Self::with_ledger(config, ledger))
    }

    /// Build state around an existing ledger
    pub fn with_ledger(config: AppConfig, ledger: Arc<Ledger>) -> Self {
        Self {
            config,
            ledger,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
