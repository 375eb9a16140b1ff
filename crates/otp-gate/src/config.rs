//! Configuration management for OTP Gate.
//!
//! Precedence, lowest first: built-in defaults, TOML file, environment and
//! CLI flags.

use anyhow::{Context, Result, ensure};
use chrono::Duration;
use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::Deserialize;
use std::path::Path;

use otp_gate_common::CeilingPolicy;
use otp_gate_common::constants::{
    DEFAULT_CODE_LENGTH, DEFAULT_EXPIRY_SECS, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_RESEND_COOLDOWN_SECS, DEFAULT_SWEEP_INTERVAL_SECS, MAX_WINDOW_SECS, PRESET_CODES,
};

use crate::ledger::{GeneratorMode, LedgerPolicy};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// OTP lifecycle configuration
    #[serde(default)]
    pub otp: OtpConfig,

    /// Background sweeper configuration
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

/// OTP lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    /// OTP validity in seconds
    #[serde(default = "default_expiry")]
    pub expiry_secs: u64,

    /// Minimum gap between two issues for one phone, in seconds
    #[serde(default = "default_resend_cooldown")]
    pub resend_cooldown_secs: u64,

    /// Failed verifications allowed per OTP
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// When the attempt ceiling is enforced
    #[serde(default)]
    pub ceiling_policy: CeilingPolicy,

    /// Secret generation strategy
    #[serde(default)]
    pub generator: GeneratorMode,

    /// Code set for the canned generator
    #[serde(default = "default_canned_codes")]
    pub canned_codes: Vec<String>,

    /// Digits per code for the random generator
    #[serde(default = "default_code_length")]
    pub code_length: usize,

    /// Include the plaintext OTP in issue responses (testing deployments)
    #[serde(default = "default_true")]
    pub expose_secret: bool,

    /// Reject issue requests without a date of birth
    #[serde(default = "default_true")]
    pub require_dob: bool,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            expiry_secs: default_expiry(),
            resend_cooldown_secs: default_resend_cooldown(),
            max_attempts: default_max_attempts(),
            ceiling_policy: CeilingPolicy::default(),
            generator: GeneratorMode::default(),
            canned_codes: default_canned_codes(),
            code_length: default_code_length(),
            expose_secret: true,
            require_dob: true,
        }
    }
}

impl OtpConfig {
    /// Ledger rules derived from this configuration.
    ///
    /// Windows are bounded by `MAX_WINDOW_SECS` in `AppConfig::validate`.
    pub fn ledger_policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            expiry_window: Duration::seconds(self.expiry_secs as i64),
            resend_cooldown: Duration::seconds(self.resend_cooldown_secs as i64),
            max_attempts: self.max_attempts,
            ceiling: self.ceiling_policy,
        }
    }
}

/// Background sweeper configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between sweeps
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_sweep_interval(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_expiry() -> u64 { DEFAULT_EXPIRY_SECS }
fn default_resend_cooldown() -> u64 { DEFAULT_RESEND_COOLDOWN_SECS }
fn default_max_attempts() -> u32 { DEFAULT_MAX_ATTEMPTS }
fn default_canned_codes() -> Vec<String> { PRESET_CODES.iter().map(|c| c.to_string()).collect() }
fn default_code_length() -> usize { DEFAULT_CODE_LENGTH }
fn default_sweep_interval() -> u64 { DEFAULT_SWEEP_INTERVAL_SECS }
fn default_true() -> bool { true }

/// Parse `next_access` / `immediate` (CLI and environment)
pub fn parse_ceiling_policy(s: &str) -> Result<CeilingPolicy, String> {
    match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "next_access" => Ok(CeilingPolicy::NextAccess),
        "immediate" => Ok(CeilingPolicy::Immediate),
        other => Err(format!(
            "unknown ceiling policy '{}', expected 'next_access' or 'immediate'",
            other
        )),
    }
}

impl AppConfig {
    /// Load configuration from file, with CLI/environment overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let builder =
                config::Config::builder().add_source(config::File::with_name(config_path));
            Self::from_builder(builder)?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        config.apply_overrides(args);
        config.validate()?;

        Ok(config)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        builder
            .build()
            .context("Failed to load config file")?
            .try_deserialize()
            .context("Failed to parse config")
    }

    fn apply_overrides(&mut self, args: &super::Args) {
        if let Some(ref listen) = args.listen {
            self.listen_addr = listen.clone();
        }
        if let Some(port) = args.port {
            let host = self
                .listen_addr
                .rsplit_once(':')
                .map(|(host, _)| host)
                .unwrap_or("0.0.0.0");
            self.listen_addr = format!("{}:{}", host, port);
        }
        if let Some(secs) = args.expiry_secs {
            self.otp.expiry_secs = secs;
        }
        if let Some(secs) = args.resend_cooldown_secs {
            self.otp.resend_cooldown_secs = secs;
        }
        if let Some(max) = args.max_attempts {
            self.otp.max_attempts = max;
        }
        if let Some(policy) = args.ceiling_policy {
            self.otp.ceiling_policy = policy;
        }
        if let Some(preset) = args.use_preset_otps {
            self.otp.generator = if preset {
                GeneratorMode::Canned
            } else {
                GeneratorMode::Random
            };
        }
        if let Some(length) = args.otp_length {
            self.otp.code_length = length;
        }
        if let Some(expose) = args.return_otp {
            self.otp.expose_secret = expose;
        }
        if let Some(require) = args.require_dob {
            self.otp.require_dob = require;
        }
    }

    /// Reject settings the ledger cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(self.otp.expiry_secs >= 1, "otp.expiry_secs must be at least 1");
        ensure!(self.otp.max_attempts >= 1, "otp.max_attempts must be at least 1");
        ensure!(
            self.otp.expiry_secs <= MAX_WINDOW_SECS,
            "otp.expiry_secs must be at most {}",
            MAX_WINDOW_SECS
        );
        ensure!(
            self.otp.resend_cooldown_secs <= MAX_WINDOW_SECS,
            "otp.resend_cooldown_secs must be at most {}",
            MAX_WINDOW_SECS
        );
        if self.sweeper.enabled {
            ensure!(
                self.sweeper.interval_secs >= 1,
                "sweeper.interval_secs must be at least 1"
            );
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            otp: OtpConfig::default(),
            sweeper: SweeperConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::sync::Arc;

    fn from_toml(toml: &str) -> Result<AppConfig> {
        AppConfig::from_builder(
            config::Config::builder()
                .add_source(config::File::from_str(toml, config::FileFormat::Toml)),
        )
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:5000");
        assert_eq!(config.otp.expiry_secs, 300);
        assert_eq!(config.otp.resend_cooldown_secs, 30);
        assert_eq!(config.otp.max_attempts, 5);
        assert_eq!(config.otp.generator, GeneratorMode::Canned);
        assert_eq!(config.otp.canned_codes, vec!["1234", "5678", "7889", "1209"]);
        assert!(config.otp.expose_secret);
        assert!(config.otp.require_dob);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = from_toml(
            r#"
            [otp]
            max_attempts = 3
            generator = "random"
            ceiling_policy = "immediate"

            [sweeper]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.otp.max_attempts, 3);
        assert_eq!(config.otp.generator, GeneratorMode::Random);
        assert_eq!(config.otp.ceiling_policy, CeilingPolicy::Immediate);
        assert_eq!(config.otp.expiry_secs, 300);
        assert!(!config.sweeper.enabled);
        assert_eq!(config.listen_addr, "0.0.0.0:5000");
    }

    #[test]
    fn test_cli_overrides() {
        let args = crate::Args::parse_from([
            "otp-gate",
            "--port",
            "8080",
            "--expiry-secs",
            "120",
            "--max-attempts",
            "3",
            "--use-preset-otps",
            "false",
            "--return-otp",
            "no",
            "--ceiling-policy",
            "immediate",
        ]);

        let mut config = AppConfig::default();
        config.apply_overrides(&args);

        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.otp.expiry_secs, 120);
        assert_eq!(config.otp.max_attempts, 3);
        assert_eq!(config.otp.generator, GeneratorMode::Random);
        assert!(!config.otp.expose_secret);
        assert_eq!(config.otp.ceiling_policy, CeilingPolicy::Immediate);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = AppConfig::default();
        config.otp.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_durations() {
        let mut config = AppConfig::default();
        config.otp.expiry_secs = 10_000_000_000_000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.otp.resend_cooldown_secs = (i64::MAX / 100) as u64;
        assert!(config.validate().is_err());

        // The largest accepted window still issues without overflowing
        let mut config = AppConfig::default();
        config.otp.expiry_secs = MAX_WINDOW_SECS;
        config.otp.resend_cooldown_secs = MAX_WINDOW_SECS;
        assert!(config.validate().is_ok());

        let ledger = crate::ledger::Ledger::new(
            config.otp.ledger_policy(),
            Arc::new(crate::ledger::FixedGenerator("1234".to_string())),
            Arc::new(crate::ledger::ManualClock::default()),
        );
        let record = ledger.issue("9876543210", None).unwrap();
        assert_eq!(record.remaining_secs(record.issued_at), MAX_WINDOW_SECS);
        assert_eq!(
            ledger.issue("9876543210", None).unwrap_err().retry_after_secs(),
            Some(MAX_WINDOW_SECS)
        );
    }

    #[test]
    fn test_ledger_policy_conversion() {
        let policy = OtpConfig::default().ledger_policy();
        assert_eq!(policy.expiry_window, Duration::seconds(300));
        assert_eq!(policy.resend_cooldown, Duration::seconds(30));
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn test_parse_ceiling_policy() {
        assert_eq!(parse_ceiling_policy("Next-Access"), Ok(CeilingPolicy::NextAccess));
        assert_eq!(parse_ceiling_policy("immediate"), Ok(CeilingPolicy::Immediate));
        assert!(parse_ceiling_policy("later").is_err());
    }
}
