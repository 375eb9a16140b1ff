//! Shared constants for OTP Gate components.

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";

/// Default OTP validity window (5 minutes)
pub const DEFAULT_EXPIRY_SECS: u64 = 300;

/// Default minimum gap between two issues for the same phone
pub const DEFAULT_RESEND_COOLDOWN_SECS: u64 = 30;

/// Default failed verifications allowed per OTP
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default length of randomly generated codes
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Accepted range for randomly generated code lengths
pub const CODE_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 4..=6;

/// Canned codes handed out in preset mode
pub const PRESET_CODES: [&str; 4] = ["1234", "5678", "7889", "1209"];

/// Upper bound for configured expiry and cooldown windows (10 years)
pub const MAX_WINDOW_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Default interval between background sweeps (seconds)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Number of lock stripes in the ledger
pub const LEDGER_SHARDS: usize = 16;

/// Error codes returned in the `error.code` field of failure responses
pub mod codes {
    pub const INVALID_PHONE: &str = "INVALID_PHONE";
    pub const INVALID_DOB: &str = "INVALID_DOB";
    pub const INVALID_OTP: &str = "INVALID_OTP";
    pub const RESEND_COOLDOWN: &str = "RESEND_COOLDOWN";
    pub const OTP_NOT_FOUND: &str = "OTP_NOT_FOUND";
    pub const OTP_EXPIRED: &str = "OTP_EXPIRED";
    pub const TOO_MANY_ATTEMPTS: &str = "TOO_MANY_ATTEMPTS";
    pub const DOB_MISMATCH: &str = "DOB_MISMATCH";
    pub const OTP_MISMATCH: &str = "OTP_MISMATCH";
}
