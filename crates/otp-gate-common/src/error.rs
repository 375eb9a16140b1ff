//! Error types for OTP Gate components.
//!
//! Every variant here is an expected, caller-recoverable outcome. None of
//! them is retried internally; the request layer surfaces them verbatim.

use thiserror::Error;

use crate::constants::codes;

/// Rejections produced by the OTP ledger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A live OTP was issued too recently for this identity
    #[error("Please wait {retry_after_secs}s before requesting OTP again.")]
    ResendCooldown { retry_after_secs: u64 },

    /// No OTP has been issued for this identity
    #[error("No OTP requested for this phone.")]
    NotFound,

    /// The OTP outlived its expiry window
    #[error("OTP expired. Please request a new OTP.")]
    Expired,

    /// The attempt ceiling was reached
    #[error("Too many wrong attempts. Request a new OTP.")]
    TooManyAttempts,

    /// Secondary binding (date of birth) differs from the one given at issue
    #[error("DOB does not match the OTP request.")]
    BindingMismatch,

    /// Wrong code
    #[error("Invalid OTP. Attempts left: {attempts_left}")]
    Mismatch { attempts_left: u32 },
}

impl LedgerError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ResendCooldown { .. } => 429,
            Self::NotFound => 404,
            Self::Expired => 410,
            Self::TooManyAttempts => 429,
            Self::BindingMismatch => 401,
            Self::Mismatch { .. } => 401,
        }
    }

    /// Returns the wire error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ResendCooldown { .. } => codes::RESEND_COOLDOWN,
            Self::NotFound => codes::OTP_NOT_FOUND,
            Self::Expired => codes::OTP_EXPIRED,
            Self::TooManyAttempts => codes::TOO_MANY_ATTEMPTS,
            Self::BindingMismatch => codes::DOB_MISMATCH,
            Self::Mismatch { .. } => codes::OTP_MISMATCH,
        }
    }

    /// Seconds the caller should wait before issuing again
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::ResendCooldown { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Remaining verification attempts, reported on a wrong code
    pub fn attempts_left(&self) -> Option<u32> {
        match self {
            Self::Mismatch { attempts_left } => Some(*attempts_left),
            _ => None,
        }
    }
}

/// Malformed request input, rejected before it reaches the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Phone must be 10 digits.")]
    InvalidPhone,

    #[error("DOB must be a valid date (YYYY-MM-DD or DD-MM-YYYY).")]
    InvalidDob,

    #[error("OTP must be 4 to 6 digits.")]
    InvalidOtp,
}

impl ValidationError {
    pub fn status_code(&self) -> u16 {
        400
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPhone => codes::INVALID_PHONE,
            Self::InvalidDob => codes::INVALID_DOB,
            Self::InvalidOtp => codes::INVALID_OTP,
        }
    }
}
