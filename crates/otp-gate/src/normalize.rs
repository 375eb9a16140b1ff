//! Request input normalization and shape checks.
//!
//! The ledger trusts its callers; everything here runs before a request
//! reaches it.

use chrono::NaiveDate;
use otp_gate_common::constants::CODE_LENGTH_RANGE;
use sha2::{Digest, Sha256};

/// Digits kept from a phone number (national significant number)
const PHONE_DIGITS: usize = 10;

/// Accepted date-of-birth layouts, tried in order
const DOB_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

/// Canonical date-of-birth layout stored as the secondary binding
const DOB_CANONICAL: &str = "%Y-%m-%d";

/// Keep digits only, dropping `+`, spaces, and dashes.
///
/// Longer numbers keep their last 10 digits, which strips a leading
/// country code such as `91`.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() > PHONE_DIGITS {
        digits[digits.len() - PHONE_DIGITS..].to_string()
    } else {
        digits
    }
}

/// Exactly 10 ASCII digits
pub fn is_valid_phone(phone: &str) -> bool {
    phone.len() == PHONE_DIGITS && phone.chars().all(|c| c.is_ascii_digit())
}

/// Parse `YYYY-MM-DD`, `DD-MM-YYYY` or `DD/MM/YYYY` into `YYYY-MM-DD`
pub fn normalize_dob(raw: &str) -> Option<String> {
    let s = raw.trim();
    DOB_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|date| date.format(DOB_CANONICAL).to_string())
}

/// 4 to 6 ASCII digits, the same range the generators emit
pub fn is_valid_otp_shape(code: &str) -> bool {
    CODE_LENGTH_RANGE.contains(&code.len()) && code.chars().all(|c| c.is_ascii_digit())
}

/// Short, stable stand-in for a phone number in log lines
pub fn identity_fingerprint(identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    digest[..6].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone_strips_formatting() {
        assert_eq!(normalize_phone("98765-43210"), "9876543210");
        assert_eq!(normalize_phone(" 98765 43210 "), "9876543210");
        assert_eq!(normalize_phone("+91 98765 43210"), "9876543210");
        assert_eq!(normalize_phone("0091-9876543210"), "9876543210");
        assert_eq!(normalize_phone("12345"), "12345");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn test_phone_validation() {
        assert!(is_valid_phone("9876543210"));
        assert!(!is_valid_phone("987654321"));
        assert!(!is_valid_phone("98765432100"));
        assert!(!is_valid_phone("98765a3210"));
        assert!(!is_valid_phone(""));
    }

    #[test]
    fn test_normalize_dob_formats() {
        assert_eq!(normalize_dob("2000-01-31").as_deref(), Some("2000-01-31"));
        assert_eq!(normalize_dob("31-01-2000").as_deref(), Some("2000-01-31"));
        assert_eq!(normalize_dob("31/01/2000").as_deref(), Some("2000-01-31"));
        assert_eq!(normalize_dob("  2000-01-31 ").as_deref(), Some("2000-01-31"));
    }

    #[test]
    fn test_normalize_dob_rejects_invalid() {
        assert_eq!(normalize_dob("2000-02-30"), None);
        assert_eq!(normalize_dob("01/31/2000"), None);
        assert_eq!(normalize_dob("yesterday"), None);
        assert_eq!(normalize_dob(""), None);
    }

    #[test]
    fn test_otp_shape() {
        assert!(is_valid_otp_shape("1234"));
        assert!(is_valid_otp_shape("123456"));
        assert!(!is_valid_otp_shape("123"));
        assert!(!is_valid_otp_shape("1234567"));
        assert!(!is_valid_otp_shape("12a4"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = identity_fingerprint("9876543210");
        assert_eq!(a.len(), 12);
        assert_eq!(a, identity_fingerprint("9876543210"));
        assert_ne!(a, identity_fingerprint("9876543211"));
    }
}
