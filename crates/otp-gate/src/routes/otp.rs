//! OTP issue and verification endpoints.

use axum::{Json, body::Bytes, extract::State};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use otp_gate_common::{SendCodeResponse, ValidationError, VerifyCodeResponse};

use super::ApiError;
use crate::normalize::{
    identity_fingerprint, is_valid_otp_shape, is_valid_phone, normalize_dob, normalize_phone,
};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendRequest {
    #[serde(deserialize_with = "lenient_string")]
    phone: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    dob: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyRequest {
    #[serde(deserialize_with = "lenient_string")]
    phone: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    otp: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    dob: Option<String>,
}

/// Issue an OTP for a phone number
///
/// Returns:
/// - 200: OTP issued (plaintext code included only if exposure is enabled)
/// - 400: Invalid phone or date of birth
/// - 429: Resend cooldown still running
pub async fn send_code(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SendCodeResponse>, ApiError> {
    let payload: SendRequest = parse_body(&body);

    let phone = valid_phone(payload.phone.as_deref())?;
    let dob = match supplied_dob(payload.dob.as_deref())? {
        Some(dob) => Some(dob),
        None if state.config.otp.require_dob => return Err(ValidationError::InvalidDob.into()),
        None => None,
    };

    let record = state.ledger.issue(&phone, dob.as_deref())?;

    tracing::info!(
        identity = %identity_fingerprint(&phone),
        expires_at = %record.expires_at,
        "OTP issued"
    );

    Ok(Json(SendCodeResponse {
        success: true,
        message: "OTP generated".to_string(),
        phone,
        dob,
        expires_in_seconds: record.remaining_secs(record.issued_at),
        otp: state.config.otp.expose_secret.then_some(record.secret),
    }))
}

/// Verify an OTP
///
/// Returns:
/// - 200: Verified, OTP consumed
/// - 400: Invalid phone, OTP shape, or date of birth
/// - 401: Wrong code or date of birth mismatch
/// - 404: No OTP requested for this phone
/// - 410: OTP expired
/// - 429: Attempt ceiling reached
pub async fn verify_code(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<VerifyCodeResponse>, ApiError> {
    let payload: VerifyRequest = parse_body(&body);

    let phone = valid_phone(payload.phone.as_deref())?;
    let otp = payload.otp.as_deref().unwrap_or_default().trim();
    if !is_valid_otp_shape(otp) {
        return Err(ValidationError::InvalidOtp.into());
    }
    let dob = supplied_dob(payload.dob.as_deref())?;

    state.ledger.verify(&phone, otp, dob.as_deref())?;

    Ok(Json(VerifyCodeResponse {
        success: true,
        message: "OTP verified".to_string(),
    }))
}

/// Missing or malformed JSON bodies read as an empty object
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

fn valid_phone(raw: Option<&str>) -> Result<String, ValidationError> {
    let phone = normalize_phone(raw.unwrap_or_default());
    if is_valid_phone(&phone) {
        Ok(phone)
    } else {
        Err(ValidationError::InvalidPhone)
    }
}

/// Blank counts as not supplied; anything else must parse as a date
fn supplied_dob(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => normalize_dob(s).map(Some).ok_or(ValidationError::InvalidDob),
    }
}

/// Accept strings, numbers, or null for a text field
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_lenient() {
        let req: VerifyRequest = parse_body(br#"{"phone": 9876543210, "otp": "1234"}"#);
        assert_eq!(req.phone.as_deref(), Some("9876543210"));
        assert_eq!(req.otp.as_deref(), Some("1234"));
        assert!(req.dob.is_none());

        let req: VerifyRequest = parse_body(b"");
        assert!(req.phone.is_none());

        let req: SendRequest = parse_body(br#"{"phone": null, "dob": "2000-01-01"}"#);
        assert!(req.phone.is_none());
        assert_eq!(req.dob.as_deref(), Some("2000-01-01"));
    }

    #[test]
    fn test_supplied_dob() {
        assert_eq!(supplied_dob(None), Ok(None));
        assert_eq!(supplied_dob(Some("  ")), Ok(None));
        assert_eq!(supplied_dob(Some("31/12/1999")), Ok(Some("1999-12-31".to_string())));
        assert_eq!(supplied_dob(Some("1999-31-12")), Err(ValidationError::InvalidDob));
    }
}
