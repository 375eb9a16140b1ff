//! HTTP route handlers for OTP Gate.

use axum::{
    Json, Router,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use otp_gate_common::{ErrorEnvelope, LedgerError, ValidationError};

use crate::state::AppState;

mod health;
mod otp;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/stats", get(health::stats))

        // OTP lifecycle
        .route("/otp/send", post(otp::send_code))
        .route("/otp/verify", post(otp::verify_code))

        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())

        // Add shared state
        .with_state(state)
}

/// Any failure a handler can answer with
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Validation(e) => (e.status_code(), e.code()),
            Self::Ledger(e) => (e.status_code(), e.code()),
        };

        let mut envelope = ErrorEnvelope::new(code, self.to_string());
        if let Self::Ledger(e) = &self {
            envelope.retry_after_seconds = e.retry_after_secs();
            envelope.attempts_left = e.attempts_left();
        }
        let retry_after = envelope.retry_after_seconds;

        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(envelope)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
