//! Health check and counters endpoints.

use axum::{Json, extract::State};
use serde::Serialize;

use otp_gate_common::LedgerSnapshot;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    success: bool,
    ok: bool,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct StatsResponse {
    success: bool,
    uptime_secs: u64,
    #[serde(flatten)]
    ledger: LedgerSnapshot,
}

/// Ledger counters (for monitoring)
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        success: true,
        uptime_secs: state.uptime_secs(),
        ledger: state.ledger.snapshot(),
    })
}
