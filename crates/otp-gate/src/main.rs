//! # OTP Gate
//!
//! Issues and verifies short-lived one-time passcodes bound to a phone
//! number, optionally tied to a date of birth, in front of downstream
//! account lookups.
//!
//! ## Architecture
//! ```text
//! Client → routes (normalize/validate) → Ledger (in-memory, striped locks)
//!                                           ↑
//!                                        Sweeper
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod ledger;
mod normalize;
mod routes;
mod state;

use crate::config::AppConfig;
use ledger::sweeper_worker;
use otp_gate_common::CeilingPolicy;
use state::AppState;

/// OTP Gate - phone-bound one-time passcode service
#[derive(Parser, Debug)]
#[command(name = "otp-gate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/otp-gate.toml")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Listen port, keeping the configured host (overrides config)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// OTP validity in seconds
    #[arg(long, env = "OTP_EXPIRY_SECONDS")]
    expiry_secs: Option<u64>,

    /// Minimum seconds between two OTPs for the same phone
    #[arg(long, env = "RESEND_COOLDOWN_SECONDS")]
    resend_cooldown_secs: Option<u64>,

    /// Failed verifications allowed per OTP
    #[arg(long, env = "MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// When the attempt ceiling is enforced (next_access, immediate)
    #[arg(long, env = "OTP_CEILING_POLICY", value_parser = crate::config::parse_ceiling_policy)]
    ceiling_policy: Option<CeilingPolicy>,

    /// Draw codes from the preset list instead of random digits
    #[arg(long, env = "USE_PRESET_OTPS", value_parser = clap::builder::BoolishValueParser::new())]
    use_preset_otps: Option<bool>,

    /// Digits per randomly generated code
    #[arg(long, env = "OTP_LENGTH")]
    otp_length: Option<usize>,

    /// Include the plaintext OTP in issue responses
    #[arg(long, env = "RETURN_OTP_IN_RESPONSE", value_parser = clap::builder::BoolishValueParser::new())]
    return_otp: Option<bool>,

    /// Require a date of birth when issuing
    #[arg(long, env = "REQUIRE_DOB", value_parser = clap::builder::BoolishValueParser::new())]
    require_dob: Option<bool>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before reading env-backed flags
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("🔐 Starting OTP Gate v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    if config.otp.expose_secret {
        tracing::warn!("Plaintext OTPs are returned in issue responses");
    }

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Initialize application state
    let state = AppState::new(config.clone())?;

    // Spawn ledger sweeper
    if config.sweeper.enabled {
        let ledger = state.ledger.clone();
        let sweeper_shutdown = shutdown_tx.subscribe();
        let interval = Duration::from_secs(config.sweeper.interval_secs);
        tokio::spawn(async move {
            sweeper_worker(ledger, interval, sweeper_shutdown).await;
        });
    }

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("🚀 OTP Gate listening on {}", config.listen_addr);

    // Handle graceful shutdown
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Keep serving; the process can still be stopped externally
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("🛑 Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("👋 OTP Gate shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
