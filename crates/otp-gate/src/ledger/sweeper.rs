//! Background sweeper that bounds memory held by abandoned challenges.
//!
//! Expiry is always enforced lazily by `Ledger::verify`; the sweeper only
//! reclaims records nobody came back for.

use std::sync::Arc;
use std::time::Duration;

use super::Ledger;

/// Periodically drop expired records until shutdown is signalled
pub async fn sweeper_worker(
    ledger: Arc<Ledger>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "🧹 Ledger sweeper started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = ledger.sweep();
                if removed > 0 {
                    tracing::debug!(removed, remaining = ledger.len(), "Swept expired OTP challenges");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("🧹 Ledger sweeper shutting down...");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{FixedGenerator, LedgerPolicy, ManualClock};

    #[tokio::test]
    async fn test_sweeper_reclaims_expired_and_stops() {
        let clock = Arc::new(ManualClock::default());
        let ledger = Arc::new(Ledger::new(
            LedgerPolicy::default(),
            Arc::new(FixedGenerator("1234".to_string())),
            clock.clone(),
        ));
        ledger.issue("9876543210", None).unwrap();
        clock.advance(chrono::Duration::seconds(301));

        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
        let handle = tokio::spawn(sweeper_worker(
            ledger.clone(),
            Duration::from_millis(10),
            shutdown_rx,
        ));

        for _ in 0..100 {
            if ledger.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(ledger.is_empty());
        assert_eq!(ledger.snapshot().swept, 1);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
