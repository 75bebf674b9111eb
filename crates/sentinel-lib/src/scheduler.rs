//! Periodic task driver
//!
//! Each loop races a `tokio::time::interval` against a broadcast shutdown
//! receiver. A tick body always runs to completion before shutdown is
//! observed. Every tick runs in its own task, so a panicking tick is logged
//! and the loop carries on with the next one.

use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

pub const DEFAULT_DETECTION_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_ALERT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRAINING_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_INGESTION_INTERVAL: Duration = Duration::from_secs(5);

/// Spawn a named loop that calls `tick` every `period` until shutdown
///
/// The first tick fires immediately. Slow ticks delay the next one rather
/// than bursting to catch up.
pub fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        info!(task = name, interval_ms = period.as_millis() as u64, "Starting loop");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!(task = name, "Tick");
                    if let Err(e) = tokio::spawn(tick()).await {
                        error!(task = name, error = %e, "Loop tick failed");
                    }
                }
                _ = shutdown.recv() => {
                    info!(task = name, "Shutting down loop");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_loop_ticks_until_shutdown() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let ticks = Arc::new(AtomicUsize::new(0));

        let counter = ticks.clone();
        let handle = spawn_loop("test", Duration::from_millis(10), shutdown_rx, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(55)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 2, "ticks = {seen}");

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_loop_survives_panicking_tick() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let ticks = Arc::new(AtomicUsize::new(0));

        let counter = ticks.clone();
        let handle = spawn_loop("flaky", Duration::from_millis(10), shutdown_rx, move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first tick fails");
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!handle.is_finished());
        assert!(ticks.load(Ordering::SeqCst) >= 2);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_loop_stops_when_sender_dropped() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let handle = spawn_loop("orphan", Duration::from_secs(3600), shutdown_rx, || async {});

        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
