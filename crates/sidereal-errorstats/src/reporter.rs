//! Periodic log-and-clear of error counters.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::ErrorStats;

/// Handle for controlling a background report task.
pub struct ReportHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join_handle: JoinHandle<()>,
}

impl ReportHandle {
    /// Signal the background task to stop and wait for it to complete.
    ///
    /// This will emit one final report before shutting down.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.join_handle.await;
    }

    /// Abort the background task immediately without a final report.
    pub fn abort(self) {
        self.join_handle.abort();
    }
}

/// Start a background task that reports and resets `stats` every `interval`.
///
/// Each non-empty report is emitted as a `WARN` event. The first report
/// happens one interval after start.
///
/// Must be called from within a tokio runtime.
pub fn start_periodic_report(stats: Arc<ErrorStats>, interval: Duration) -> ReportHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let join_handle = tokio::spawn(async move {
        tracing::info!(
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "Starting periodic error report task"
        );

        let mut interval_timer =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    emit(&stats);
                }
                _ = &mut shutdown_rx => {
                    tracing::info!("Shutdown signal received, emitting final error report");
                    emit(&stats);
                    break;
                }
            }
        }

        tracing::info!("Periodic error report task stopped");
    });

    ReportHandle {
        shutdown_tx: Some(shutdown_tx),
        join_handle,
    }
}

fn emit(stats: &ErrorStats) {
    if let Err(report) = stats.err_and_reset() {
        tracing::warn!(
            total = report.total,
            distinct = report.distinct,
            counts = %report.counts,
            "Errors logged since last report"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;
    use crate::Visitor;

    #[derive(Debug)]
    struct Dropped;

    impl fmt::Display for Dropped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("dropped")
        }
    }

    impl std::error::Error for Dropped {}

    fn stats() -> Arc<ErrorStats> {
        let stats = ErrorStats::new();
        stats.set_encoder(|_: &Dropped, _: &Visitor<'_>| "dropped".to_owned());
        Arc::new(stats)
    }

    #[tokio::test]
    async fn shutdown_emits_final_report() {
        let stats = stats();
        let handle = start_periodic_report(stats.clone(), Duration::from_secs(3600));

        stats.log(&Dropped);
        stats.log(&Dropped);
        assert_eq!(stats.total(), 2);

        handle.shutdown().await;
        assert!(stats.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tick_resets_counters() {
        let stats = stats();
        let handle = start_periodic_report(stats.clone(), Duration::from_secs(60));

        stats.log(&Dropped);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(stats.total(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(stats.is_empty());

        stats.log(&Dropped);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(stats.is_empty());

        handle.abort();
    }

    #[tokio::test]
    async fn abort_skips_final_report() {
        let stats = stats();
        let handle = start_periodic_report(stats.clone(), Duration::from_secs(3600));

        stats.log(&Dropped);
        handle.abort();
        tokio::task::yield_now().await;

        assert_eq!(stats.total(), 1);
    }
}
