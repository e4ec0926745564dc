//! Periodic renewal of the streaming reference while a lesson is being viewed.

use lessoncast_core::{LessonId, StreamingReference, StreamingUrlProvider, VideoError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// References are valid for about an hour.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(50 * 60);

#[derive(Debug, Clone)]
pub struct RefreshOptions {
    pub period: Duration,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            period: DEFAULT_REFRESH_PERIOD,
        }
    }
}

pub type RefreshOutcome = Result<StreamingReference, VideoError>;

/// A background timer that fetches a new reference every period and sends it
/// to its owner. It never touches the player itself.
///
/// Stopped by [`RefreshScheduler::stop`] or by dropping it; no fetch starts
/// after either.
pub struct RefreshScheduler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    pub fn start(
        provider: Arc<dyn StreamingUrlProvider>,
        lesson_id: LessonId,
        options: RefreshOptions,
    ) -> (Self, mpsc::Receiver<RefreshOutcome>) {
        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = options.period;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tracing::info!(lesson_id, "Refreshing streaming reference");
                let outcome = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    outcome = provider.streaming_reference(lesson_id) => outcome,
                };
                if let Err(e) = &outcome {
                    tracing::warn!(lesson_id, error = %e, "Streaming reference refresh failed");
                }
                if tx.send(outcome).await.is_err() {
                    break;
                }
            }
            tracing::debug!(lesson_id, "Refresh timer stopped");
        });

        (Self { cancel, handle }, rx)
    }

    /// Same as dropping the scheduler.
    pub fn stop(self) {}
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}
