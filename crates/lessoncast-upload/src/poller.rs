use crate::options::PollOptions;
use lessoncast_core::{LessonId, LessonVideoApi, VideoAsset, VideoError, VideoStatus};
use std::sync::Arc;

/// Polls the lesson's video status with capped exponential backoff until it
/// is terminal. READY resolves, FAILED and a vanished asset become
/// [`VideoError::ProcessingFailure`].
pub struct StatusPoller {
    api: Arc<dyn LessonVideoApi>,
    options: PollOptions,
}

impl StatusPoller {
    pub fn new(api: Arc<dyn LessonVideoApi>, options: PollOptions) -> Self {
        Self { api, options }
    }

    /// `on_status` sees every successful poll, including the terminal one.
    #[tracing::instrument(skip(self, on_status))]
    pub async fn wait_for_terminal<F>(
        &self,
        lesson_id: LessonId,
        mut on_status: F,
    ) -> Result<VideoAsset, VideoError>
    where
        F: FnMut(&VideoAsset) + Send,
    {
        let max_attempts = self.options.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.api.video_status(lesson_id).await {
                Ok(asset) => {
                    on_status(&asset);
                    match asset.status {
                        VideoStatus::Ready => return Ok(asset),
                        VideoStatus::Failed => {
                            return Err(VideoError::ProcessingFailure {
                                reason: asset
                                    .failure_reason
                                    .clone()
                                    .unwrap_or_else(|| "Unknown error".to_string()),
                            })
                        }
                        VideoStatus::None => {
                            return Err(VideoError::ProcessingFailure {
                                reason: "The video was removed".to_string(),
                            })
                        }
                        VideoStatus::Uploaded | VideoStatus::Processing => {
                            tracing::debug!(attempt, status = %asset.status, "Video not ready yet");
                        }
                    }
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(attempt, error = %e, "Status check failed, retrying");
                }
                Err(e) => return Err(e),
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.options.interval_after(attempt)).await;
            }
        }

        Err(VideoError::PollTimeout {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lessoncast_core::{FinalizeUploadRequest, UploadTicket};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Replays scripted status responses and records when each poll happened.
    struct ScriptedApi {
        responses: Mutex<VecDeque<Result<VideoStatus, VideoError>>>,
        polled_at: Mutex<Vec<Instant>>,
    }

    impl ScriptedApi {
        fn new(responses: Vec<Result<VideoStatus, VideoError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                polled_at: Mutex::new(Vec::new()),
            })
        }

        fn gaps(&self) -> Vec<u64> {
            let polled = self.polled_at.lock().unwrap();
            polled
                .windows(2)
                .map(|w| (w[1] - w[0]).as_secs())
                .collect()
        }
    }

    #[async_trait]
    impl LessonVideoApi for ScriptedApi {
        async fn request_upload_ticket(&self, _: LessonId) -> Result<UploadTicket, VideoError> {
            unreachable!()
        }

        async fn finalize_upload(
            &self,
            _: LessonId,
            _: &FinalizeUploadRequest,
        ) -> Result<VideoAsset, VideoError> {
            unreachable!()
        }

        async fn video_status(&self, lesson_id: LessonId) -> Result<VideoAsset, VideoError> {
            self.polled_at.lock().unwrap().push(Instant::now());
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(VideoStatus::Processing));
            next.map(|status| {
                let mut asset = VideoAsset::empty(lesson_id);
                asset.status = status;
                if status == VideoStatus::Failed {
                    asset.failure_reason = Some("Unsupported codec".to_string());
                }
                asset
            })
        }

        async fn delete_video(&self, _: LessonId) -> Result<VideoAsset, VideoError> {
            unreachable!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_until_ready() {
        let api = ScriptedApi::new(vec![
            Ok(VideoStatus::Uploaded),
            Ok(VideoStatus::Processing),
            Ok(VideoStatus::Processing),
            Ok(VideoStatus::Ready),
        ]);
        let poller = StatusPoller::new(api.clone(), PollOptions::default());

        let mut seen = Vec::new();
        let asset = poller
            .wait_for_terminal(3, |a| seen.push(a.status))
            .await
            .unwrap();

        assert_eq!(asset.status, VideoStatus::Ready);
        assert_eq!(seen.len(), 4);
        assert_eq!(api.gaps(), vec![2, 4, 8]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_carries_reason() {
        let api = ScriptedApi::new(vec![Ok(VideoStatus::Processing), Ok(VideoStatus::Failed)]);
        let poller = StatusPoller::new(api, PollOptions::default());

        let err = poller.wait_for_terminal(3, |_| {}).await.unwrap_err();
        assert_eq!(
            err,
            VideoError::ProcessingFailure {
                reason: "Unsupported codec".to_string()
            }
        );
        assert!(err.restarts_upload());
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_video_stops_polling() {
        let api = ScriptedApi::new(vec![Ok(VideoStatus::None)]);
        let poller = StatusPoller::new(api.clone(), PollOptions::default());

        let err = poller.wait_for_terminal(3, |_| {}).await.unwrap_err();
        assert!(matches!(err, VideoError::ProcessingFailure { .. }));
        assert_eq!(api.polled_at.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let api = ScriptedApi::new(vec![
            Err(VideoError::Api {
                status: 503,
                code: "SERVICE_UNAVAILABLE".into(),
                message: "busy".into(),
            }),
            Ok(VideoStatus::Ready),
        ]);
        let poller = StatusPoller::new(api, PollOptions::default());
        assert!(poller.wait_for_terminal(3, |_| {}).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_stop_immediately() {
        let api = ScriptedApi::new(vec![Err(VideoError::Api {
            status: 403,
            code: "FORBIDDEN".into(),
            message: "no".into(),
        })]);
        let poller = StatusPoller::new(api.clone(), PollOptions::default());
        let err = poller.wait_for_terminal(3, |_| {}).await.unwrap_err();
        assert!(matches!(err, VideoError::Api { status: 403, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let api = ScriptedApi::new(Vec::new());
        let options = PollOptions {
            max_attempts: 5,
            ..PollOptions::default()
        };
        let poller = StatusPoller::new(api.clone(), options);

        let started = Instant::now();
        let err = poller.wait_for_terminal(3, |_| {}).await.unwrap_err();
        assert_eq!(err, VideoError::PollTimeout { attempts: 5 });
        assert_eq!(api.polled_at.lock().unwrap().len(), 5);
        assert_eq!(started.elapsed(), Duration::from_secs(2 + 4 + 8 + 16));
    }
}
