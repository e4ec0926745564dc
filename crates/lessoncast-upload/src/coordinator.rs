//! The upload flow: ticket, direct transfer, local duration probe, finalize.

use crate::options::UploadOptions;
use crate::probe::{DurationProbe, ProbeError};
use crate::progress::displayed_percent;
use lessoncast_core::{
    FinalizeUploadRequest, LessonId, LessonVideoApi, ObjectTransport, ProgressSink,
    UploadConstraints, UploadFile, UploadSession, UploadState, UploadTicket, VideoAsset,
    VideoError,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Drives one lesson's upload and publishes its [`UploadSession`] on a watch channel.
///
/// Progress is monotonic within an attempt and stops short of 100 until the
/// server acknowledges finalize. Cancelling abandons the in-flight transfer and
/// returns the session to idle; a retry always starts over from the ticket.
pub struct UploadCoordinator {
    api: Arc<dyn LessonVideoApi>,
    transport: Arc<dyn ObjectTransport>,
    probe: Arc<dyn DurationProbe>,
    options: UploadOptions,
    session: Arc<watch::Sender<UploadSession>>,
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T, VideoError>>,
) -> Result<T, VideoError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(VideoError::Cancelled),
        result = work => result,
    }
}

impl UploadCoordinator {
    pub fn new(
        api: Arc<dyn LessonVideoApi>,
        transport: Arc<dyn ObjectTransport>,
        probe: Arc<dyn DurationProbe>,
        options: UploadOptions,
    ) -> Self {
        let (session, _) = watch::channel(UploadSession::new());
        Self {
            api,
            transport,
            probe,
            options,
            session: Arc::new(session),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadSession> {
        self.session.subscribe()
    }

    pub fn session(&self) -> UploadSession {
        self.session.borrow().clone()
    }

    pub fn reset(&self) {
        self.session.send_modify(UploadSession::reset);
    }

    /// Runs the whole flow for `file`. Finalize is only sent after the transfer succeeded.
    #[tracing::instrument(skip(self, file, cancel), fields(file = %file.file_name, size_bytes = file.size))]
    pub async fn upload(
        &self,
        lesson_id: LessonId,
        file: &UploadFile,
        cancel: CancellationToken,
    ) -> Result<VideoAsset, VideoError> {
        let result = self.run(lesson_id, file, &cancel).await;
        match &result {
            Ok(asset) => {
                self.session.send_modify(UploadSession::succeed);
                tracing::info!(status = %asset.status, "Upload finalized");
            }
            Err(VideoError::Cancelled) => {
                self.reset();
                tracing::info!("Upload cancelled");
            }
            Err(e) => {
                let message = e.to_string();
                self.session.send_modify(|s| s.fail(message));
                tracing::warn!(error = %e, "Upload failed");
            }
        }
        result
    }

    async fn run(
        &self,
        lesson_id: LessonId,
        file: &UploadFile,
        cancel: &CancellationToken,
    ) -> Result<VideoAsset, VideoError> {
        UploadConstraints::new(self.options.max_size_bytes)
            .validate(file)
            .map_err(|e| VideoError::Validation(e.to_string()))?;

        self.session.send_modify(UploadSession::begin);
        let ticket = cancellable(cancel, self.request_upload_ticket(lesson_id)).await?;

        self.session
            .send_modify(|s| s.set_state(UploadState::Uploading));
        let probe = async {
            self.probe_duration(file).await.map_err(|e| {
                VideoError::Validation(format!("Could not read the video duration: {}", e))
            })
        };
        let (_, duration_seconds) = cancellable(cancel, async {
            tokio::try_join!(self.upload_binary(&ticket, file), probe)
        })
        .await?;

        if cancel.is_cancelled() {
            return Err(VideoError::Cancelled);
        }

        self.session
            .send_modify(|s| s.set_state(UploadState::Processing));
        self.finalize_upload(
            lesson_id,
            &FinalizeUploadRequest {
                object_key: ticket.object_key,
                duration_seconds,
            },
        )
        .await
    }

    pub async fn request_upload_ticket(
        &self,
        lesson_id: LessonId,
    ) -> Result<UploadTicket, VideoError> {
        self.api.request_upload_ticket(lesson_id).await
    }

    /// Transfers the raw file; session progress follows the bytes sent.
    pub async fn upload_binary(
        &self,
        ticket: &UploadTicket,
        file: &UploadFile,
    ) -> Result<(), VideoError> {
        let session = self.session.clone();
        let reserve = self.options.reserve_percent();
        let progress: ProgressSink = Arc::new(move |sent, total| {
            let percent = displayed_percent(sent, total, reserve);
            session.send_if_modified(|s| {
                let before = s.progress();
                s.advance(percent) != before
            });
        });
        self.transport.put_object(ticket, file, progress).await
    }

    pub async fn probe_duration(&self, file: &UploadFile) -> Result<u32, ProbeError> {
        self.probe.probe(&file.path).await
    }

    pub async fn finalize_upload(
        &self,
        lesson_id: LessonId,
        request: &FinalizeUploadRequest,
    ) -> Result<VideoAsset, VideoError> {
        self.api.finalize_upload(lesson_id, request).await
    }
}
