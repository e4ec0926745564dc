//! Server side of the lesson video contract.

use lessoncast_core::{
    hls, AppError, Config, FinalizeUploadRequest, LessonId, LessonInfo, StreamingReference,
    UploadTicket, VideoAsset, VideoStatus,
};
use lessoncast_storage::{keys, Storage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use crate::caller::Caller;
use crate::directory::LessonDirectory;
use crate::processing::{ProcessingJob, ProcessingQueue};
use crate::repository::VideoAssetRepository;
use crate::tickets::TicketRegistry;

#[derive(Debug, Clone)]
pub struct VideoServiceSettings {
    pub upload_ticket_ttl: Duration,
    pub stream_url_ttl: Duration,
    pub max_video_size_bytes: u64,
}

impl Default for VideoServiceSettings {
    fn default() -> Self {
        Self {
            upload_ticket_ttl: Duration::from_secs(900),
            stream_url_ttl: Duration::from_secs(3600),
            max_video_size_bytes: lessoncast_core::validation::MAX_VIDEO_SIZE_BYTES,
        }
    }
}

impl From<&Config> for VideoServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            upload_ticket_ttl: Duration::from_secs(config.upload_ticket_ttl_secs),
            stream_url_ttl: Duration::from_secs(config.stream_url_ttl_secs),
            max_video_size_bytes: config.max_video_size_bytes,
        }
    }
}

pub struct LessonVideoService {
    lessons: Arc<dyn LessonDirectory>,
    assets: Arc<dyn VideoAssetRepository>,
    storage: Arc<dyn Storage>,
    tickets: TicketRegistry,
    queue: Option<ProcessingQueue>,
    settings: VideoServiceSettings,
}

impl LessonVideoService {
    /// Without a queue, finalized uploads stay UPLOADED until something else moves them.
    pub fn new(
        lessons: Arc<dyn LessonDirectory>,
        assets: Arc<dyn VideoAssetRepository>,
        storage: Arc<dyn Storage>,
        queue: Option<ProcessingQueue>,
        settings: VideoServiceSettings,
    ) -> Self {
        Self {
            lessons,
            assets,
            storage,
            tickets: TicketRegistry::new(),
            queue,
            settings,
        }
    }

    pub fn settings(&self) -> &VideoServiceSettings {
        &self.settings
    }

    pub fn queue(&self) -> Option<&ProcessingQueue> {
        self.queue.as_ref()
    }

    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn issue_upload_ticket(
        &self,
        caller: &Caller,
        lesson_id: LessonId,
    ) -> Result<UploadTicket, AppError> {
        let lesson = self.managed_lesson(caller, lesson_id).await?;
        if !lesson.is_video_lesson() {
            return Err(AppError::NotUploadable(
                "Only video lessons accept uploads".to_string(),
            ));
        }
        if let Some(asset) = self.assets.get(lesson_id).await? {
            if asset.status == VideoStatus::Processing {
                return Err(AppError::NotUploadable(
                    "The current video is still processing".to_string(),
                ));
            }
        }

        let object_key = keys::upload_key(lesson_id);
        let ttl = self.settings.upload_ticket_ttl;
        let upload_url = self
            .storage
            .presigned_put_url(&object_key, ttl)
            .await?;
        let ttl_chrono = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::Internal(format!("Invalid ticket TTL: {}", e)))?;
        self.tickets.issue(lesson_id, &object_key, ttl_chrono);

        tracing::info!(object_key = %object_key, expires_in_secs = ttl.as_secs(), "Upload ticket issued");

        Ok(UploadTicket {
            upload_url,
            object_key,
            expires_in_seconds: ttl.as_secs(),
        })
    }

    #[tracing::instrument(skip(self, caller, request), fields(user_id = %caller.user_id, object_key = %request.object_key))]
    pub async fn finalize_upload(
        &self,
        caller: &Caller,
        lesson_id: LessonId,
        request: &FinalizeUploadRequest,
    ) -> Result<VideoAsset, AppError> {
        request.validate()?;
        self.managed_lesson(caller, lesson_id).await?;

        let object_key = request.object_key.as_str();
        self.tickets
            .check(lesson_id, object_key)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;

        if !self.storage.exists(object_key).await? {
            return Err(AppError::UploadNotFound(format!(
                "No object was uploaded at {}",
                object_key
            )));
        }
        let size = self.storage.content_length(object_key).await?;
        if size > self.settings.max_video_size_bytes {
            self.tickets.consume(lesson_id, object_key);
            self.delete_objects(object_key).await;
            return Err(AppError::PayloadTooLarge(format!(
                "Video is {} bytes; the limit is {} bytes",
                size, self.settings.max_video_size_bytes
            )));
        }

        if !self.tickets.consume(lesson_id, object_key) {
            return Err(AppError::InvalidInput(
                "objectKey does not match the latest upload ticket".to_string(),
            ));
        }

        if let Some(previous) = self.assets.get(lesson_id).await? {
            if let Some(previous_key) = previous.object_key.as_deref() {
                if previous_key != object_key {
                    self.delete_objects(previous_key).await;
                }
            }
        }

        let asset = VideoAsset::uploaded(lesson_id, object_key.to_string(), request.duration_seconds);
        self.assets.save(asset.clone()).await?;

        tracing::info!(
            size_bytes = size,
            duration_seconds = request.duration_seconds,
            "Upload finalized"
        );

        match &self.queue {
            Some(queue) => {
                queue
                    .enqueue(ProcessingJob {
                        lesson_id,
                        object_key: object_key.to_string(),
                    })
                    .await?
            }
            None => tracing::warn!("No processing queue configured; asset stays UPLOADED"),
        }

        Ok(asset)
    }

    /// Any authenticated caller may read a lesson's video status.
    #[tracing::instrument(skip(self))]
    pub async fn video_status(&self, lesson_id: LessonId) -> Result<VideoAsset, AppError> {
        self.lesson(lesson_id).await?;
        Ok(self
            .assets
            .get(lesson_id)
            .await?
            .unwrap_or_else(|| VideoAsset::empty(lesson_id)))
    }

    /// An embedded HLS playlist whose every URI is a presigned GET, or a
    /// presigned URL of the raw file when no rendition exists.
    #[tracing::instrument(skip(self))]
    pub async fn streaming_reference(
        &self,
        lesson_id: LessonId,
    ) -> Result<StreamingReference, AppError> {
        self.lesson(lesson_id).await?;
        let asset = self
            .assets
            .get(lesson_id)
            .await?
            .unwrap_or_else(|| VideoAsset::empty(lesson_id));

        let object_key = match (&asset.object_key, asset.status) {
            (Some(key), VideoStatus::Ready) => key.as_str(),
            (_, status) => {
                return Err(AppError::StreamingUnavailable(format!(
                    "Video status is {}",
                    status
                )))
            }
        };

        let ttl = self.settings.stream_url_ttl;
        let reference = match asset.manifest_key.as_deref() {
            Some(manifest_key) => {
                let manifest = self.signed_manifest(manifest_key, ttl).await?;
                StreamingReference::from_manifest(&manifest)
            }
            None => StreamingReference::from_url(
                self.storage.presigned_get_url(object_key, ttl).await?,
            ),
        };

        tracing::info!(
            embedded = reference.is_embedded_manifest(),
            expires_in_secs = ttl.as_secs(),
            "Streaming reference issued"
        );
        Ok(reference)
    }

    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn delete_video(
        &self,
        caller: &Caller,
        lesson_id: LessonId,
    ) -> Result<VideoAsset, AppError> {
        self.managed_lesson(caller, lesson_id).await?;
        let asset = self
            .assets
            .get(lesson_id)
            .await?
            .filter(|a| a.status != VideoStatus::None)
            .ok_or_else(|| AppError::NotFound("Lesson has no video".to_string()))?;

        if let Some(object_key) = asset.object_key.as_deref() {
            self.storage.delete(object_key).await?;
            self.storage
                .delete_prefix(&keys::hls_prefix(object_key))
                .await?;
        }
        self.tickets.invalidate(lesson_id);
        self.assets.remove(lesson_id).await?;

        tracing::info!(previous_status = %asset.status, "Video deleted");
        Ok(VideoAsset::empty(lesson_id))
    }

    async fn lesson(&self, lesson_id: LessonId) -> Result<LessonInfo, AppError> {
        self.lessons
            .find(lesson_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lesson {} not found", lesson_id)))
    }

    async fn managed_lesson(
        &self,
        caller: &Caller,
        lesson_id: LessonId,
    ) -> Result<LessonInfo, AppError> {
        let lesson = self.lesson(lesson_id).await?;
        if !caller.can_manage(&lesson) {
            return Err(AppError::Forbidden(
                "Only the lesson owner can manage its video".to_string(),
            ));
        }
        Ok(lesson)
    }

    /// Best-effort removal of a raw upload and its rendition.
    async fn delete_objects(&self, object_key: &str) {
        if let Err(e) = self.storage.delete(object_key).await {
            tracing::warn!(error = %e, object_key = %object_key, "Failed to delete raw upload");
        }
        let prefix = keys::hls_prefix(object_key);
        if let Err(e) = self.storage.delete_prefix(&prefix).await {
            tracing::warn!(error = %e, prefix = %prefix, "Failed to delete rendition");
        }
    }

    async fn signed_manifest(&self, manifest_key: &str, ttl: Duration) -> Result<String, AppError> {
        let mut playlist_key = manifest_key.to_string();
        let mut text = self.read_playlist(&playlist_key).await?;

        // Players get a single media playlist: the best variant of a master.
        if hls::is_master_playlist(&text) {
            let variant = hls::select_variant(&text)?;
            if hls::is_absolute_url(&variant.uri) {
                return Err(AppError::InvalidManifest(
                    "Variant playlists must be stored alongside the master".to_string(),
                ));
            }
            playlist_key = hls::resolve_key(&playlist_key, &variant.uri);
            text = self.read_playlist(&playlist_key).await?;
            tracing::debug!(
                variant = %playlist_key,
                bandwidth = variant.bandwidth,
                "Selected variant playlist"
            );
        }

        let mut signed = HashMap::new();
        for uri in hls::referenced_uris(&text) {
            if hls::is_absolute_url(&uri) || signed.contains_key(&uri) {
                continue;
            }
            let key = hls::resolve_key(&playlist_key, &uri);
            let url = self.storage.presigned_get_url(&key, ttl).await?;
            signed.insert(uri, url);
        }

        hls::rewrite_uris(&text, |uri| {
            Ok::<_, AppError>(signed.get(uri).cloned().unwrap_or_else(|| uri.to_string()))
        })
    }

    async fn read_playlist(&self, key: &str) -> Result<String, AppError> {
        let bytes = self.storage.download(key).await.map_err(|e| {
            tracing::error!(error = %e, key = %key, "Failed to read playlist");
            AppError::InvalidManifest(format!("Playlist {} is unreadable", key))
        })?;
        let text = String::from_utf8(bytes)
            .map_err(|_| AppError::InvalidManifest(format!("Playlist {} is not UTF-8", key)))?;
        hls::validate_manifest(&text)?;
        Ok(text)
    }
}
