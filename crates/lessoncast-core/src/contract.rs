//! Client-facing contracts of the video pipeline.
//!
//! The upload coordinator, status poller and playback session depend only on
//! these traits. `lessoncast-api-client` implements them over HTTP; the
//! services crate implements them in-process.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::VideoError;
use crate::models::{
    FinalizeUploadRequest, LessonId, StreamingReference, UploadFile, UploadTicket, VideoAsset,
};

/// Byte-level progress callback: `(bytes_sent, total_bytes)`.
pub type ProgressSink = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Upload ticket, finalize, status and delete operations for a lesson video.
#[async_trait]
pub trait LessonVideoApi: Send + Sync {
    /// Fails with [`VideoError::Ticket`] when the caller does not own the
    /// lesson or the lesson cannot take a video right now.
    async fn request_upload_ticket(&self, lesson_id: LessonId) -> Result<UploadTicket, VideoError>;

    /// Fails with [`VideoError::Validation`] when the object key is not the
    /// one from the latest ticket.
    async fn finalize_upload(
        &self,
        lesson_id: LessonId,
        request: &FinalizeUploadRequest,
    ) -> Result<VideoAsset, VideoError>;

    /// Pull-only: there is no push channel for status changes.
    async fn video_status(&self, lesson_id: LessonId) -> Result<VideoAsset, VideoError>;

    async fn delete_video(&self, lesson_id: LessonId) -> Result<VideoAsset, VideoError>;
}

/// Issues time-limited streaming references for READY assets.
#[async_trait]
pub trait StreamingUrlProvider: Send + Sync {
    /// Fails with [`VideoError::StreamingUnavailable`] unless the asset is READY.
    async fn streaming_reference(
        &self,
        lesson_id: LessonId,
    ) -> Result<StreamingReference, VideoError>;
}

/// Moves the raw file to the ticket's upload URL.
#[async_trait]
pub trait ObjectTransport: Send + Sync {
    /// Sends `file` with its declared content type. Only a 2xx answer is
    /// success; anything else is [`VideoError::Transport`].
    async fn put_object(
        &self,
        ticket: &UploadTicket,
        file: &UploadFile,
        progress: ProgressSink,
    ) -> Result<(), VideoError>;
}

#[async_trait]
impl<T: LessonVideoApi + ?Sized> LessonVideoApi for Arc<T> {
    async fn request_upload_ticket(&self, lesson_id: LessonId) -> Result<UploadTicket, VideoError> {
        (**self).request_upload_ticket(lesson_id).await
    }

    async fn finalize_upload(
        &self,
        lesson_id: LessonId,
        request: &FinalizeUploadRequest,
    ) -> Result<VideoAsset, VideoError> {
        (**self).finalize_upload(lesson_id, request).await
    }

    async fn video_status(&self, lesson_id: LessonId) -> Result<VideoAsset, VideoError> {
        (**self).video_status(lesson_id).await
    }

    async fn delete_video(&self, lesson_id: LessonId) -> Result<VideoAsset, VideoError> {
        (**self).delete_video(lesson_id).await
    }
}

#[async_trait]
impl<T: StreamingUrlProvider + ?Sized> StreamingUrlProvider for Arc<T> {
    async fn streaming_reference(
        &self,
        lesson_id: LessonId,
    ) -> Result<StreamingReference, VideoError> {
        (**self).streaming_reference(lesson_id).await
    }
}

#[async_trait]
impl<T: ObjectTransport + ?Sized> ObjectTransport for Arc<T> {
    async fn put_object(
        &self,
        ticket: &UploadTicket,
        file: &UploadFile,
        progress: ProgressSink,
    ) -> Result<(), VideoError> {
        (**self).put_object(ticket, file, progress).await
    }
}
