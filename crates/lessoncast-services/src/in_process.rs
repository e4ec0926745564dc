//! The client contract served straight from a [`LessonVideoService`], for
//! embedding the pipeline without an HTTP hop.

use async_trait::async_trait;
use lessoncast_core::{
    ApiOperation, AppError, ErrorMetadata, FinalizeUploadRequest, LessonId, LessonVideoApi,
    StreamingReference, StreamingUrlProvider, UploadTicket, VideoAsset, VideoError,
};
use std::sync::Arc;

use crate::caller::Caller;
use crate::service::LessonVideoService;

#[derive(Clone)]
pub struct InProcessVideoApi {
    service: Arc<LessonVideoService>,
    caller: Caller,
}

impl InProcessVideoApi {
    pub fn new(service: Arc<LessonVideoService>, caller: Caller) -> Self {
        Self { service, caller }
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }
}

fn to_video_error(operation: ApiOperation, err: AppError) -> VideoError {
    VideoError::from_api_failure(
        operation,
        err.http_status_code(),
        err.error_code(),
        err.client_message(),
    )
}

#[async_trait]
impl LessonVideoApi for InProcessVideoApi {
    async fn request_upload_ticket(&self, lesson_id: LessonId) -> Result<UploadTicket, VideoError> {
        self.service
            .issue_upload_ticket(&self.caller, lesson_id)
            .await
            .map_err(|e| to_video_error(ApiOperation::RequestTicket, e))
    }

    async fn finalize_upload(
        &self,
        lesson_id: LessonId,
        request: &FinalizeUploadRequest,
    ) -> Result<VideoAsset, VideoError> {
        self.service
            .finalize_upload(&self.caller, lesson_id, request)
            .await
            .map_err(|e| to_video_error(ApiOperation::Finalize, e))
    }

    async fn video_status(&self, lesson_id: LessonId) -> Result<VideoAsset, VideoError> {
        self.service
            .video_status(lesson_id)
            .await
            .map_err(|e| to_video_error(ApiOperation::Status, e))
    }

    async fn delete_video(&self, lesson_id: LessonId) -> Result<VideoAsset, VideoError> {
        self.service
            .delete_video(&self.caller, lesson_id)
            .await
            .map_err(|e| to_video_error(ApiOperation::Delete, e))
    }
}

#[async_trait]
impl StreamingUrlProvider for InProcessVideoApi {
    async fn streaming_reference(
        &self,
        lesson_id: LessonId,
    ) -> Result<StreamingReference, VideoError> {
        self.service
            .streaming_reference(lesson_id)
            .await
            .map_err(|e| to_video_error(ApiOperation::StreamingReference, e))
    }
}
