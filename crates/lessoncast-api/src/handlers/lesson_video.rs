//! Lesson video endpoints: upload ticket, finalize, status, streaming reference, delete.

use crate::auth::models::CallerContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use lessoncast_core::{
    FinalizeUploadRequest, LessonId, StreamUrlResponse, UploadTicket, VideoAsset,
};
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/v1/lessons/{lesson_id}/video/upload-url",
    tag = "lesson-video",
    params(
        ("lesson_id" = i64, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Presigned upload ticket", body = UploadTicket),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller does not manage this lesson", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
        (status = 409, description = "Lesson cannot take an upload right now", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn request_upload_url(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(lesson_id): Path<LessonId>,
) -> Result<impl IntoResponse, HttpAppError> {
    let ticket = state
        .video
        .issue_upload_ticket(&caller.caller(), lesson_id)
        .await?;
    Ok(Json(ticket))
}

#[utoipa::path(
    post,
    path = "/api/v1/lessons/{lesson_id}/video/upload-complete",
    tag = "lesson-video",
    params(
        ("lesson_id" = i64, Path, description = "Lesson ID")
    ),
    request_body = FinalizeUploadRequest,
    responses(
        (status = 200, description = "Upload recorded, processing queued", body = VideoAsset),
        (status = 400, description = "Object key does not match the latest ticket, or the object was never uploaded", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
        (status = 413, description = "Uploaded object exceeds the size limit", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, caller, request), fields(user_id = %caller.user_id))]
pub async fn complete_upload(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(lesson_id): Path<LessonId>,
    ValidatedJson(request): ValidatedJson<FinalizeUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let asset = state
        .video
        .finalize_upload(&caller.caller(), lesson_id, &request)
        .await?;
    Ok(Json(asset))
}

#[utoipa::path(
    get,
    path = "/api/v1/lessons/{lesson_id}/video",
    tag = "lesson-video",
    params(
        ("lesson_id" = i64, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Current video asset", body = VideoAsset),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, _caller))]
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    _caller: CallerContext,
    Path(lesson_id): Path<LessonId>,
) -> Result<impl IntoResponse, HttpAppError> {
    let asset = state.video.video_status(lesson_id).await?;
    Ok(Json(asset))
}

#[utoipa::path(
    get,
    path = "/api/v1/lessons/{lesson_id}/video/stream-url",
    tag = "lesson-video",
    params(
        ("lesson_id" = i64, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Streaming reference: presigned URL or embedded HLS manifest", body = StreamUrlResponse),
        (status = 409, description = "Video is not READY", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, _caller))]
pub async fn get_stream_url(
    State(state): State<Arc<AppState>>,
    _caller: CallerContext,
    Path(lesson_id): Path<LessonId>,
) -> Result<impl IntoResponse, HttpAppError> {
    let stream_url = state.video.streaming_reference(lesson_id).await?;
    Ok(Json(StreamUrlResponse { stream_url }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/lessons/{lesson_id}/video",
    tag = "lesson-video",
    params(
        ("lesson_id" = i64, Path, description = "Lesson ID")
    ),
    responses(
        (status = 200, description = "Video removed; status is NONE", body = VideoAsset),
        (status = 403, description = "Caller does not manage this lesson", body = ErrorResponse),
        (status = 404, description = "Lesson has no video", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn delete_video(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    Path(lesson_id): Path<LessonId>,
) -> Result<impl IntoResponse, HttpAppError> {
    let asset = state.video.delete_video(&caller.caller(), lesson_id).await?;
    Ok(Json(asset))
}
