//! OpenAPI documentation, served at `/api/openapi.json` and browsable under `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use lessoncast_core::models;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lessoncast API",
        version = "0.1.0",
        description = "Lesson video delivery: presigned uploads, processing status and time-limited HLS streaming references. All endpoints are versioned under /api/v1/."
    ),
    paths(
        handlers::health::health_check,
        handlers::lesson_video::request_upload_url,
        handlers::lesson_video::complete_upload,
        handlers::lesson_video::get_video,
        handlers::lesson_video::get_stream_url,
        handlers::lesson_video::delete_video,
    ),
    components(
        schemas(
            models::UploadTicket,
            models::FinalizeUploadRequest,
            models::VideoAsset,
            models::VideoStatus,
            models::StreamUrlResponse,
            models::StreamingReference,
            models::LessonInfo,
            models::LessonKind,
            handlers::health::HealthResponse,
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "lesson-video", description = "Upload, status, streaming and removal of a lesson's video"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
