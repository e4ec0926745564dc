//! Lesson video contract over HTTP.

use crate::ApiClient;
use async_trait::async_trait;
use lessoncast_core::{
    ApiOperation, FinalizeUploadRequest, LessonId, LessonVideoApi, StreamUrlResponse,
    StreamingReference, StreamingUrlProvider, UploadTicket, VideoAsset, VideoError,
};

#[async_trait]
impl LessonVideoApi for ApiClient {
    async fn request_upload_ticket(&self, lesson_id: LessonId) -> Result<UploadTicket, VideoError> {
        let request = self.client().get(self.lesson_video_url(lesson_id, "/upload-url"));
        let ticket: UploadTicket = self
            .send_json(ApiOperation::RequestTicket, request)
            .await?;
        tracing::debug!(lesson_id, object_key = %ticket.object_key, "Upload ticket received");
        Ok(ticket)
    }

    async fn finalize_upload(
        &self,
        lesson_id: LessonId,
        request: &FinalizeUploadRequest,
    ) -> Result<VideoAsset, VideoError> {
        let builder = self
            .client()
            .post(self.lesson_video_url(lesson_id, "/upload-complete"))
            .json(request);
        self.send_json(ApiOperation::Finalize, builder).await
    }

    async fn video_status(&self, lesson_id: LessonId) -> Result<VideoAsset, VideoError> {
        let request = self.client().get(self.lesson_video_url(lesson_id, ""));
        self.send_json(ApiOperation::Status, request).await
    }

    async fn delete_video(&self, lesson_id: LessonId) -> Result<VideoAsset, VideoError> {
        let request = self.client().delete(self.lesson_video_url(lesson_id, ""));
        self.send_json(ApiOperation::Delete, request).await
    }
}

#[async_trait]
impl StreamingUrlProvider for ApiClient {
    async fn streaming_reference(
        &self,
        lesson_id: LessonId,
    ) -> Result<StreamingReference, VideoError> {
        let request = self.client().get(self.lesson_video_url(lesson_id, "/stream-url"));
        let body: StreamUrlResponse = self
            .send_json(ApiOperation::StreamingReference, request)
            .await?;
        if body.stream_url.is_empty() {
            return Err(VideoError::StreamingUnavailable(
                "Server returned an empty streaming reference".to_string(),
            ));
        }
        Ok(body.stream_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessoncast_core::VideoStatus;
    use mockito::Matcher;

    const TOKEN: &str = "test-token";

    fn error_body(code: &str, error: &str) -> String {
        serde_json::json!({ "error": error, "code": code, "recoverable": false }).to_string()
    }

    #[tokio::test]
    async fn test_request_upload_ticket() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/lessons/7/video/upload-url")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"uploadUrl":"https://s3/put?sig=1","objectKey":"lessons/7/a.mp4","expiresInSeconds":900}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), TOKEN).unwrap();
        let ticket = client.request_upload_ticket(7).await.unwrap();

        assert_eq!(ticket.object_key, "lessons/7/a.mp4");
        assert_eq!(ticket.expires_in_seconds, 900);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_any_ticket_failure_is_ticket_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/lessons/7/video/upload-url")
            .with_status(403)
            .with_body(error_body("FORBIDDEN", "Not your lesson"))
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), TOKEN).unwrap();
        let err = client.request_upload_ticket(7).await.unwrap_err();
        assert_eq!(err, VideoError::Ticket("Not your lesson".to_string()));
    }

    #[tokio::test]
    async fn test_finalize_sends_camel_case_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/lessons/7/video/upload-complete")
            .match_body(Matcher::Json(serde_json::json!({
                "objectKey": "lessons/7/a.mp4",
                "durationSeconds": 125
            })))
            .with_status(200)
            .with_body(
                r#"{"lessonId":7,"objectKey":"lessons/7/a.mp4","status":"UPLOADED","durationSeconds":125,"updatedAt":"2026-01-01T00:00:00Z"}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), TOKEN).unwrap();
        let asset = client
            .finalize_upload(
                7,
                &FinalizeUploadRequest {
                    object_key: "lessons/7/a.mp4".to_string(),
                    duration_seconds: 125,
                },
            )
            .await
            .unwrap();

        assert_eq!(asset.status, VideoStatus::Uploaded);
        assert_eq!(asset.duration_seconds, Some(125));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_finalize_validation_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/lessons/7/video/upload-complete")
            .with_status(400)
            .with_body(error_body("VALIDATION_ERROR", "Object key does not match"))
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), TOKEN).unwrap();
        let err = client
            .finalize_upload(
                7,
                &FinalizeUploadRequest {
                    object_key: "lessons/7/b.mp4".to_string(),
                    duration_seconds: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::Validation(_)));
        assert!(err.restarts_upload());
    }

    #[tokio::test]
    async fn test_stream_url_not_ready() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/lessons/7/video/stream-url")
            .with_status(409)
            .with_body(error_body("STREAMING_UNAVAILABLE", "Video status is PROCESSING"))
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), TOKEN).unwrap();
        let err = client.streaming_reference(7).await.unwrap_err();
        assert_eq!(
            err,
            VideoError::StreamingUnavailable("Video status is PROCESSING".to_string())
        );
    }

    #[tokio::test]
    async fn test_stream_url_embedded_manifest() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/lessons/7/video/stream-url")
            .with_status(200)
            .with_body(r#"{"streamUrl":"data:application/vnd.apple.mpegurl;base64,I0VYVE0zVQo="}"#)
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), TOKEN).unwrap();
        let reference = client.streaming_reference(7).await.unwrap();
        assert!(reference.is_embedded_manifest());
        assert!(reference.decode_manifest().unwrap().starts_with("#EXTM3U"));
    }

    #[tokio::test]
    async fn test_delete_not_found_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/api/v1/lessons/7/video")
            .with_status(404)
            .with_body(error_body("NOT_FOUND", "Lesson has no video"))
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), TOKEN).unwrap();
        let err = client.delete_video(7).await.unwrap_err();
        assert_eq!(
            err,
            VideoError::Api {
                status: 404,
                code: "NOT_FOUND".to_string(),
                message: "Lesson has no video".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/lessons/7/video")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), TOKEN).unwrap();
        let err = client.video_status(7).await.unwrap_err();
        assert!(matches!(err, VideoError::Api { status: 502, ref code, .. } if code == "UNKNOWN"));
        assert!(err.is_retryable());
    }
}
