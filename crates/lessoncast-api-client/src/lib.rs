//! HTTP client for the lesson video API.
//!
//! [`ApiClient`] implements the client contracts of `lessoncast-core`
//! ([`LessonVideoApi`], [`StreamingUrlProvider`]) over the versioned REST
//! routes with Bearer auth; [`HttpObjectTransport`] performs the raw PUT to a
//! ticket's presigned URL. The upload, player and CLI crates use these directly.

pub mod api;
pub mod transport;

use anyhow::{Context, Result};
use lessoncast_core::{ApiOperation, LessonId, VideoError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

pub use transport::HttpObjectTransport;

/// API version prefix. The server mounts every lesson route under it.
pub const API_PREFIX: &str = "/api/v1";

const DEFAULT_BASE_URL: &str = "http://localhost:4000";

/// Error body rendered by the server for any non-2xx answer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    error: String,
    code: String,
}

/// HTTP client for the lesson video API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Create client from environment: LESSONCAST_API_URL (or API_URL), LESSONCAST_TOKEN (or API_TOKEN).
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("LESSONCAST_API_URL")
            .or_else(|_| std::env::var("API_URL"))
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let token = std::env::var("LESSONCAST_TOKEN")
            .or_else(|_| std::env::var("API_TOKEN"))
            .context("Missing token. Set LESSONCAST_TOKEN or API_TOKEN")?;

        Self::new(base_url, token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn lesson_video_url(&self, lesson_id: LessonId, suffix: &str) -> String {
        self.build_url(&format!("{}/lessons/{}/video{}", API_PREFIX, lesson_id, suffix))
    }

    /// Sends with auth and decodes a JSON body; failures are mapped per operation.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        operation: ApiOperation,
        request: reqwest::RequestBuilder,
    ) -> Result<T, VideoError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, operation = ?operation, "API request failed to send");
                VideoError::from_api_failure(operation, 0, "NETWORK_ERROR", e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<ApiErrorBody>(&text) {
                Ok(body) => (body.code, body.error),
                Err(_) => ("UNKNOWN".to_string(), text),
            };
            tracing::debug!(status = status.as_u16(), code = %code, operation = ?operation, "API request rejected");
            return Err(VideoError::from_api_failure(
                operation,
                status.as_u16(),
                &code,
                message,
            ));
        }

        response.json::<T>().await.map_err(|e| {
            VideoError::from_api_failure(
                operation,
                status.as_u16(),
                "INVALID_RESPONSE",
                format!("Failed to parse response as JSON: {}", e),
            )
        })
    }

    /// Raw client for custom requests.
    pub fn client(&self) -> &Client {
        &self.client
    }
}
