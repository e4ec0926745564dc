//! Raw object transfer to a presigned upload URL.

use async_trait::async_trait;
use futures::StreamExt;
use lessoncast_core::{ObjectTransport, ProgressSink, UploadFile, UploadTicket, VideoError};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;

/// Uploads can run long; only the connection phase is bounded.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Streams the file body with `PUT`, reporting bytes as they leave.
#[derive(Clone, Debug)]
pub struct HttpObjectTransport {
    client: Client,
}

impl HttpObjectTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectTransport for HttpObjectTransport {
    async fn put_object(
        &self,
        ticket: &UploadTicket,
        file: &UploadFile,
        progress: ProgressSink,
    ) -> Result<(), VideoError> {
        let handle = tokio::fs::File::open(&file.path).await.map_err(|e| {
            VideoError::Transport(format!("Failed to open {}: {}", file.path.display(), e))
        })?;

        let total = file.size;
        let sent = Arc::new(AtomicU64::new(0));
        let sink = progress.clone();
        let stream = ReaderStream::new(handle).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                let now = sent.fetch_add(bytes.len() as u64, Ordering::Relaxed) + bytes.len() as u64;
                sink(now.min(total), total);
            }
            chunk
        });

        let start = std::time::Instant::now();
        let response = self
            .client
            .put(&ticket.upload_url)
            .header(CONTENT_TYPE, &file.content_type)
            .header(CONTENT_LENGTH, total)
            .body(Body::wrap_stream(stream))
            .send()
            .await
            .map_err(|e| VideoError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                object_key = %ticket.object_key,
                "Storage rejected the upload"
            );
            return Err(VideoError::Transport(format!(
                "Storage responded with status {}",
                status.as_u16()
            )));
        }

        progress(total, total);
        tracing::info!(
            object_key = %ticket.object_key,
            size_bytes = total,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Raw upload transferred"
        );
        Ok(())
    }
}
