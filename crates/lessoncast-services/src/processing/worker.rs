use anyhow::Context;
use futures::StreamExt;
use lessoncast_core::{LessonId, VideoAsset, VideoStatus};
use lessoncast_storage::{keys, Storage, StorageError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

use super::transcoder::{TranscodeError, TranscodeOutput, Transcoder};
use crate::repository::VideoAssetRepository;

/// Maximum delay before retrying a job whose storage access failed.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

#[inline]
pub(crate) fn compute_retry_backoff_seconds(retry_count: u32) -> u64 {
    2_u64.saturating_pow(retry_count).min(MAX_RETRY_BACKOFF_SECS)
}

/// One raw upload waiting for its rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingJob {
    pub lesson_id: LessonId,
    pub object_key: String,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub job_timeout: Duration,
    /// Retries for storage failures; transcoder failures are terminal.
    pub max_retries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(3600),
            max_retries: 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum JobError {
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0:#}")]
    Io(anyhow::Error),
}

impl JobError {
    fn is_recoverable(&self) -> bool {
        matches!(self, JobError::Storage(e) if !matches!(e, StorageError::NotFound(_)))
    }
}

/// How a job ended, for callers and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Ready,
    Failed(String),
    /// A newer upload or a delete replaced the asset.
    Superseded,
}

/// Drives one asset through `UPLOADED -> PROCESSING -> READY | FAILED`.
pub struct ProcessingWorker {
    assets: Arc<dyn VideoAssetRepository>,
    storage: Arc<dyn Storage>,
    transcoder: Arc<dyn Transcoder>,
    config: WorkerConfig,
}

impl ProcessingWorker {
    pub fn new(
        assets: Arc<dyn VideoAssetRepository>,
        storage: Arc<dyn Storage>,
        transcoder: Arc<dyn Transcoder>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            assets,
            storage,
            transcoder,
            config,
        }
    }

    #[tracing::instrument(skip(self, job), fields(lesson_id = job.lesson_id, object_key = %job.object_key))]
    pub async fn process(&self, job: ProcessingJob) -> JobOutcome {
        match self.run(&job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Processing job could not record its outcome");
                let reason = e.to_string();
                self.record_failure(&job, &reason).await;
                JobOutcome::Failed(reason)
            }
        }
    }

    /// Best effort: leaves the asset FAILED so the lesson accepts a new upload.
    async fn record_failure(&self, job: &ProcessingJob, reason: &str) {
        let mut asset = match self.current_asset(job).await {
            Ok(Some(asset)) if asset.status == VideoStatus::Processing => asset,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Could not reload asset to mark it failed");
                return;
            }
        };
        if asset.mark_failed(reason.to_string()).is_err() {
            return;
        }
        if let Err(e) = self.assets.save_if_current(asset).await {
            tracing::warn!(error = %e, "Could not mark asset failed");
        }
    }

    async fn run(&self, job: &ProcessingJob) -> anyhow::Result<JobOutcome> {
        let Some(mut asset) = self.current_asset(job).await? else {
            return Ok(JobOutcome::Superseded);
        };
        if asset.status != VideoStatus::Uploaded {
            tracing::debug!(status = %asset.status, "Asset already left UPLOADED, skipping job");
            return Ok(JobOutcome::Superseded);
        }
        asset.mark_processing()?;
        if !self.assets.save_if_current(asset).await? {
            return Ok(JobOutcome::Superseded);
        }
        tracing::info!("Video processing started");

        let start = std::time::Instant::now();
        let result = self.transcode_with_retry(job).await;

        let Some(mut asset) = self.current_asset(job).await? else {
            if matches!(result, Ok(Some(_))) {
                self.discard_output(&job.object_key).await;
            }
            return Ok(JobOutcome::Superseded);
        };

        let outcome = match result {
            Ok(Some((manifest_key, duration_seconds))) => {
                asset.mark_ready(manifest_key, duration_seconds)?;
                JobOutcome::Ready
            }
            Ok(None) => {
                let reason = format!(
                    "Processing timed out after {} seconds",
                    self.config.job_timeout.as_secs()
                );
                asset.mark_failed(reason.clone())?;
                JobOutcome::Failed(reason)
            }
            Err(e) => {
                let reason = e.to_string();
                asset.mark_failed(reason.clone())?;
                JobOutcome::Failed(reason)
            }
        };

        if !self.assets.save_if_current(asset).await? {
            if outcome == JobOutcome::Ready {
                self.discard_output(&job.object_key).await;
            }
            return Ok(JobOutcome::Superseded);
        }

        match &outcome {
            JobOutcome::Ready => tracing::info!(
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Video processing completed"
            ),
            JobOutcome::Failed(reason) => tracing::warn!(
                reason = %reason,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Video processing failed"
            ),
            JobOutcome::Superseded => {}
        }
        Ok(outcome)
    }

    async fn current_asset(&self, job: &ProcessingJob) -> anyhow::Result<Option<VideoAsset>> {
        let asset = self.assets.get(job.lesson_id).await?;
        match asset {
            Some(asset) if asset.object_key.as_deref() == Some(job.object_key.as_str()) => {
                Ok(Some(asset))
            }
            _ => {
                tracing::info!("Upload superseded, dropping processing job");
                Ok(None)
            }
        }
    }

    /// `Ok(None)` on timeout.
    async fn transcode_with_retry(
        &self,
        job: &ProcessingJob,
    ) -> Result<Option<(Option<String>, Option<u32>)>, JobError> {
        let mut retry_count = 0;
        loop {
            match tokio::time::timeout(self.config.job_timeout, self.transcode_once(job)).await {
                Err(_) => return Ok(None),
                Ok(Ok(published)) => return Ok(Some(published)),
                Ok(Err(e)) if e.is_recoverable() && retry_count < self.config.max_retries => {
                    retry_count += 1;
                    let backoff = compute_retry_backoff_seconds(retry_count);
                    tracing::warn!(
                        error = %e,
                        retry_count = retry_count,
                        backoff_secs = backoff,
                        "Processing job failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                }
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    async fn transcode_once(
        &self,
        job: &ProcessingJob,
    ) -> Result<(Option<String>, Option<u32>), JobError> {
        let temp_dir = TempDir::new()
            .context("Failed to create temp directory")
            .map_err(JobError::Io)?;
        let input_path = temp_dir.path().join("input.mp4");
        let output_dir = temp_dir.path().join("hls");
        tokio::fs::create_dir_all(&output_dir)
            .await
            .context("Failed to create output directory")
            .map_err(JobError::Io)?;

        if self.transcoder.needs_input() {
            self.download_input(&job.object_key, &input_path).await?;
        }

        let TranscodeOutput {
            manifest_path,
            duration_seconds,
        } = self.transcoder.transcode(&input_path, &output_dir).await?;

        let manifest_key = match manifest_path {
            Some(manifest_path) => {
                let prefix = keys::hls_prefix(&job.object_key);
                self.upload_output(&output_dir, &prefix).await?;
                Some(format!("{}{}", prefix, to_key_path(&manifest_path)))
            }
            None => None,
        };

        Ok((manifest_key, duration_seconds))
    }

    async fn download_input(&self, object_key: &str, path: &Path) -> Result<(), JobError> {
        let mut stream = self.storage.download_stream(object_key).await?;
        let mut file = tokio::fs::File::create(path)
            .await
            .context("Failed to create input file")
            .map_err(JobError::Io)?;
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?)
                .await
                .context("Failed to write input file")
                .map_err(JobError::Io)?;
        }
        file.flush()
            .await
            .context("Failed to flush input file")
            .map_err(JobError::Io)?;
        Ok(())
    }

    /// Uploads every file under `output_dir`, keeping relative paths below `prefix`.
    async fn upload_output(&self, output_dir: &Path, prefix: &str) -> Result<usize, JobError> {
        let files = collect_files(output_dir)
            .await
            .context("Failed to list transcoder output")
            .map_err(JobError::Io)?;

        for relative in &files {
            let data = tokio::fs::read(output_dir.join(relative))
                .await
                .with_context(|| format!("Failed to read {}", relative.display()))
                .map_err(JobError::Io)?;
            let key = format!("{}{}", prefix, to_key_path(relative));
            self.storage
                .upload_with_key(&key, data, keys::content_type_for_key(&key))
                .await?;
        }

        tracing::debug!(prefix = %prefix, files = files.len(), "Rendition uploaded");
        Ok(files.len())
    }

    async fn discard_output(&self, object_key: &str) {
        let prefix = keys::hls_prefix(object_key);
        if let Err(e) = self.storage.delete_prefix(&prefix).await {
            tracing::warn!(error = %e, prefix = %prefix, "Failed to discard superseded rendition");
        }
    }
}

fn to_key_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

async fn collect_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![PathBuf::new()];
    while let Some(relative) = pending.pop() {
        let mut entries = tokio::fs::read_dir(root.join(&relative)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = relative.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryVideoAssetRepository;
    use async_trait::async_trait;
    use lessoncast_core::AppError;
    use lessoncast_storage::LocalStorage;

    struct FakeTranscoder {
        fail_with: Option<String>,
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn transcode(
            &self,
            input: &Path,
            output_dir: &Path,
        ) -> Result<TranscodeOutput, TranscodeError> {
            assert_eq!(tokio::fs::read(input).await.unwrap(), b"raw video");
            if let Some(reason) = &self.fail_with {
                return Err(TranscodeError::Failed(reason.clone()));
            }
            tokio::fs::create_dir_all(output_dir.join("720p")).await?;
            tokio::fs::write(output_dir.join("index.m3u8"), "#EXTM3U\n720p/index.m3u8\n").await?;
            tokio::fs::write(output_dir.join("720p/index.m3u8"), "#EXTM3U\nseg0.ts\n").await?;
            tokio::fs::write(output_dir.join("720p/seg0.ts"), b"ts").await?;
            Ok(TranscodeOutput {
                manifest_path: Some(PathBuf::from("index.m3u8")),
                duration_seconds: Some(126),
            })
        }
    }

    async fn setup(
        fail_with: Option<&str>,
    ) -> (
        tempfile::TempDir,
        Arc<InMemoryVideoAssetRepository>,
        Arc<LocalStorage>,
        ProcessingWorker,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(
            LocalStorage::new(dir.path(), "http://localhost:4000/media".to_string())
                .await
                .unwrap(),
        );
        storage
            .upload_with_key("lessons/1/a.mp4", b"raw video".to_vec(), "video/mp4")
            .await
            .unwrap();
        let assets = Arc::new(InMemoryVideoAssetRepository::new());
        assets
            .save(VideoAsset::uploaded(1, "lessons/1/a.mp4".to_string(), 125))
            .await
            .unwrap();
        let worker = ProcessingWorker::new(
            assets.clone(),
            storage.clone(),
            Arc::new(FakeTranscoder {
                fail_with: fail_with.map(str::to_string),
            }),
            WorkerConfig::default(),
        );
        (dir, assets, storage, worker)
    }

    fn job() -> ProcessingJob {
        ProcessingJob {
            lesson_id: 1,
            object_key: "lessons/1/a.mp4".to_string(),
        }
    }

    #[test]
    fn test_retry_backoff_is_capped() {
        assert_eq!(compute_retry_backoff_seconds(1), 2);
        assert_eq!(compute_retry_backoff_seconds(3), 8);
        assert_eq!(compute_retry_backoff_seconds(20), MAX_RETRY_BACKOFF_SECS);
    }

    #[tokio::test]
    async fn test_successful_job_publishes_rendition() {
        let (_dir, assets, storage, worker) = setup(None).await;

        assert_eq!(worker.process(job()).await, JobOutcome::Ready);

        let asset = assets.get(1).await.unwrap().unwrap();
        assert_eq!(asset.status, VideoStatus::Ready);
        assert_eq!(asset.duration_seconds, Some(126));
        assert_eq!(
            asset.manifest_key.as_deref(),
            Some("lessons/1/a/hls/index.m3u8")
        );
        assert!(storage.exists("lessons/1/a/hls/720p/seg0.ts").await.unwrap());
        assert!(storage.exists("lessons/1/a/hls/720p/index.m3u8").await.unwrap());
    }

    #[tokio::test]
    async fn test_transcoder_failure_marks_asset_failed() {
        let (_dir, assets, _storage, worker) = setup(Some("Unsupported codec")).await;

        assert_eq!(
            worker.process(job()).await,
            JobOutcome::Failed("Unsupported codec".to_string())
        );

        let asset = assets.get(1).await.unwrap().unwrap();
        assert_eq!(asset.status, VideoStatus::Failed);
        assert_eq!(asset.failure_reason.as_deref(), Some("Unsupported codec"));
    }

    #[tokio::test]
    async fn test_superseded_job_is_dropped() {
        let (_dir, assets, _storage, worker) = setup(None).await;
        assets
            .save(VideoAsset::uploaded(1, "lessons/1/b.mp4".to_string(), 30))
            .await
            .unwrap();

        assert_eq!(worker.process(job()).await, JobOutcome::Superseded);
        let asset = assets.get(1).await.unwrap().unwrap();
        assert_eq!(asset.status, VideoStatus::Uploaded);
        assert_eq!(asset.object_key.as_deref(), Some("lessons/1/b.mp4"));
    }

    #[tokio::test]
    async fn test_missing_raw_object_fails_without_retry() {
        let (_dir, assets, storage, worker) = setup(None).await;
        storage.delete("lessons/1/a.mp4").await.unwrap();

        assert!(matches!(worker.process(job()).await, JobOutcome::Failed(_)));
        assert_eq!(
            assets.get(1).await.unwrap().unwrap().status,
            VideoStatus::Failed
        );
    }

    /// Refuses to store READY assets.
    struct RejectsReady(InMemoryVideoAssetRepository);

    #[async_trait]
    impl VideoAssetRepository for RejectsReady {
        async fn get(&self, lesson_id: LessonId) -> Result<Option<VideoAsset>, AppError> {
            self.0.get(lesson_id).await
        }

        async fn save(&self, asset: VideoAsset) -> Result<(), AppError> {
            self.0.save(asset).await
        }

        async fn save_if_current(&self, asset: VideoAsset) -> Result<bool, AppError> {
            if asset.status == VideoStatus::Ready {
                return Err(AppError::Internal("database unavailable".to_string()));
            }
            self.0.save_if_current(asset).await
        }

        async fn remove(&self, lesson_id: LessonId) -> Result<Option<VideoAsset>, AppError> {
            self.0.remove(lesson_id).await
        }
    }

    #[tokio::test]
    async fn test_unsaved_outcome_leaves_asset_failed() {
        let (_dir, _, storage, _) = setup(None).await;
        let assets = Arc::new(RejectsReady(InMemoryVideoAssetRepository::new()));
        assets
            .save(VideoAsset::uploaded(1, "lessons/1/a.mp4".to_string(), 125))
            .await
            .unwrap();
        let worker = ProcessingWorker::new(
            assets.clone(),
            storage,
            Arc::new(FakeTranscoder { fail_with: None }),
            WorkerConfig::default(),
        );

        assert!(matches!(worker.process(job()).await, JobOutcome::Failed(_)));

        let asset = assets.get(1).await.unwrap().unwrap();
        assert_eq!(asset.status, VideoStatus::Failed);
        assert!(asset
            .failure_reason
            .as_deref()
            .is_some_and(|reason| reason.contains("database unavailable")));
    }

    #[tokio::test]
    async fn test_passthrough_marks_ready_without_manifest() {
        let (_dir, assets, storage, _) = setup(None).await;
        let worker = ProcessingWorker::new(
            assets.clone(),
            storage,
            Arc::new(super::super::transcoder::PassthroughTranscoder),
            WorkerConfig::default(),
        );

        assert_eq!(worker.process(job()).await, JobOutcome::Ready);
        let asset = assets.get(1).await.unwrap().unwrap();
        assert!(asset.is_ready());
        assert!(asset.manifest_key.is_none());
        assert_eq!(asset.duration_seconds, Some(125));
    }
}
