//! Service wiring: storage, lesson directory, processing pool and the video service.

use crate::auth::JwtService;
use crate::state::AppState;
use anyhow::{Context, Result};
use lessoncast_core::{Config, StorageBackend};
use lessoncast_services::{
    CommandTranscoder, InMemoryLessonDirectory, InMemoryVideoAssetRepository, LessonDirectory,
    LessonVideoService, PassthroughTranscoder, ProcessingQueue, ProcessingWorker, Transcoder,
    VideoServiceSettings, WorkerConfig,
};
use lessoncast_storage::{LocalStorage, Storage};
use std::sync::Arc;

pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    let (storage, local_media) = setup_storage(config).await?;
    let lessons = setup_lesson_directory(config).await?;
    let transcoder = setup_transcoder(config)?;

    Ok(assemble_state(
        config,
        storage,
        local_media,
        lessons,
        transcoder,
    ))
}

/// The local backend is also returned concretely so the media route can verify its URLs.
pub async fn setup_storage(
    config: &Config,
) -> Result<(Arc<dyn Storage>, Option<Arc<LocalStorage>>)> {
    match config.storage_backend {
        StorageBackend::Local => {
            let local = Arc::new(
                lessoncast_storage::create_local_storage(config)
                    .await
                    .context("Failed to initialize local storage")?,
            );
            tracing::info!(base_url = %local.base_url(), "Local storage initialized");
            let storage: Arc<dyn Storage> = local.clone();
            Ok((storage, Some(local)))
        }
        StorageBackend::S3 => {
            let storage = lessoncast_storage::create_storage(config)
                .await
                .context("Failed to initialize S3 storage")?;
            tracing::info!(bucket = ?config.s3_bucket, "S3 storage initialized");
            Ok((storage, None))
        }
    }
}

pub async fn setup_lesson_directory(config: &Config) -> Result<Arc<dyn LessonDirectory>> {
    let directory = match &config.lessons_file {
        Some(path) => InMemoryLessonDirectory::from_file(path)
            .await
            .with_context(|| format!("Failed to load lessons from {}", path))?,
        None => {
            tracing::warn!("LESSONS_FILE not set; every lesson lookup will miss");
            InMemoryLessonDirectory::new()
        }
    };
    Ok(Arc::new(directory))
}

pub fn setup_transcoder(config: &Config) -> Result<Arc<dyn Transcoder>> {
    match &config.transcoder_command {
        Some(command) => {
            let transcoder =
                CommandTranscoder::new(command).context("Invalid TRANSCODER_COMMAND")?;
            tracing::info!(program = %transcoder.program(), "External transcoder configured");
            Ok(Arc::new(transcoder))
        }
        None => {
            tracing::info!("No transcoder configured; uploads are published progressively");
            Ok(Arc::new(PassthroughTranscoder))
        }
    }
}

/// Builds the state around already-constructed collaborators and starts the processing pool.
pub fn assemble_state(
    config: &Config,
    storage: Arc<dyn Storage>,
    local_media: Option<Arc<LocalStorage>>,
    lessons: Arc<dyn LessonDirectory>,
    transcoder: Arc<dyn Transcoder>,
) -> Arc<AppState> {
    let assets = Arc::new(InMemoryVideoAssetRepository::new());

    let worker = Arc::new(ProcessingWorker::new(
        assets.clone(),
        storage.clone(),
        transcoder,
        WorkerConfig::default(),
    ));
    let queue = ProcessingQueue::start(worker, config.processing_max_workers);

    let video = Arc::new(LessonVideoService::new(
        lessons,
        assets,
        storage.clone(),
        Some(queue),
        VideoServiceSettings::from(config),
    ));

    Arc::new(AppState {
        config: config.clone(),
        video,
        storage,
        local_media,
        jwt: Arc::new(JwtService::new(&config.jwt_secret)),
    })
}
