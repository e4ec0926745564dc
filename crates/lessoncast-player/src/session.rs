//! One viewer watching one lesson: fetch, load, renew, recover, close.

use crate::engine::PlaybackEngine;
use crate::events::{EngineEvent, LoadGeneration, PlaybackAction};
use crate::refresh::{RefreshOptions, RefreshOutcome, RefreshScheduler};
use lessoncast_core::{LessonId, StreamingUrlProvider, VideoError};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewingStatus {
    Closed,
    Playing,
    /// Nothing can be played. Carries the message for the fallback panel.
    Unavailable(String),
}

struct Viewing {
    lesson_id: LessonId,
    scheduler: RefreshScheduler,
    refreshes: mpsc::Receiver<RefreshOutcome>,
    refetch_used: bool,
}

/// Ties a [`PlaybackEngine`] to the reference provider for one lesson at a time.
///
/// Escalations from the engine get exactly one automatic re-fetch and reload;
/// a second escalation before playback makes progress surfaces
/// [`VideoError::PlaybackFatal`]. Closing, or opening another lesson, stops the
/// refresh timer before the engine is torn down.
pub struct ViewingSession {
    provider: Arc<dyn StreamingUrlProvider>,
    options: RefreshOptions,
    viewing: Option<Viewing>,
    engine: PlaybackEngine,
    status: ViewingStatus,
}

impl ViewingSession {
    pub fn new(
        provider: Arc<dyn StreamingUrlProvider>,
        engine: PlaybackEngine,
        options: RefreshOptions,
    ) -> Self {
        Self {
            provider,
            options,
            viewing: None,
            engine,
            status: ViewingStatus::Closed,
        }
    }

    pub fn status(&self) -> &ViewingStatus {
        &self.status
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn lesson_id(&self) -> Option<LessonId> {
        self.viewing.as_ref().map(|v| v.lesson_id)
    }

    pub fn is_refreshing(&self) -> bool {
        self.viewing.is_some()
    }

    /// Starts viewing `lesson_id`. A lesson that is not streamable leaves the
    /// session unavailable with no timer running.
    #[tracing::instrument(skip(self))]
    pub async fn open(&mut self, lesson_id: LessonId) -> Result<LoadGeneration, VideoError> {
        self.close();

        let reference = match self.provider.streaming_reference(lesson_id).await {
            Ok(reference) => reference,
            Err(e) => return Err(self.unavailable(e)),
        };
        let generation = match self.engine.load(&reference) {
            Ok(generation) => generation,
            Err(e) => return Err(self.unavailable(e.into())),
        };

        let (scheduler, refreshes) =
            RefreshScheduler::start(self.provider.clone(), lesson_id, self.options.clone());
        self.viewing = Some(Viewing {
            lesson_id,
            scheduler,
            refreshes,
            refetch_used: false,
        });
        self.status = ViewingStatus::Playing;
        tracing::info!(lesson_id, "Viewing started");
        Ok(generation)
    }

    /// Routes an engine event. Returns the new generation when the event led
    /// to a reload.
    pub async fn handle_event(
        &mut self,
        generation: LoadGeneration,
        event: EngineEvent,
    ) -> Result<Option<LoadGeneration>, VideoError> {
        let made_progress =
            event == EngineEvent::FragmentLoaded && generation == self.engine.generation();
        let action = self.engine.handle_event(generation, event);

        let Some(viewing) = self.viewing.as_mut() else {
            return Ok(None);
        };
        if made_progress {
            viewing.refetch_used = false;
        }
        if action != PlaybackAction::NeedsFreshReference {
            return Ok(None);
        }
        if viewing.refetch_used {
            let err = VideoError::PlaybackFatal("Playback failed after reloading".to_string());
            return Err(self.unavailable(err));
        }

        viewing.refetch_used = true;
        let lesson_id = viewing.lesson_id;
        tracing::warn!(lesson_id, "Reloading with a fresh streaming reference");
        let reloaded = match self.provider.streaming_reference(lesson_id).await {
            Ok(reference) => self.engine.load(&reference).map_err(VideoError::from),
            Err(e) => Err(e),
        };
        match reloaded {
            Ok(generation) => Ok(Some(generation)),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    /// Waits for the next scheduled refresh and reloads the engine with it.
    /// Returns `None` when nothing is being viewed.
    ///
    /// A failed fetch keeps the current reference playing, unless the asset
    /// stopped being streamable, in which case viewing ends.
    pub async fn next_refresh(&mut self) -> Option<Result<LoadGeneration, VideoError>> {
        let outcome = self.viewing.as_mut()?.refreshes.recv().await?;

        match outcome {
            Ok(reference) => match self.engine.load(&reference) {
                Ok(generation) => {
                    if let Some(viewing) = self.viewing.as_mut() {
                        viewing.refetch_used = false;
                    }
                    Some(Ok(generation))
                }
                Err(e) => Some(Err(self.unavailable(e.into()))),
            },
            Err(e @ VideoError::StreamingUnavailable(_)) => Some(Err(self.unavailable(e))),
            Err(e) => Some(Err(e)),
        }
    }

    /// Stops the refresh timer, then tears the engine down.
    pub fn close(&mut self) {
        if let Some(viewing) = self.viewing.take() {
            viewing.scheduler.stop();
            tracing::info!(lesson_id = viewing.lesson_id, "Viewing stopped");
        }
        self.engine.teardown();
        self.status = ViewingStatus::Closed;
    }

    fn unavailable(&mut self, err: VideoError) -> VideoError {
        self.close();
        tracing::error!(error = %err, "Playback unavailable");
        self.status = ViewingStatus::Unavailable(err.user_message());
        err
    }
}

impl Drop for ViewingSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ErrorKind;
    use crate::testing::{FakeRuntime, Op};
    use async_trait::async_trait;
    use lessoncast_core::StreamingReference;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Hands out scripted references; defaults to a fresh embedded manifest.
    #[derive(Default)]
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<StreamingReference, VideoError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn with(script: Vec<Result<StreamingReference, VideoError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl StreamingUrlProvider for ScriptedProvider {
        async fn streaming_reference(
            &self,
            _lesson_id: LessonId,
        ) -> Result<StreamingReference, VideoError> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
                Ok(StreamingReference::from_manifest(&format!(
                    "#EXTM3U\n#EXTINF:6.0,\nhttps://s3/seg0.ts?sig={}\n",
                    n
                )))
            })
        }
    }

    fn session(provider: Arc<ScriptedProvider>, runtime: &FakeRuntime) -> ViewingSession {
        ViewingSession::new(
            provider,
            PlaybackEngine::new(runtime.boxed(), runtime.element()),
            RefreshOptions::default(),
        )
    }

    async fn advance_minutes(minutes: u64) {
        tokio::time::advance(Duration::from_secs(minutes * 60)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_then_scheduled_refresh_reloads() {
        let provider = ScriptedProvider::with(Vec::new());
        let runtime = FakeRuntime::new();
        let mut session = session(provider.clone(), &runtime);

        let first = session.open(9).await.unwrap();
        assert_eq!(session.status(), &ViewingStatus::Playing);
        assert!(session.is_refreshing());

        advance_minutes(51).await;
        let second = session.next_refresh().await.unwrap().unwrap();
        assert_ne!(first, second);
        assert_eq!(provider.calls(), 2);
        assert_eq!(runtime.blob_contents().len(), 2);
        assert!(runtime.blob_contents()[1].contains("sig=2"));

        session.close();
        advance_minutes(51).await;
        assert_eq!(provider.calls(), 2);
        assert!(session.next_refresh().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_is_unavailable_without_timer() {
        let provider = ScriptedProvider::with(vec![Err(VideoError::StreamingUnavailable(
            "Video is PROCESSING".into(),
        ))]);
        let runtime = FakeRuntime::new();
        let mut session = session(provider.clone(), &runtime);

        let err = session.open(9).await.unwrap_err();
        assert!(matches!(err, VideoError::StreamingUnavailable(_)));
        assert!(matches!(session.status(), ViewingStatus::Unavailable(_)));
        assert!(!session.is_refreshing());

        advance_minutes(120).await;
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_refetch_then_unavailable() {
        let provider = ScriptedProvider::with(Vec::new());
        let runtime = FakeRuntime::new();
        let mut session = session(provider.clone(), &runtime);

        let generation = session.open(9).await.unwrap();
        let fatal = || EngineEvent::fatal(ErrorKind::Other, "levelLoadError");

        let reloaded = session
            .handle_event(generation, fatal())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(provider.calls(), 2);

        let err = session.handle_event(reloaded, fatal()).await.unwrap_err();
        assert!(matches!(err, VideoError::PlaybackFatal(_)));
        assert_eq!(provider.calls(), 2);
        assert!(matches!(session.status(), ViewingStatus::Unavailable(_)));
        assert!(!session.is_refreshing());
        assert!(!session.engine().has_engine());

        let revokes = runtime.count(|op| matches!(op, Op::RevokeObjectUrl(_)));
        assert_eq!(revokes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_rearms_refetch() {
        let provider = ScriptedProvider::with(Vec::new());
        let runtime = FakeRuntime::new();
        let mut session = session(provider.clone(), &runtime);

        let mut generation = session.open(9).await.unwrap();
        for _ in 0..3 {
            session
                .handle_event(generation, EngineEvent::ManifestParsed)
                .await
                .unwrap();
            session
                .handle_event(generation, EngineEvent::FragmentLoaded)
                .await
                .unwrap();
            generation = session
                .handle_event(generation, EngineEvent::fatal(ErrorKind::Other, "expired"))
                .await
                .unwrap()
                .unwrap();
        }
        assert_eq!(provider.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_progress_from_old_engine_does_not_rearm_refetch() {
        let provider = ScriptedProvider::with(Vec::new());
        let runtime = FakeRuntime::new();
        let mut session = session(provider.clone(), &runtime);

        let first = session.open(9).await.unwrap();
        let fatal = || EngineEvent::fatal(ErrorKind::Other, "fragLoadError");
        let second = session
            .handle_event(first, fatal())
            .await
            .unwrap()
            .unwrap();

        assert!(session
            .handle_event(first, EngineEvent::FragmentLoaded)
            .await
            .unwrap()
            .is_none());

        let err = session.handle_event(second, fatal()).await.unwrap_err();
        assert!(matches!(err, VideoError::PlaybackFatal(_)));
        assert_eq!(provider.calls(), 2);
        assert!(matches!(session.status(), ViewingStatus::Unavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_after_asset_deleted_ends_viewing() {
        let provider = ScriptedProvider::with(Vec::new());
        let runtime = FakeRuntime::new();
        let mut session = session(provider.clone(), &runtime);
        session.open(9).await.unwrap();

        provider
            .script
            .lock()
            .unwrap()
            .push_back(Err(VideoError::StreamingUnavailable("gone".into())));
        advance_minutes(51).await;

        let result = session.next_refresh().await.unwrap();
        assert!(matches!(result, Err(VideoError::StreamingUnavailable(_))));
        assert!(!session.is_refreshing());
        assert!(!session.engine().has_engine());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_tears_everything_down() {
        let provider = ScriptedProvider::with(Vec::new());
        let runtime = FakeRuntime::new();
        {
            let mut session = session(provider.clone(), &runtime);
            session.open(9).await.unwrap();
        }
        assert_eq!(
            runtime.ops()[runtime.ops().len() - 2..],
            [Op::Destroy(1), Op::RevokeObjectUrl("blob:1".into())]
        );
        advance_minutes(120).await;
        assert_eq!(provider.calls(), 1);
    }
}
