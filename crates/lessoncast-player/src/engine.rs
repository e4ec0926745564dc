//! Loads streaming references into a media element and recovers from faults.

use crate::error::PlaybackError;
use crate::events::{EngineEvent, ErrorKind, LoadGeneration, PlaybackAction, RecoveryPolicy};
use crate::runtime::{HlsEngine, MediaElement, MediaRuntime, ObjectUrl};
use lessoncast_core::{ReferenceShape, StreamingReference, HLS_MIME};

/// Who currently drives the media element.
enum MediaSlot {
    Empty,
    /// The element plays the reference itself.
    Native,
    /// A MediaSource engine is attached, possibly fed from a blob URL it owns.
    Engine {
        engine: Box<dyn HlsEngine>,
        blob: Option<ObjectUrl>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Ready,
    Recovering,
    /// Local recovery gave up; waiting for a new reference.
    Escalated,
}

/// Owns the media element and at most one engine attached to it.
///
/// Every load tears the previous engine down first: the engine is destroyed,
/// then its blob URL revoked. Dropping the `PlaybackEngine` does the same.
pub struct PlaybackEngine {
    runtime: Box<dyn MediaRuntime>,
    element: Box<dyn MediaElement>,
    slot: MediaSlot,
    policy: RecoveryPolicy,
    generation: u64,
    state: PlaybackState,
    network_retries: u32,
    media_resets: u32,
}

impl PlaybackEngine {
    pub fn new(runtime: Box<dyn MediaRuntime>, element: Box<dyn MediaElement>) -> Self {
        Self::with_policy(runtime, element, RecoveryPolicy::default())
    }

    pub fn with_policy(
        runtime: Box<dyn MediaRuntime>,
        element: Box<dyn MediaElement>,
        policy: RecoveryPolicy,
    ) -> Self {
        Self {
            runtime,
            element,
            slot: MediaSlot::Empty,
            policy,
            generation: 0,
            state: PlaybackState::Idle,
            network_retries: 0,
            media_resets: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn generation(&self) -> LoadGeneration {
        LoadGeneration(self.generation)
    }

    pub fn has_engine(&self) -> bool {
        matches!(self.slot, MediaSlot::Engine { .. })
    }

    /// Replaces whatever is playing with `reference`.
    ///
    /// Embedded manifests go through a fresh MediaSource engine when the
    /// runtime has one, otherwise to the element directly if it speaks HLS.
    /// Plain URLs always go to the element.
    pub fn load(&mut self, reference: &StreamingReference) -> Result<LoadGeneration, PlaybackError> {
        self.teardown();
        self.generation += 1;
        self.network_retries = 0;
        self.media_resets = 0;

        if reference.is_empty() {
            return Err(PlaybackError::EmptyReference);
        }

        match reference.classify() {
            ReferenceShape::EmbeddedManifest { .. } if self.runtime.supports_media_source() => {
                let manifest = reference.decode_manifest()?;
                let blob = self
                    .runtime
                    .create_object_url(manifest.into_bytes(), HLS_MIME);

                let mut engine = self.runtime.create_engine();
                engine.load_source(blob.as_str());
                engine.attach_media(self.element.as_mut());
                self.slot = MediaSlot::Engine {
                    engine,
                    blob: Some(blob),
                };
                self.state = PlaybackState::Loading;
                tracing::info!(generation = self.generation, "Engine loaded embedded manifest");
            }
            ReferenceShape::EmbeddedManifest { .. } => {
                if !self.element.can_play_type(HLS_MIME) {
                    return Err(PlaybackError::Unsupported);
                }
                self.play_natively(reference.as_str());
            }
            ReferenceShape::Url(url) => self.play_natively(url),
        }

        Ok(LoadGeneration(self.generation))
    }

    fn play_natively(&mut self, url: &str) {
        self.element.set_source(url);
        self.slot = MediaSlot::Native;
        tracing::info!(generation = self.generation, "Element playing reference natively");
        self.mark_ready();
    }

    fn mark_ready(&mut self) {
        self.state = PlaybackState::Ready;
        if let Err(e) = self.element.play() {
            tracing::debug!(error = %e, "Autoplay not permitted");
        }
    }

    /// Routes an engine event through the recovery rules.
    pub fn handle_event(
        &mut self,
        generation: LoadGeneration,
        event: EngineEvent,
    ) -> PlaybackAction {
        if generation.0 != self.generation {
            tracing::debug!(
                stale = generation.0,
                current = self.generation,
                "Ignoring event from a torn down engine"
            );
            return PlaybackAction::None;
        }

        let engine = match &mut self.slot {
            MediaSlot::Engine { engine, .. } => engine,
            _ => return PlaybackAction::None,
        };

        match event {
            EngineEvent::ManifestParsed => {
                self.mark_ready();
                PlaybackAction::Ready
            }
            EngineEvent::FragmentLoaded => {
                self.network_retries = 0;
                if self.state == PlaybackState::Recovering {
                    self.state = PlaybackState::Ready;
                }
                PlaybackAction::None
            }
            EngineEvent::Error {
                fatal: false,
                kind,
                details,
            } => {
                tracing::debug!(?kind, %details, "Non-fatal engine error");
                PlaybackAction::None
            }
            EngineEvent::Error {
                kind: ErrorKind::Network,
                details,
                ..
            } if self.network_retries < self.policy.max_network_retries => {
                self.network_retries += 1;
                tracing::warn!(
                    attempt = self.network_retries,
                    %details,
                    "Network fault, resuming segment loading"
                );
                engine.start_load();
                self.state = PlaybackState::Recovering;
                PlaybackAction::Recovering
            }
            EngineEvent::Error {
                kind: ErrorKind::Media,
                details,
                ..
            } if self.media_resets < self.policy.max_media_resets => {
                self.media_resets += 1;
                tracing::warn!(%details, "Decoder fault, resetting media pipeline");
                engine.recover_media_error();
                self.state = PlaybackState::Recovering;
                PlaybackAction::Recovering
            }
            EngineEvent::Error { kind, details, .. } => {
                tracing::warn!(?kind, %details, "Local recovery exhausted");
                self.teardown();
                self.state = PlaybackState::Escalated;
                PlaybackAction::NeedsFreshReference
            }
        }
    }

    /// Destroys the engine, then revokes its blob URL. Idempotent.
    pub fn teardown(&mut self) {
        match std::mem::replace(&mut self.slot, MediaSlot::Empty) {
            MediaSlot::Engine { mut engine, blob } => {
                engine.destroy();
                if let Some(blob) = blob {
                    self.runtime.revoke_object_url(blob);
                }
                tracing::debug!(generation = self.generation, "Engine torn down");
            }
            MediaSlot::Native => self.element.clear_source(),
            MediaSlot::Empty => {}
        }
        self.state = PlaybackState::Idle;
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
