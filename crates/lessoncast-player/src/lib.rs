//! Lessoncast playback
//!
//! Plays a [`StreamingReference`](lessoncast_core::StreamingReference) through
//! whatever the host runtime offers (a MediaSource engine or native HLS),
//! recovers from network and decoder faults, and renews the reference before
//! it expires. The host runtime is reached only through the traits in
//! [`runtime`].

pub mod engine;
pub mod error;
pub mod events;
pub mod refresh;
pub mod runtime;
pub mod session;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use engine::{PlaybackEngine, PlaybackState};
pub use error::PlaybackError;
pub use events::{EngineEvent, ErrorKind, LoadGeneration, PlaybackAction, RecoveryPolicy};
pub use refresh::{RefreshOptions, RefreshOutcome, RefreshScheduler, DEFAULT_REFRESH_PERIOD};
pub use runtime::{HlsEngine, MediaElement, MediaRuntime, ObjectUrl};
pub use session::{ViewingSession, ViewingStatus};
