use lessoncast_core::{ReferenceDecodeError, VideoError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("Streaming reference is empty")]
    EmptyReference,

    #[error("Embedded manifest could not be decoded: {0}")]
    InvalidManifest(#[from] ReferenceDecodeError),

    #[error("This runtime can play neither MediaSource streams nor native HLS")]
    Unsupported,

    /// The runtime refused to start playback without a user gesture.
    #[error("Autoplay was blocked: {0}")]
    AutoplayBlocked(String),

    #[error("Engine failed: {0}")]
    Engine(String),
}

impl From<PlaybackError> for VideoError {
    fn from(err: PlaybackError) -> Self {
        VideoError::PlaybackFatal(err.to_string())
    }
}
