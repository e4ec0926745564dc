/// Classification of an engine fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Media,
    Other,
}

/// Events an [`HlsEngine`](crate::HlsEngine) reports back to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ManifestParsed,
    FragmentLoaded,
    Error {
        kind: ErrorKind,
        fatal: bool,
        details: String,
    },
}

impl EngineEvent {
    pub fn fatal(kind: ErrorKind, details: impl Into<String>) -> Self {
        EngineEvent::Error {
            kind,
            fatal: true,
            details: details.into(),
        }
    }

    pub fn non_fatal(kind: ErrorKind, details: impl Into<String>) -> Self {
        EngineEvent::Error {
            kind,
            fatal: false,
            details: details.into(),
        }
    }
}

/// Identifies one load of the engine. Events carrying an older generation
/// come from an instance that has already been torn down and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadGeneration(pub(crate) u64);

/// What the engine did in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAction {
    /// Nothing to do: non-fatal error, progress, or a stale event.
    None,
    /// Manifest parsed, playback is ready.
    Ready,
    /// A local recovery step was taken.
    Recovering,
    /// Local recovery is exhausted. The engine has been torn down and needs a
    /// fresh streaming reference.
    NeedsFreshReference,
}

/// Bounds on local recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Consecutive network faults, with no fragment loaded in between, that are
    /// answered with a reload before escalating.
    pub max_network_retries: u32,
    /// Decoder resets per load.
    pub max_media_resets: u32,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            max_network_retries: 3,
            max_media_resets: 1,
        }
    }
}
