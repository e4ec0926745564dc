//! Seams to the host media runtime.
//!
//! A browser binding implements these over `HTMLMediaElement`, an hls.js style
//! engine and `URL.createObjectURL`; tests use recording fakes. Everything is
//! driven from one thread, so none of the traits require `Send`.

use crate::error::PlaybackError;

/// The element frames are rendered into. Owned by one engine at a time.
pub trait MediaElement {
    fn set_source(&mut self, url: &str);

    fn clear_source(&mut self);

    /// Whether the element can decode `mime` without help.
    fn can_play_type(&self, mime: &str) -> bool;

    /// Start playback. Runtimes may refuse without a user gesture.
    fn play(&mut self) -> Result<(), PlaybackError>;
}

/// A MediaSource-based adaptive streaming engine instance.
///
/// Instances are single-use: once destroyed they are dropped, and a reload
/// constructs a fresh one.
pub trait HlsEngine {
    fn load_source(&mut self, url: &str);

    fn attach_media(&mut self, element: &mut dyn MediaElement);

    /// Resume segment loading after a network fault.
    fn start_load(&mut self);

    /// Reset the decoder after a media fault.
    fn recover_media_error(&mut self);

    /// Detach from the element and release every buffer.
    fn destroy(&mut self);
}

/// A local URL for an in-memory blob.
///
/// Not `Clone`: the only way to get rid of one is
/// [`MediaRuntime::revoke_object_url`], which consumes it, so a URL cannot be
/// revoked twice.
#[derive(Debug, PartialEq, Eq)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Capabilities and factories of the host runtime.
pub trait MediaRuntime {
    fn supports_media_source(&self) -> bool;

    fn create_engine(&self) -> Box<dyn HlsEngine>;

    fn create_object_url(&self, data: Vec<u8>, mime: &str) -> ObjectUrl;

    fn revoke_object_url(&self, url: ObjectUrl);
}
