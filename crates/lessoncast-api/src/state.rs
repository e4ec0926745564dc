//! Shared application state handed to every handler.

use crate::auth::JwtService;
use lessoncast_core::Config;
use lessoncast_services::LessonVideoService;
use lessoncast_storage::{LocalStorage, Storage};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub video: Arc<LessonVideoService>,
    pub storage: Arc<dyn Storage>,
    /// Set when the local backend is active; the media route serves its signed URLs.
    pub local_media: Option<Arc<LocalStorage>>,
    pub jwt: Arc<JwtService>,
}
