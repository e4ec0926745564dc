use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;
use validator::Validate;

/// Ticket for a direct-to-storage upload. Issued per upload attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadTicket {
    /// Presigned PUT URL
    pub upload_url: String,
    /// Storage key the upload lands at; echoed back on finalize
    pub object_key: String,
    pub expires_in_seconds: u64,
}

/// Body of the finalize call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeUploadRequest {
    #[validate(length(
        min = 1,
        max = 512,
        message = "Object key must be between 1 and 512 characters"
    ))]
    pub object_key: String,
    /// Whole seconds, probed locally by the uploader
    pub duration_seconds: u32,
}

/// A local file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

impl UploadFile {
    /// Builds the descriptor from a path and a known size, guessing the
    /// content type from the extension when none is declared.
    pub fn new(path: impl Into<PathBuf>, size: u64, content_type: Option<String>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video")
            .to_string();
        let content_type = content_type
            .unwrap_or_else(|| content_type_for_path(&path).to_string());

        Self {
            path,
            file_name,
            content_type,
            size,
        }
    }
}

/// Content type by extension for the containers instructors actually upload.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "ts" => "video/mp2t",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    #[default]
    Idle,
    Requesting,
    Uploading,
    Processing,
    Success,
    Error,
}

impl Display for UploadState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadState::Idle => write!(f, "idle"),
            UploadState::Requesting => write!(f, "requesting"),
            UploadState::Uploading => write!(f, "uploading"),
            UploadState::Processing => write!(f, "processing"),
            UploadState::Success => write!(f, "success"),
            UploadState::Error => write!(f, "error"),
        }
    }
}

/// Client-local view of one upload flow.
///
/// Progress never decreases within an attempt; it only drops back to zero
/// through [`UploadSession::begin`], [`UploadSession::fail`] or [`UploadSession::reset`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    state: UploadState,
    progress: u8,
    error: Option<String>,
}

impl UploadSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            UploadState::Requesting | UploadState::Uploading | UploadState::Processing
        )
    }

    pub fn begin(&mut self) {
        self.state = UploadState::Requesting;
        self.progress = 0;
        self.error = None;
    }

    pub fn set_state(&mut self, state: UploadState) {
        self.state = state;
    }

    /// Raises progress to `percent`; lower values are ignored. Returns the value now shown.
    pub fn advance(&mut self, percent: u8) -> u8 {
        let percent = percent.min(100);
        if percent > self.progress {
            self.progress = percent;
        }
        self.progress
    }

    pub fn succeed(&mut self) {
        self.state = UploadState::Success;
        self.progress = 100;
        self.error = None;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = UploadState::Error;
        self.progress = 0;
        self.error = Some(message.into());
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
