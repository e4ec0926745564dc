use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;

use super::lesson::LessonId;

/// Processing status of a lesson's video asset.
///
/// `None -> Uploaded -> Processing -> {Ready, Failed}`. `Ready` and `Failed` are
/// terminal for an asset version; only a fresh upload returns to `Uploaded`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    #[default]
    None,
    Uploaded,
    Processing,
    Ready,
    Failed,
}

impl Display for VideoStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            VideoStatus::None => write!(f, "NONE"),
            VideoStatus::Uploaded => write!(f, "UPLOADED"),
            VideoStatus::Processing => write!(f, "PROCESSING"),
            VideoStatus::Ready => write!(f, "READY"),
            VideoStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl VideoStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, VideoStatus::Ready | VideoStatus::Failed)
    }

    /// Uploaded or processing: the pipeline still owes a verdict.
    pub fn is_in_progress(self) -> bool {
        matches!(self, VideoStatus::Uploaded | VideoStatus::Processing)
    }

    /// Whether the pipeline may move an asset from `self` to `next`.
    ///
    /// A fresh upload is not a transition: it replaces the asset wholesale
    /// (see [`VideoAsset::uploaded`]).
    pub fn can_transition_to(self, next: VideoStatus) -> bool {
        matches!(
            (self, next),
            (VideoStatus::Uploaded, VideoStatus::Processing)
                | (VideoStatus::Uploaded, VideoStatus::Failed)
                | (VideoStatus::Processing, VideoStatus::Ready)
                | (VideoStatus::Processing, VideoStatus::Failed)
        )
    }

    /// Short badge text shown next to a lesson.
    pub fn badge(self) -> &'static str {
        match self {
            VideoStatus::None => "No video",
            VideoStatus::Uploaded => "Queued",
            VideoStatus::Processing => "Processing",
            VideoStatus::Ready => "Ready",
            VideoStatus::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid video status transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: VideoStatus,
    pub to: VideoStatus,
}

/// The video attached to a lesson. One per lesson at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoAsset {
    pub lesson_id: LessonId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
    pub status: VideoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Storage key of the HLS playlist produced by the pipeline. Server-side only.
    #[serde(default, skip_serializing)]
    pub manifest_key: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl VideoAsset {
    /// A lesson with no video.
    pub fn empty(lesson_id: LessonId) -> Self {
        Self {
            lesson_id,
            object_key: None,
            status: VideoStatus::None,
            duration_seconds: None,
            failure_reason: None,
            manifest_key: None,
            updated_at: Utc::now(),
        }
    }

    /// A freshly finalized upload, replacing whatever the lesson held before.
    pub fn uploaded(lesson_id: LessonId, object_key: String, duration_seconds: u32) -> Self {
        Self {
            lesson_id,
            object_key: Some(object_key),
            status: VideoStatus::Uploaded,
            duration_seconds: Some(duration_seconds),
            failure_reason: None,
            manifest_key: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == VideoStatus::Ready && self.object_key.is_some()
    }

    fn transition(&mut self, next: VideoStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_processing(&mut self) -> Result<(), TransitionError> {
        self.transition(VideoStatus::Processing)
    }

    /// `duration_seconds` from the pipeline, when given, overrides the client probe.
    pub fn mark_ready(
        &mut self,
        manifest_key: Option<String>,
        duration_seconds: Option<u32>,
    ) -> Result<(), TransitionError> {
        self.transition(VideoStatus::Ready)?;
        self.manifest_key = manifest_key;
        if duration_seconds.is_some() {
            self.duration_seconds = duration_seconds;
        }
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(VideoStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }
}
