use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lesson identifier as issued by the course catalogue.
pub type LessonId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonKind {
    Video,
    Document,
    Quiz,
    Assignment,
}

/// The slice of a lesson the video pipeline needs: who owns it and what kind it is.
///
/// Lesson CRUD lives elsewhere; this is only ever read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonInfo {
    pub id: LessonId,
    pub owner_id: Uuid,
    pub kind: LessonKind,
}

impl LessonInfo {
    pub fn is_video_lesson(&self) -> bool {
        self.kind == LessonKind::Video
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}
