//! Read-only view of the course catalogue.

use async_trait::async_trait;
use lessoncast_core::{AppError, LessonId, LessonInfo};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

#[async_trait]
pub trait LessonDirectory: Send + Sync {
    async fn find(&self, lesson_id: LessonId) -> Result<Option<LessonInfo>, AppError>;
}

/// Lesson directory held in memory, optionally seeded from a JSON array of lessons.
#[derive(Debug, Default)]
pub struct InMemoryLessonDirectory {
    lessons: RwLock<HashMap<LessonId, LessonInfo>>,
}

impl InMemoryLessonDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lessons(lessons: impl IntoIterator<Item = LessonInfo>) -> Self {
        Self {
            lessons: RwLock::new(lessons.into_iter().map(|l| (l.id, l)).collect()),
        }
    }

    /// Load `[{"id": 1, "ownerId": "...", "kind": "VIDEO"}, ...]`.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await.map_err(|e| {
            AppError::Internal(format!("Failed to read lessons file {}: {}", path.display(), e))
        })?;
        let lessons: Vec<LessonInfo> = serde_json::from_slice(&raw)?;
        tracing::info!(
            path = %path.display(),
            lesson_count = lessons.len(),
            "Lesson directory loaded"
        );
        Ok(Self::with_lessons(lessons))
    }

    pub async fn insert(&self, lesson: LessonInfo) {
        self.lessons.write().await.insert(lesson.id, lesson);
    }

    pub async fn len(&self) -> usize {
        self.lessons.read().await.len()
    }
}

#[async_trait]
impl LessonDirectory for InMemoryLessonDirectory {
    async fn find(&self, lesson_id: LessonId) -> Result<Option<LessonInfo>, AppError> {
        Ok(self.lessons.read().await.get(&lesson_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessoncast_core::LessonKind;
    use std::io::Write;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_from_file_seeds_lessons() {
        let owner = Uuid::new_v4();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": 5, "ownerId": "{}", "kind": "VIDEO"}}, {{"id": 6, "ownerId": "{}", "kind": "QUIZ"}}]"#,
            owner, owner
        )
        .unwrap();

        let directory = InMemoryLessonDirectory::from_file(file.path()).await.unwrap();
        assert_eq!(directory.len().await, 2);

        let lesson = directory.find(5).await.unwrap().unwrap();
        assert!(lesson.is_video_lesson());
        assert!(lesson.is_owned_by(owner));
        assert_eq!(directory.find(6).await.unwrap().unwrap().kind, LessonKind::Quiz);
        assert!(directory.find(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_from_file_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = InMemoryLessonDirectory::from_file(file.path()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
